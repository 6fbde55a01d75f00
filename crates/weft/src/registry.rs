//! Named templates for partial rendering.
//!
//! Templates are registered inline under a name. A name may be given with
//! or without one of the [`TEMPLATE_EXTENSIONS`]; `"header"`,
//! `"header.weft"` and `"header.txt"` all refer to the same template.
//!
//! Sources are compiled the first time they are rendered and the result is
//! cached until the template is replaced.

use std::collections::HashMap;

use crate::compiler::{compile_str, Renderer};
use crate::config::Options;
use crate::error::RenderError;

/// Extensions stripped from template names.
pub const TEMPLATE_EXTENSIONS: &[&str] = &[".weft", ".txt"];

/// Strips a recognised extension from `name`.
///
/// ```rust
/// use weft::registry::normalize_name;
///
/// assert_eq!(normalize_name("rows/item.weft"), "rows/item");
/// assert_eq!(normalize_name("notes.md"), "notes.md");
/// ```
pub fn normalize_name(name: &str) -> &str {
    TEMPLATE_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name)
}

#[derive(Debug, Default)]
pub struct TemplateRegistry {
    sources: HashMap<String, String>,
    compiled: HashMap<String, Renderer>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a template. Replacing drops the cached compilation.
    pub fn add(&mut self, name: &str, source: impl Into<String>) {
        let name = normalize_name(name).to_string();
        self.compiled.remove(&name);
        self.sources.insert(name, source.into());
    }

    pub fn source(&self, name: &str) -> Option<&str> {
        self.sources.get(normalize_name(name)).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(normalize_name(name))
    }

    /// Returns the compiled template, compiling and caching it on first use.
    pub fn compiled(&mut self, name: &str, options: &Options) -> Result<Renderer, RenderError> {
        let name = normalize_name(name);
        if let Some(renderer) = self.compiled.get(name) {
            return Ok(renderer.clone());
        }
        let source = self
            .sources
            .get(name)
            .ok_or_else(|| RenderError::TemplateNotFound(name.to_string()))?;
        let renderer = compile_str(source, options).map_err(|err| RenderError::InvalidTemplate {
            name: name.to_string(),
            source: Box::new(err),
        })?;
        log::trace!("cached compiled template '{}'", name);
        self.compiled.insert(name.to_string(), renderer.clone());
        Ok(renderer)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
        self.compiled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_variants_share_a_name() {
        let mut registry = TemplateRegistry::new();
        registry.add("header.weft", "first");
        assert_eq!(registry.source("header"), Some("first"));
        assert_eq!(registry.source("header.txt"), Some("first"));
        registry.add("header", "second");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.source("header.weft"), Some("second"));
    }

    #[test]
    fn test_bare_extension_is_kept() {
        assert_eq!(normalize_name(".weft"), ".weft");
    }

    #[test]
    fn test_not_found() {
        let mut registry = TemplateRegistry::new();
        let err = registry.compiled("missing", &Options::default()).unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound(name) if name == "missing"));
    }

    #[test]
    fn test_invalid_template_is_reported_by_name() {
        let mut registry = TemplateRegistry::new();
        registry.add("broken", "{#{items}}never closed");
        let err = registry.compiled("broken", &Options::default()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidTemplate { ref name, .. } if name == "broken"));
        assert!(err.to_string().contains("malformed parsed data"), "{}", err);
    }

    #[test]
    fn test_compiled_is_cached_until_replaced() {
        let mut registry = TemplateRegistry::new();
        registry.add("t", "{{a}}");
        assert!(!registry.compiled("t", &Options::default()).unwrap().is_async());
        registry.add("t", "{#{a}}{#{/}}");
        assert!(registry.compiled("t", &Options::default()).unwrap().is_async());
    }
}
