//! Compile and render options.

use std::env;
use std::time::Duration;

/// Enables debug information when set to `1` or `true`.
pub const DEBUG_VAR: &str = "WEFT_DEBUG";

/// Render deadline in milliseconds.
pub const TIMEOUT_VAR: &str = "WEFT_TIMEOUT_MS";

/// Options shared by compilation and rendering.
///
/// ```rust
/// use std::time::Duration;
/// use weft::Options;
///
/// let options = Options::new().debug(true).timeout(Duration::from_millis(250));
/// assert!(options.is_debug());
/// assert_eq!(options.timeout_duration(), Some(Duration::from_millis(250)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    debug: bool,
    timeout: Option<Duration>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads options from `WEFT_DEBUG` and `WEFT_TIMEOUT_MS`.
    ///
    /// Unset or unparsable variables leave the default in place.
    pub fn from_env() -> Self {
        let debug = env::var(DEBUG_VAR)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
            .unwrap_or(false);
        let timeout = env::var(TIMEOUT_VAR)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis);
        Self { debug, timeout }
    }

    /// Annotate compiled steps with source positions and reveal compile
    /// error details.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Deadline applied to every render.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }
}
