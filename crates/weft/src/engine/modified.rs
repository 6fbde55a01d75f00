use std::rc::Rc;

use super::{
    run_custom, run_iteration, run_partial, AppliedModifier, Body, Deferred, Engine, EngineRef,
    NamedSegment,
};
use crate::compiler::Renderer;
use crate::context::Context;
use crate::error::RenderError;
use crate::value::Value;

/// An engine whose writes pass through a block modifier chain before
/// reaching the engine it wraps.
///
/// Each block with modifiers renders its body through its own wrapper, so
/// a chain only ever touches the text of the block that declared it. Nested
/// wrappers apply the innermost chain first.
struct Modified {
    inner: EngineRef,
    chain: Vec<AppliedModifier>,
}

/// Wraps `engine` with `chain`, or hands it back unchanged when the chain
/// is empty.
pub(crate) fn with_modifiers(engine: &EngineRef, chain: Vec<AppliedModifier>) -> EngineRef {
    if chain.is_empty() {
        return engine.clone();
    }
    Rc::new(Modified {
        inner: engine.clone(),
        chain,
    })
}

impl Engine for Modified {
    fn write(&self, text: &str) -> Result<(), RenderError> {
        if self.inner.is_halted() {
            return Err(RenderError::Aborted);
        }
        if text.is_empty() {
            return Ok(());
        }
        let mut value = Value::from(text);
        for modifier in &self.chain {
            value = self
                .inner
                .apply_modifier(&modifier.name, value, &modifier.args)?;
        }
        self.inner.write(&value.to_string())
    }

    fn halt(&self) {
        self.inner.halt();
    }

    fn is_halted(&self) -> bool {
        self.inner.is_halted()
    }

    fn iterate(self: Rc<Self>, collection: Value, base: Context, body: Body) -> Deferred {
        run_iteration(self, collection, base, body)
    }

    fn declare_named(&self, name: &str, frame: Context, body: Body) {
        self.inner.declare_named(name, frame, body);
    }

    fn resolve_named(&self, name: &str) -> Option<NamedSegment> {
        self.inner.resolve_named(name)
    }

    fn invoke_custom(self: Rc<Self>, path: &str, frame: Context, bodies: Vec<Body>) -> Deferred {
        run_custom(self, path, frame, bodies)
    }

    fn render_partial(self: Rc<Self>, name: &str, frame: Context) -> Deferred {
        run_partial(self, name, frame)
    }

    fn template(&self, name: &str) -> Result<Renderer, RenderError> {
        self.inner.template(name)
    }

    fn apply_modifier(
        &self,
        name: &str,
        value: Value,
        args: &[Value],
    ) -> Result<Value, RenderError> {
        self.inner.apply_modifier(name, value, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RenderSession;
    use crate::sink::Buffer;

    fn modifier(name: &str, args: Vec<Value>) -> AppliedModifier {
        AppliedModifier {
            name: name.into(),
            args,
        }
    }

    #[test]
    fn test_modifier_chains_apply_innermost_first() {
        let buffer = Buffer::new();
        let session: EngineRef = RenderSession::standalone(buffer.clone());
        let padded = with_modifiers(
            &session,
            vec![modifier("pad", vec![Value::from(6), Value::from("*")])],
        );
        let shouted = with_modifiers(&padded, vec![modifier("upper", vec![])]);
        shouted.write("ab").unwrap();
        padded.write("cd").unwrap();
        session.write("ef").unwrap();
        assert_eq!(buffer.contents(), "****AB****cdef");
    }

    #[test]
    fn test_siblings_do_not_share_chains() {
        let buffer = Buffer::new();
        let session: EngineRef = RenderSession::standalone(buffer.clone());
        let shouted = with_modifiers(&session, vec![modifier("upper", vec![])]);
        let plain = with_modifiers(&session, Vec::new());
        plain.write("a").unwrap();
        shouted.write("b").unwrap();
        plain.write("c").unwrap();
        assert_eq!(buffer.contents(), "aBc");
    }

    #[test]
    fn test_unknown_block_modifier_fails_the_write() {
        let session: EngineRef = RenderSession::standalone(Buffer::new());
        let engine = with_modifiers(&session, vec![modifier("nope", vec![])]);
        assert!(matches!(
            engine.write("x"),
            Err(RenderError::UnknownModifier(_))
        ));
    }

    #[test]
    fn test_halt_reaches_the_session() {
        let session: EngineRef = RenderSession::standalone(Buffer::new());
        let engine = with_modifiers(&session, vec![modifier("upper", vec![])]);
        engine.halt();
        assert!(session.is_halted());
        assert!(matches!(engine.write("x"), Err(RenderError::Aborted)));
    }
}
