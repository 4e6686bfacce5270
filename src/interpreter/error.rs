use std::rc::Rc;

use crate::diagnostic::{Diagnostic, Frame};
use crate::position::Span;
use crate::value::Value;

use super::environment::Context;

/// A runtime failure: message, offending span, and the context it was
/// raised in. The context chain becomes the traceback.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub span: Span,
    pub context: Rc<Context>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, span: Span, context: Rc<Context>) -> Self {
        Self {
            message: message.into(),
            span,
            context,
        }
    }

    pub fn undefined_variable(name: &str, span: Span, context: Rc<Context>) -> Self {
        Self::new(format!("'{}' is not defined", name), span, context)
    }

    pub fn illegal_operation(span: Span, context: Rc<Context>) -> Self {
        Self::new("Illegal operation", span, context)
    }

    pub fn division_by_zero(span: Span, context: Rc<Context>) -> Self {
        Self::new("Division by zero", span, context)
    }

    pub fn not_callable(value: &Value, span: Span, context: Rc<Context>) -> Self {
        Self::new(
            format!("Cannot call a {}", value.type_name()),
            span,
            context,
        )
    }

    pub fn arity_mismatch(
        name: &str,
        expected: usize,
        got: usize,
        span: Span,
        context: Rc<Context>,
    ) -> Self {
        let message = if got > expected {
            format!("{} too many args passed into '{}'", got - expected, name)
        } else {
            format!("{} too few args passed into '{}'", expected - got, name)
        };
        Self::new(message, span, context)
    }

    /// Walks the context chain from the failure site outward,
    /// re-anchoring each outer frame at the span where it entered the
    /// inner one.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut trace = Vec::new();
        let mut span = self.span.clone();
        let mut context = Some(Rc::clone(&self.context));

        while let Some(ctx) = context {
            trace.push(Frame {
                span: span.clone(),
                context: ctx.display_name.clone(),
            });
            if let Some(entry) = &ctx.parent_entry_span {
                span = entry.clone();
            }
            context = ctx.parent.clone();
        }

        Diagnostic::new("Runtime Error", self.message.clone(), self.span.clone())
            .with_trace(trace)
    }
}
