//! The single error surface of the interpreter.
//!
//! - **`LuaErrorKind`**: what went wrong, with per-kind payload where one
//!   kind needs it (`BadArgument`)
//! - **`TraceFrame`**: one call site, pushed while frames unwind
//! - **`LuaError`**: kind + human message + stack, passed around everywhere
//!
//! Parse errors are returned in `ParseResult.errors` and never raised;
//! every other kind propagates synchronously to `evaluate()`'s caller.

use std::{error::Error, fmt};

use crate::location::Range;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LuaErrorKind {
    Parse,
    Type,
    BadArgument { index: usize, function: String },
    Arithmetic,
    UndefinedName,
    RuntimeAssertion,
    VisitLimit,
    NotRepresentable,
}

impl fmt::Display for LuaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => f.write_str("parse error"),
            Self::Type => f.write_str("type error"),
            Self::BadArgument { index, function } => {
                write!(f, "bad argument #{index} to '{function}'")
            }
            Self::Arithmetic => f.write_str("arithmetic error"),
            Self::UndefinedName => f.write_str("undefined name"),
            Self::RuntimeAssertion => f.write_str("assertion failed"),
            Self::VisitLimit => f.write_str("visit limit exceeded"),
            Self::NotRepresentable => f.write_str("value has no literal form"),
        }
    }
}

/// One call site on the error's unwind path: callee name plus the range of
/// the call expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceFrame {
    pub function: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuaError {
    pub kind: LuaErrorKind,
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

/* ───────────────────── Constructors & helpers ─────────────────────── */

impl From<LuaErrorKind> for LuaError {
    fn from(kind: LuaErrorKind) -> Self {
        Self {
            kind,
            message: String::new(),
            trace: Vec::new(),
        }
    }
}

impl LuaError {
    pub fn new(kind: LuaErrorKind) -> Self {
        kind.into()
    }

    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        Self::new(LuaErrorKind::Type).with_message(msg)
    }

    pub fn arithmetic<S: Into<String>>(msg: S) -> Self {
        Self::new(LuaErrorKind::Arithmetic).with_message(msg)
    }

    pub fn assertion<S: Into<String>>(msg: S) -> Self {
        Self::new(LuaErrorKind::RuntimeAssertion).with_message(msg)
    }

    pub fn not_representable<S: Into<String>>(msg: S) -> Self {
        Self::new(LuaErrorKind::NotRepresentable).with_message(msg)
    }

    pub fn visit_limit(limit: usize) -> Self {
        Self::new(LuaErrorKind::VisitLimit)
            .with_message(format!("loop body entered more than {limit} times"))
    }

    /// `bad argument #index to 'function' (msg)` — index is 1-based.
    pub fn bad_argument<S: Into<String>>(function: &str, index: usize, msg: S) -> Self {
        Self::new(LuaErrorKind::BadArgument {
            index,
            function: function.to_string(),
        })
        .with_message(msg)
    }

    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = msg.into();
        self
    }

    /// Record a call site while unwinding. Innermost frame first.
    pub fn with_frame<S: Into<String>>(mut self, function: S, range: Range) -> Self {
        self.trace.push(TraceFrame {
            function: function.into(),
            range,
        });
        self
    }
}

/* ───────────────────────── Display / Error ────────────────────────── */

impl fmt::Display for LuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LuaErrorKind::BadArgument { index, function } => {
                write!(f, "bad argument #{index} to '{function}' ({})", self.message)?;
            }
            kind => {
                write!(f, "{kind}")?;
                if !self.message.is_empty() {
                    write!(f, ": {}", self.message)?;
                }
            }
        }

        if !self.trace.is_empty() {
            write!(f, "\nstack traceback:")?;
            for frame in &self.trace {
                write!(f, "\n\t{} at {}", frame.function, frame.range)?;
            }
        }

        Ok(())
    }
}

impl Error for LuaError {}

impl From<LuaError> for String {
    fn from(error: LuaError) -> Self {
        format!("{error}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_argument_formats_like_lua() {
        let err = LuaError::bad_argument("sin", 1, "number expected, got string");
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'sin' (number expected, got string)"
        );
    }

    #[test]
    fn trace_renders_innermost_first() {
        let err = LuaError::type_error("attempt to add a nil value")
            .with_frame("inner", Range::default())
            .with_frame("outer", Range::default());
        let rendered = err.to_string();
        let inner_pos = rendered.find("inner").unwrap();
        let outer_pos = rendered.find("outer").unwrap();
        assert!(inner_pos < outer_pos);
    }
}
