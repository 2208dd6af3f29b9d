//! The public interpreter surface: `parse → evaluate → result`, plus
//! applying the source changes that `force` proposes and re-parsing.

use tracing::debug;

use bilua_common::{LuaError, LuaErrorKind, SourceChange};
use bilua_parse::ast::Chunk;
use bilua_parse::parser::{ParseError, parse_chunk};

use crate::builtins;
use crate::env::Environment;
use crate::interpreter::Evaluator;
use crate::table::TableArena;
use crate::value::Value;

/// Outcome of [`Interpreter::parse`]. Errors live here; parsing never
/// raises.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of a successful evaluation: the final value and any source
/// change the built-ins suggested while running.
#[derive(Debug)]
pub struct EvalResult {
    pub value: Value,
    pub source_change: Option<SourceChange>,
}

pub struct Interpreter {
    source: String,
    chunk: Option<Chunk>,
    evaluator: Evaluator,
}

impl Interpreter {
    /// An interpreter with the default stdlib installed and no source yet.
    pub fn new() -> Interpreter {
        let mut evaluator = Evaluator::new();
        builtins::install(&mut evaluator);
        Interpreter {
            source: String::new(),
            chunk: None,
            evaluator,
        }
    }

    /// Like [`new`](Interpreter::new), with initial source code; parsing
    /// happens on the first [`evaluate`](Interpreter::evaluate).
    pub fn with_source(source: impl Into<String>) -> Interpreter {
        let mut interpreter = Interpreter::new();
        interpreter.source = source.into();
        interpreter
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parse fresh source code, replacing whatever was loaded before.
    pub fn parse(&mut self, source: impl Into<String>) -> ParseResult {
        self.source = source.into();
        let chunk = parse_chunk(&self.source);
        let errors = chunk.errors.clone();
        self.chunk = Some(chunk);
        ParseResult { errors }
    }

    /// Run the loaded program. Re-parses if the source changed since the
    /// last parse. Parse errors surface as a `Parse`-kind error here.
    pub fn evaluate(&mut self) -> Result<EvalResult, LuaError> {
        if self.chunk.is_none() {
            let chunk = parse_chunk(&self.source);
            self.chunk = Some(chunk);
        }
        let chunk = self.chunk.as_ref().expect("just parsed");

        if let Some(error) = chunk.errors.first() {
            return Err(LuaError::new(LuaErrorKind::Parse).with_message(error.to_string()));
        }

        let (value, source_change) = self.evaluator.eval_chunk(&chunk.block)?;
        Ok(EvalResult {
            value,
            source_change,
        })
    }

    /// Splice `Single` leaves into the stored source, highest byte offset
    /// first. The next `evaluate` re-parses the rewritten text.
    pub fn apply_source_changes(&mut self, changes: Vec<SourceChange>) {
        if let Some(combined) = changes.into_iter().reduce(SourceChange::combine) {
            let rewritten = combined.apply_to(&self.source);
            debug!(from = %self.source, to = %rewritten, "source rewritten");
            self.source = rewritten;
        }
        self.chunk = None;
    }

    /* ───────────────────── configuration ───────────────────── */

    /// Loop-body budget per evaluation; exceeding it fails with
    /// `VisitLimit`.
    pub fn set_visit_limit(&mut self, limit: usize) {
        self.evaluator.visit_limit = limit;
    }

    pub fn visit_limit(&self) -> usize {
        self.evaluator.visit_limit
    }

    pub fn environment(&self) -> &Environment {
        &self.evaluator.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.evaluator.env
    }

    /// The table arena backing this interpreter's values; needed to render
    /// or force table values obtained from [`evaluate`](Interpreter::evaluate).
    pub fn arena(&self) -> &TableArena {
        &self.evaluator.arena
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}
