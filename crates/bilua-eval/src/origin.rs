//! Value provenance and reverse evaluation.
//!
//! Every operator and tracked built-in stamps its result with an [`Origin`]
//! holding owned copies of the operand values (cheap: scalars and handles).
//! `force` walks the origin, inverting one operation per level, until it
//! bottoms out at a `Literal` whose range becomes a text edit.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use bilua_common::{Range, SourceChange};
use bilua_parse::ast::{BinOp, UnOp};

use crate::operators;
use crate::table::TableArena;
use crate::value::{Value, Vallist};

#[derive(Debug, Clone)]
pub enum Origin {
    /// Untracked; forcing proposes nothing.
    None,
    /// The value came straight from a literal at `range`.
    Literal { range: Range },
    Binary(Box<BinaryOrigin>),
    Unary(Box<UnaryOrigin>),
    /// Result of a native call with a registered reverse.
    External(Box<ExternalOrigin>),
    /// The value was produced by several paths; all are considered.
    Multiple(Vec<Origin>),
}

#[derive(Debug, Clone)]
pub struct BinaryOrigin {
    pub op: BinOp,
    pub lhs: Value,
    pub rhs: Value,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct UnaryOrigin {
    pub op: UnOp,
    pub operand: Value,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct ExternalOrigin {
    pub function: String,
    pub args: Vallist,
    pub range: Range,
}

impl Origin {
    pub fn binary(op: BinOp, lhs: Value, rhs: Value, range: Range) -> Origin {
        Origin::Binary(Box::new(BinaryOrigin {
            op,
            lhs,
            rhs,
            range,
        }))
    }

    pub fn unary(op: UnOp, operand: Value, range: Range) -> Origin {
        Origin::Unary(Box::new(UnaryOrigin { op, operand, range }))
    }

    pub fn external(function: impl Into<String>, args: Vallist, range: Range) -> Origin {
        Origin::External(Box::new(ExternalOrigin {
            function: function.into(),
            args,
            range,
        }))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Origin::None)
    }

    /// Propose source changes making re-evaluation yield `target`.
    pub fn force(&self, target: &Value, arena: &TableArena) -> Option<SourceChange> {
        match self {
            Origin::None => None,
            Origin::Literal { range } => {
                let literal = target.to_literal(arena).ok()?;
                Some(SourceChange::single(*range, literal))
            }
            Origin::Unary(unary) => {
                let operand_target = operators::reverse_unary(unary.op, target)?;
                unary.operand.force(&operand_target, arena)
            }
            Origin::Binary(binary) => {
                operators::reverse_binary(binary.op, &binary.lhs, &binary.rhs, target, arena)
            }
            Origin::External(external) => {
                let reverse = reverse_for(&external.function)?;
                reverse(&external.args, target, arena)
            }
            Origin::Multiple(origins) => SourceChange::alternative(
                origins
                    .iter()
                    .filter_map(|origin| origin.force(target, arena))
                    .collect(),
            ),
        }
    }
}

/* ───────────────────── reverse registry ───────────────────── */

/// Reverse of a native function: given the original arguments and the
/// desired result, propose edits (usually by forcing one argument).
pub type ReverseFn = Arc<dyn Fn(&Vallist, &Value, &TableArena) -> Option<SourceChange> + Send + Sync>;

static REVERSES: Lazy<DashMap<String, ReverseFn>> = Lazy::new(DashMap::new);

pub fn register_reverse(name: &str, reverse: ReverseFn) {
    REVERSES.insert(name.to_string(), reverse);
}

pub fn reverse_for(name: &str) -> Option<ReverseFn> {
    REVERSES.get(name).map(|entry| Arc::clone(entry.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bilua_common::Location;

    fn span(start: usize, end: usize) -> Range {
        Range::new(
            Location::new(0, start as u32, start),
            Location::new(0, end as u32, end),
        )
    }

    #[test]
    fn forcing_without_origin_proposes_nothing() {
        let arena = TableArena::new();
        let value = Value::from(42i64);
        assert!(value.force(&Value::from(27i64), &arena).is_none());
    }

    #[test]
    fn literal_origin_forces_to_a_single_edit() {
        let arena = TableArena::new();
        let value = Value::from(25i64).with_origin(Origin::Literal { range: span(7, 9) });
        let change = value.force(&Value::from(14i64), &arena).unwrap();
        assert_eq!(change, SourceChange::single(span(7, 9), "14"));
    }

    #[test]
    fn removing_the_origin_disables_force() {
        let arena = TableArena::new();
        let value = Value::from(25i64).with_origin(Origin::Literal { range: span(7, 9) });
        let value = value.remove_origin();
        assert!(value.force(&Value::from(14i64), &arena).is_none());
    }

    #[test]
    fn unrepresentable_targets_yield_nothing() {
        let arena = TableArena::new();
        let value = Value::from(1i64).with_origin(Origin::Literal { range: span(0, 1) });
        assert!(value.force(&Value::from(f64::INFINITY), &arena).is_none());
    }

    #[test]
    fn multiple_origins_force_to_alternatives() {
        let arena = TableArena::new();
        let origin = Origin::Multiple(vec![
            Origin::Literal { range: span(0, 1) },
            Origin::Literal { range: span(4, 5) },
        ]);
        let value = Value::from(1i64).with_origin(origin);
        let change = value.force(&Value::from(9i64), &arena).unwrap();
        match change {
            SourceChange::Or { children, .. } => assert_eq!(children.len(), 2),
            other => panic!("expected Or, got {other}"),
        }
    }
}
