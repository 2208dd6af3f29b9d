//! The edit algebra produced by reverse evaluation.
//!
//! Forcing a value yields a tree of [`SourceChange`]s: `Single` leaves
//! replace a span of the original text, `And` groups edits that only make
//! sense together, `Or` offers alternatives for a consumer (usually a UI)
//! to pick from. `origin` and `hint` are free-form strings that surface to
//! the user unchanged.

use std::fmt::{self, Display};

use crate::location::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Replace the text at `range` with `replacement`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleChange {
    pub range: Range,
    pub replacement: String,
    pub origin: Option<String>,
    pub hint: Option<String>,
}

impl SingleChange {
    pub fn new(range: Range, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
            origin: None,
            hint: None,
        }
    }

    pub fn with_origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange {
    Single(SingleChange),
    /// All children must be applied together.
    And(Vec<SourceChange>),
    /// Alternatives; the consumer applies exactly one child.
    Or {
        origin: Option<String>,
        hint: Option<String>,
        children: Vec<SourceChange>,
    },
}

impl SourceChange {
    pub fn single(range: Range, replacement: impl Into<String>) -> Self {
        SourceChange::Single(SingleChange::new(range, replacement))
    }

    /// Conjunction of two changes. Nested `And`s are flattened.
    pub fn combine(a: SourceChange, b: SourceChange) -> SourceChange {
        let mut children = Vec::new();
        for change in [a, b] {
            match change {
                SourceChange::And(inner) => children.extend(inner),
                other => children.push(other),
            }
        }
        SourceChange::And(children)
    }

    /// Disjunction over `children`. A single alternative is returned
    /// unwrapped; an empty list yields `None`.
    pub fn alternative(mut children: Vec<SourceChange>) -> Option<SourceChange> {
        match children.len() {
            0 => None,
            1 => Some(children.pop().unwrap()),
            _ => Some(SourceChange::Or {
                origin: None,
                hint: None,
                children,
            }),
        }
    }

    /// Attach an origin label to the root unless one is already set.
    /// `And` roots delegate to their children.
    pub fn set_origin_if_unset(&mut self, label: &str) {
        match self {
            SourceChange::Single(single) => {
                if single.origin.is_none() {
                    single.origin = Some(label.to_string());
                }
            }
            SourceChange::And(children) => {
                for child in children {
                    child.set_origin_if_unset(label);
                }
            }
            SourceChange::Or { origin, .. } => {
                if origin.is_none() {
                    *origin = Some(label.to_string());
                }
            }
        }
    }

    /// Apply `f` to every `Single` leaf, depth-first, left to right.
    pub fn visit<'a, F: FnMut(&'a SingleChange)>(&'a self, f: &mut F) {
        match self {
            SourceChange::Single(single) => f(single),
            SourceChange::And(children) | SourceChange::Or { children, .. } => {
                for child in children {
                    child.visit(f);
                }
            }
        }
    }

    /// All `Single` leaves in visit order.
    pub fn collect_singles(&self) -> Vec<&SingleChange> {
        let mut singles = Vec::new();
        self.visit(&mut |single| singles.push(single));
        singles
    }

    /// Remove empty conjunctions/disjunctions and unwrap singletons.
    pub fn simplify(self) -> Option<SourceChange> {
        match self {
            SourceChange::Single(single) => Some(SourceChange::Single(single)),
            SourceChange::And(children) => {
                let mut kept: Vec<_> =
                    children.into_iter().filter_map(SourceChange::simplify).collect();
                match kept.len() {
                    0 => None,
                    1 => Some(kept.pop().unwrap()),
                    _ => Some(SourceChange::And(kept)),
                }
            }
            SourceChange::Or {
                origin,
                hint,
                children,
            } => {
                let mut kept: Vec<_> =
                    children.into_iter().filter_map(SourceChange::simplify).collect();
                match kept.len() {
                    0 => None,
                    1 => Some(kept.pop().unwrap()),
                    _ => Some(SourceChange::Or {
                        origin,
                        hint,
                        children: kept,
                    }),
                }
            }
        }
    }

    /// Splice every `Single` leaf into `source`, highest byte offset first
    /// so earlier spans stay valid. Leaves with overlapping ranges are
    /// callers' responsibility (an `And` guarantees disjointness; for an
    /// `Or` the caller must pick one branch before applying).
    pub fn apply_to(&self, source: &str) -> String {
        let mut singles = self.collect_singles();
        singles.sort_by(|a, b| b.range.start.byte.cmp(&a.range.start.byte));

        let mut text = source.to_string();
        for single in singles {
            let start = single.range.start.byte.min(text.len());
            let end = single.range.end.byte.min(text.len());
            text.replace_range(start..end, &single.replacement);
        }
        text
    }
}

impl Display for SourceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceChange::Single(single) => {
                write!(f, "{} -> {:?}", single.range, single.replacement)
            }
            SourceChange::And(children) => {
                write!(f, "and(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            SourceChange::Or { children, .. } => {
                write!(f, "or(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}
