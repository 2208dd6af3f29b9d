//! Forward and reverse operator semantics.
//!
//! Forward application follows Lua 5.3 and stamps every result with a
//! `Binary`/`Unary` origin holding the operand values. The reverse
//! functions invert one operation for `force`: each binary operator can
//! solve for either operand while holding the other fixed, yielding up to
//! two alternative edit proposals.
//!
//! `and`/`or` never reach [`apply_binary`]: the evaluator short-circuits
//! them and the chosen operand's value (and origin) flows through as-is.

use std::cmp::Ordering;

use bilua_common::{LuaError, Range, SourceChange};
use bilua_parse::ast::{BinOp, UnOp};

use crate::number::Number;
use crate::origin::Origin;
use crate::table::TableArena;
use crate::value::{LuaString, RawValue, Value};

/* ═════════════════════════ forward ═════════════════════════ */

pub fn apply_binary(
    op: BinOp,
    lhs: Value,
    rhs: Value,
    range: Range,
) -> Result<Value, LuaError> {
    let raw = match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::IDiv | BinOp::Mod
        | BinOp::Pow => {
            let (a, b) = arith_operands(op, &lhs, &rhs)?;
            let result = match op {
                BinOp::Add => a.add(b),
                BinOp::Sub => a.sub(b),
                BinOp::Mul => a.mul(b),
                BinOp::Div => a.div(b),
                BinOp::IDiv => a.idiv(b)?,
                BinOp::Mod => a.rem(b)?,
                BinOp::Pow => a.pow(b),
                _ => unreachable!(),
            };
            RawValue::Number(result)
        }

        BinOp::Concat => {
            let mut bytes = concat_bytes(&lhs)?;
            bytes.extend_from_slice(&concat_bytes(&rhs)?);
            RawValue::Str(LuaString::from_bytes(bytes))
        }

        BinOp::Eq => RawValue::Bool(lhs == rhs),
        BinOp::Ne => RawValue::Bool(lhs != rhs),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare_operands(&lhs, &rhs)?;
            let result = match (op, ordering) {
                (BinOp::Lt, Some(Ordering::Less)) => true,
                (BinOp::Le, Some(Ordering::Less | Ordering::Equal)) => true,
                (BinOp::Gt, Some(Ordering::Greater)) => true,
                (BinOp::Ge, Some(Ordering::Greater | Ordering::Equal)) => true,
                _ => false,
            };
            RawValue::Bool(result)
        }

        BinOp::BAnd | BinOp::BOr | BinOp::BXor | BinOp::Shl | BinOp::Shr => {
            let a = bitwise_operand(&lhs)?;
            let b = bitwise_operand(&rhs)?;
            let result = match op {
                BinOp::BAnd => a & b,
                BinOp::BOr => a | b,
                BinOp::BXor => a ^ b,
                BinOp::Shl => shift_left(a, b),
                BinOp::Shr => shift_left(a, -b),
                _ => unreachable!(),
            };
            RawValue::Number(Number::Int(result))
        }

        BinOp::And | BinOp::Or => {
            unreachable!("and/or are short-circuited by the evaluator")
        }
    };

    Ok(Value::new(raw).with_origin(Origin::binary(op, lhs, rhs, range)))
}

pub fn apply_unary(
    op: UnOp,
    operand: Value,
    range: Range,
    arena: &TableArena,
) -> Result<Value, LuaError> {
    let raw = match op {
        UnOp::Neg => match operand.as_number() {
            Some(n) => RawValue::Number(n.neg()),
            None => {
                return Err(LuaError::type_error(format!(
                    "attempt to perform arithmetic on a {} value",
                    operand.type_name()
                )));
            }
        },
        UnOp::Not => RawValue::Bool(!operand.truthy()),
        UnOp::Len => match operand.raw() {
            RawValue::Str(s) => RawValue::Number(Number::Int(s.len() as i64)),
            RawValue::Table(handle) => RawValue::Number(Number::Int(arena.get(*handle).border())),
            _ => {
                return Err(LuaError::type_error(format!(
                    "attempt to get length of a {} value",
                    operand.type_name()
                )));
            }
        },
        UnOp::BNot => RawValue::Number(Number::Int(!bitwise_operand(&operand)?)),
    };

    Ok(Value::new(raw).with_origin(Origin::unary(op, operand, range)))
}

fn arith_operands(op: BinOp, lhs: &Value, rhs: &Value) -> Result<(Number, Number), LuaError> {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => {
            let offender = if lhs.is_number() { rhs } else { lhs };
            Err(LuaError::type_error(format!(
                "attempt to perform arithmetic ('{op}') on a {} value",
                offender.type_name()
            )))
        }
    }
}

fn concat_bytes(value: &Value) -> Result<Vec<u8>, LuaError> {
    match value.raw() {
        RawValue::Str(s) => Ok(s.as_bytes().to_vec()),
        RawValue::Number(n) => Ok(n.display_string().into_bytes()),
        _ => Err(LuaError::type_error(format!(
            "attempt to concatenate a {} value",
            value.type_name()
        ))),
    }
}

/// Ordered comparison domain: numbers with numbers, strings with strings
/// (byte-wise). Everything else is a type error.
fn compare_operands(lhs: &Value, rhs: &Value) -> Result<Option<Ordering>, LuaError> {
    match (lhs.raw(), rhs.raw()) {
        (RawValue::Number(a), RawValue::Number(b)) => Ok(a.num_cmp(*b)),
        (RawValue::Str(a), RawValue::Str(b)) => Ok(Some(a.as_bytes().cmp(b.as_bytes()))),
        _ => Err(LuaError::type_error(format!(
            "attempt to compare {} with {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

fn bitwise_operand(value: &Value) -> Result<i64, LuaError> {
    match value.as_number() {
        Some(n) => n.as_bitwise_int(),
        None => Err(LuaError::type_error(format!(
            "attempt to perform bitwise operation on a {} value",
            value.type_name()
        ))),
    }
}

/// Lua shift semantics: logical, both directions, saturating to 0 past 63
/// bits. A negative count shifts the other way.
fn shift_left(a: i64, count: i64) -> i64 {
    if count <= -64 || count >= 64 {
        0
    } else if count >= 0 {
        ((a as u64) << count) as i64
    } else {
        ((a as u64) >> -count) as i64
    }
}

/* ═════════════════════════ reverse ═════════════════════════ */

/// Invert a unary operator: the operand value that would produce `target`.
pub fn reverse_unary(op: UnOp, target: &Value) -> Option<Value> {
    match op {
        UnOp::Neg => target.as_number().map(|n| Value::from(n.neg())),
        UnOp::Not => match target.raw() {
            RawValue::Bool(b) => Some(Value::from(!b)),
            _ => None,
        },
        UnOp::BNot => target
            .as_number()
            .and_then(Number::as_exact_int)
            .map(|i| Value::from(!i)),
        // no useful preimage
        UnOp::Len => None,
    }
}

/// Invert a binary operator. Both degrees of freedom are tried — solve for
/// the left operand holding the right fixed, and the converse — and the
/// surviving branches become alternatives. Branches whose subproblem is
/// undefined, non-finite, or unforceable are dropped.
pub fn reverse_binary(
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
    target: &Value,
    arena: &TableArena,
) -> Option<SourceChange> {
    let branches = match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Pow => {
            let t = target.as_number()?;
            let a = lhs.as_number()?;
            let b = rhs.as_number()?;

            // coupled operands: both sides come from the same literal (as
            // in `x * x` applied to one argument), so solving one side
            // while holding the other fixed would be wrong — solve the
            // shared unknown instead
            if let Some(candidate) = coupled_solution(op, lhs, rhs, t, a) {
                return lhs.force(&Value::from(candidate), arena);
            }

            let lhs_target = match op {
                BinOp::Add => Some(t.sub(b)),
                BinOp::Sub => Some(t.add(b)),
                BinOp::Mul => exact_div(t, b),
                BinOp::Div => Some(t.mul(b)),
                BinOp::Pow => nth_root(t, b),
                _ => unreachable!(),
            };
            let rhs_target = match op {
                BinOp::Add => Some(t.sub(a)),
                BinOp::Sub => Some(a.sub(t)),
                BinOp::Mul => exact_div(t, a),
                BinOp::Div => exact_div(a, t),
                BinOp::Pow => log_base(t, a),
                _ => unreachable!(),
            };

            let mut branches = Vec::new();
            if let Some(candidate) = lhs_target.filter(|n| n.is_finite()) {
                if let Some(change) = lhs.force(&Value::from(candidate), arena) {
                    branches.push(change);
                }
            }
            if let Some(candidate) = rhs_target.filter(|n| n.is_finite()) {
                if let Some(change) = rhs.force(&Value::from(candidate), arena) {
                    branches.push(change);
                }
            }
            branches
        }

        BinOp::Concat => reverse_concat(lhs, rhs, target, arena),

        // not reversed: no useful or unique preimage
        BinOp::IDiv
        | BinOp::Mod
        | BinOp::Eq
        | BinOp::Ne
        | BinOp::Lt
        | BinOp::Le
        | BinOp::Gt
        | BinOp::Ge
        | BinOp::BAnd
        | BinOp::BOr
        | BinOp::BXor
        | BinOp::Shl
        | BinOp::Shr
        | BinOp::And
        | BinOp::Or => Vec::new(),
    };

    SourceChange::alternative(branches)
}

/// Solve `x op x == target` when both operands share one source literal.
/// Only `x + x` and `x * x` have useful closed forms; the multiplicative
/// root keeps the sign of the current value.
fn coupled_solution(
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
    target: Number,
    current: Number,
) -> Option<Number> {
    let coupled = match (lhs.origin(), rhs.origin()) {
        (Origin::Literal { range: a }, Origin::Literal { range: b }) => a == b,
        _ => false,
    };
    if !coupled {
        return None;
    }

    let solution = match op {
        BinOp::Add => Number::Float(target.as_float() / 2.0),
        BinOp::Mul => {
            let t = target.as_float();
            if t < 0.0 {
                return None;
            }
            let root = t.sqrt();
            Number::Float(if current.as_float() < 0.0 { -root } else { root })
        }
        _ => return None,
    };
    if !solution.is_finite() {
        return None;
    }
    // an integral solution keeps integer form
    Some(match solution.as_exact_int() {
        Some(i) => Number::Int(i),
        None => solution,
    })
}

/// `target / divisor`, preferring an exact integer when both sides are
/// integers that divide evenly. A zero divisor has no solution.
fn exact_div(target: Number, divisor: Number) -> Option<Number> {
    if divisor.as_float() == 0.0 {
        return None;
    }
    if let (Number::Int(t), Number::Int(d)) = (target, divisor) {
        if let (Some(quotient), Some(0)) = (t.checked_div(d), t.checked_rem(d)) {
            return Some(Number::Int(quotient));
        }
    }
    Some(Number::Float(target.as_float() / divisor.as_float()))
}

/// Solve `x ^ exponent == target` for x.
fn nth_root(target: Number, exponent: Number) -> Option<Number> {
    let e = exponent.as_float();
    if e == 0.0 {
        return None;
    }
    let root = target.as_float().powf(1.0 / e);
    root.is_finite().then_some(Number::Float(root))
}

/// Solve `base ^ x == target` for x.
fn log_base(target: Number, base: Number) -> Option<Number> {
    let (t, b) = (target.as_float(), base.as_float());
    if t <= 0.0 || b <= 0.0 || b == 1.0 {
        return None;
    }
    let log = t.ln() / b.ln();
    log.is_finite().then_some(Number::Float(log))
}

/// Reverse of `..`: when the target keeps the fixed side as a prefix
/// (resp. suffix), the remainder is forced onto the other side.
fn reverse_concat(
    lhs: &Value,
    rhs: &Value,
    target: &Value,
    arena: &TableArena,
) -> Vec<SourceChange> {
    let Some(target_str) = target.as_str() else {
        return Vec::new();
    };
    let target_bytes = target_str.as_bytes();
    let mut branches = Vec::new();

    // fix rhs, rewrite lhs
    if let Ok(rhs_bytes) = concat_bytes(rhs) {
        if target_bytes.len() >= rhs_bytes.len() && target_bytes.ends_with(&rhs_bytes) {
            let prefix = &target_bytes[..target_bytes.len() - rhs_bytes.len()];
            if let Some(change) = lhs.force(&remainder_value(lhs, prefix), arena) {
                branches.push(change);
            }
        }
    }

    // fix lhs, rewrite rhs
    if let Ok(lhs_bytes) = concat_bytes(lhs) {
        if target_bytes.len() >= lhs_bytes.len() && target_bytes.starts_with(&lhs_bytes) {
            let suffix = &target_bytes[lhs_bytes.len()..];
            if let Some(change) = rhs.force(&remainder_value(rhs, suffix), arena) {
                branches.push(change);
            }
        }
    }

    branches
}

/// The remainder as a value of the side's own type where possible: a
/// numeric side keeps a numeric edit if the remainder parses as a number.
fn remainder_value(side: &Value, remainder: &[u8]) -> Value {
    if side.is_number() {
        if let Ok(text) = std::str::from_utf8(remainder) {
            if let Ok(i) = text.parse::<i64>() {
                return Value::from(i);
            }
            if let Ok(f) = text.parse::<f64>() {
                return Value::from(f);
            }
        }
    }
    Value::new(RawValue::Str(LuaString::from_bytes(remainder.to_vec())))
}
