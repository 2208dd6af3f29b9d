//! The `math` table.
//!
//! Every unary here stamps its result with an `External` origin and has a
//! reverse in the registry, so `math.sin(x)` can be forced: the target is
//! pulled back through `asin` (with a finiteness check) and the argument is
//! forced in turn.

use std::sync::Arc;

use bilua_common::{LuaError, Range, SourceChange};

use crate::args::{check_number, check_value};
use crate::builtins::native;
use crate::interpreter::{CallResult, Evaluator, NativeFunction};
use crate::number::Number;
use crate::origin::{Origin, ReverseFn, register_reverse};
use crate::table::TableArena;
use crate::value::{Value, Vallist};

pub fn register(eval: &mut Evaluator) {
    let handle = eval.arena.allocate();
    let table = eval.arena.get_mut(handle);

    let unaries: &[(&'static str, fn(f64) -> f64)] = &[
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sqrt", f64::sqrt),
    ];
    for &(name, forward) in unaries {
        table
            .set(Value::from(name), native(MathUnary { name, forward }))
            .expect("math table key");
    }

    for &(name, to_int) in &[
        ("floor", f64::floor as fn(f64) -> f64),
        ("ceil", f64::ceil),
    ] {
        table
            .set(Value::from(name), native(MathRound { name, round: to_int }))
            .expect("math table key");
    }

    table
        .set(Value::from("abs"), native(AbsFn))
        .expect("math table key");
    table
        .set(Value::from("atan2"), native(Atan2Fn))
        .expect("math table key");
    table
        .set(Value::from("max"), native(ExtremumFn { name: "max" }))
        .expect("math table key");
    table
        .set(Value::from("min"), native(ExtremumFn { name: "min" }))
        .expect("math table key");
    table
        .set(Value::from("pi"), Value::from(std::f64::consts::PI))
        .expect("math table key");
    table
        .set(Value::from("huge"), Value::from(f64::INFINITY))
        .expect("math table key");

    eval.env.add("math", Value::from(handle));

    register_reverses();
}

/* ─────────────── trig & friends ─────────────── */

struct MathUnary {
    name: &'static str,
    forward: fn(f64) -> f64,
}

impl NativeFunction for MathUnary {
    fn name(&self) -> &'static str {
        self.name
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        range: Range,
    ) -> Result<CallResult, LuaError> {
        let x = check_number(self.name, args, 0)?;
        let result = (self.forward)(x.as_float());
        Ok(CallResult::from(
            Value::from(result).with_origin(Origin::external(self.name, args.clone(), range)),
        ))
    }
}

/* ─────────────── floor / ceil ─────────────── */

struct MathRound {
    name: &'static str,
    round: fn(f64) -> f64,
}

impl NativeFunction for MathRound {
    fn name(&self) -> &'static str {
        self.name
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        range: Range,
    ) -> Result<CallResult, LuaError> {
        let x = check_number(self.name, args, 0)?;
        let rounded = Number::Float((self.round)(x.as_float()));
        // an in-range result is an integer, like Lua 5.3
        let result = match rounded.as_exact_int() {
            Some(i) => Number::Int(i),
            None => rounded,
        };
        Ok(CallResult::from(
            Value::from(result).with_origin(Origin::external(self.name, args.clone(), range)),
        ))
    }
}

/* ─────────────── abs ─────────────── */

struct AbsFn;

impl NativeFunction for AbsFn {
    fn name(&self) -> &'static str {
        "abs"
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        range: Range,
    ) -> Result<CallResult, LuaError> {
        let x = check_number(self.name(), args, 0)?;
        let result = match x {
            Number::Int(i) => match i.checked_abs() {
                Some(v) => Number::Int(v),
                None => Number::Float((i as f64).abs()),
            },
            Number::Float(f) => Number::Float(f.abs()),
        };
        Ok(CallResult::from(
            Value::from(result).with_origin(Origin::external("abs", args.clone(), range)),
        ))
    }
}

/* ─────────────── atan2 ─────────────── */

struct Atan2Fn;

impl NativeFunction for Atan2Fn {
    fn name(&self) -> &'static str {
        "atan2"
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        range: Range,
    ) -> Result<CallResult, LuaError> {
        let y = check_number(self.name(), args, 0)?;
        let x = check_number(self.name(), args, 1)?;
        let result = y.as_float().atan2(x.as_float());
        Ok(CallResult::from(
            Value::from(result).with_origin(Origin::external("atan2", args.clone(), range)),
        ))
    }
}

/* ─────────────── max / min ─────────────── */

/// Selection, not computation: the winning argument's value (and origin)
/// is returned unchanged, so forcing the result forces that argument.
struct ExtremumFn {
    name: &'static str,
}

impl NativeFunction for ExtremumFn {
    fn name(&self) -> &'static str {
        self.name
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        check_value(self.name, args, 0)?;
        let mut best: Option<(Number, Value)> = None;
        for (index, value) in args.iter().enumerate() {
            let n = check_number(self.name, args, index)?;
            let replace = match &best {
                None => true,
                Some((current, _)) => {
                    let ordering = n.num_cmp(*current);
                    if self.name == "max" {
                        ordering == Some(std::cmp::Ordering::Greater)
                    } else {
                        ordering == Some(std::cmp::Ordering::Less)
                    }
                }
            };
            if replace {
                best = Some((n, value.clone()));
            }
        }
        let (_, winner) = best.expect("at least one argument");
        Ok(CallResult::from(winner))
    }
}

/* ─────────────── reverse registrations ─────────────── */

/// Reverse a one-argument function through its inverse, dropping targets
/// outside the inverse's domain.
fn unary_reverse(inverse: fn(f64) -> f64) -> ReverseFn {
    Arc::new(
        move |args: &Vallist, target: &Value, arena: &TableArena| -> Option<SourceChange> {
            let t = target.as_number()?.as_float();
            let x = inverse(t);
            if !x.is_finite() {
                return None;
            }
            args.get(0).force(&Value::from(x), arena)
        },
    )
}

/// Reverse floor/ceil only onto an already-integral target; the proposal
/// rewrites the argument to the target itself.
fn rounding_reverse() -> ReverseFn {
    Arc::new(
        move |args: &Vallist, target: &Value, arena: &TableArena| -> Option<SourceChange> {
            let t = target.as_number()?.as_exact_int()?;
            args.get(0).force(&Value::from(t), arena)
        },
    )
}

fn register_reverses() {
    register_reverse("sin", unary_reverse(f64::asin));
    register_reverse("cos", unary_reverse(f64::acos));
    register_reverse("tan", unary_reverse(f64::atan));
    register_reverse("asin", unary_reverse(f64::sin));
    register_reverse("acos", unary_reverse(f64::cos));
    register_reverse("atan", unary_reverse(f64::tan));
    register_reverse("sqrt", unary_reverse(|t| if t < 0.0 { f64::NAN } else { t * t }));
    register_reverse("floor", rounding_reverse());
    register_reverse("ceil", rounding_reverse());

    // sign-preserving: keep the argument on its current side of zero
    register_reverse(
        "abs",
        Arc::new(
            |args: &Vallist, target: &Value, arena: &TableArena| -> Option<SourceChange> {
                let t = target.as_number()?;
                if t.as_float() < 0.0 {
                    return None;
                }
                let operand = args.get(0);
                let negative = operand
                    .as_number()
                    .is_some_and(|n| n.as_float() < 0.0);
                let candidate = if negative { t.neg() } else { t };
                operand.force(&Value::from(candidate), arena)
            },
        ),
    );

    // atan2(y, x): solve each argument with the other held fixed
    register_reverse(
        "atan2",
        Arc::new(
            |args: &Vallist, target: &Value, arena: &TableArena| -> Option<SourceChange> {
                let t = target.as_number()?.as_float();
                let tangent = t.tan();
                let y = args.get(0);
                let x = args.get(1);
                let mut branches = Vec::new();

                if let Some(xn) = x.as_number() {
                    let y_target = xn.as_float() * tangent;
                    if y_target.is_finite() {
                        if let Some(change) = y.force(&Value::from(y_target), arena) {
                            branches.push(change);
                        }
                    }
                }
                if let Some(yn) = y.as_number() {
                    if tangent != 0.0 {
                        let x_target = yn.as_float() / tangent;
                        if x_target.is_finite() {
                            if let Some(change) = x.force(&Value::from(x_target), arena) {
                                branches.push(change);
                            }
                        }
                    }
                }
                SourceChange::alternative(branches)
            },
        ),
    );
}
