//! Global built-ins: printing, type inspection, conversion, assertions,
//! table iteration, and the raw table accessors.

use bilua_common::{LuaError, Range};

use crate::args::{check_string, check_table, check_value, opt_value};
use crate::builtins::native;
use crate::interpreter::{CallResult, Evaluator, NativeFunction};
use crate::number::Number;
use crate::value::{Value, Vallist};

pub fn register(eval: &mut Evaluator) {
    for function in [
        native(PrintFn),
        native(TypeFn),
        native(TostringFn),
        native(TonumberFn),
        native(AssertFn),
        native(ErrorFn),
        native(NextFn),
        native(PairsFn),
        native(IpairsFn),
        native(SelectFn),
        native(RawgetFn),
        native(RawsetFn),
        native(SetmetatableFn),
        native(GetmetatableFn),
        native(ForceFn),
    ] {
        let name = match function.raw() {
            crate::value::RawValue::Function(crate::value::FunctionValue::Native(n)) => n.name(),
            _ => unreachable!(),
        };
        eval.env.add(name, function.clone());
    }
}

fn io_failure(error: std::io::Error) -> LuaError {
    LuaError::assertion(format!("io error: {error}"))
}

/* ─────────────── print(...) ─────────────── */

struct PrintFn;

impl NativeFunction for PrintFn {
    fn name(&self) -> &'static str {
        "print"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let rendered: Vec<String> = args
            .iter()
            .map(|value| value.display_string(&eval.arena))
            .collect();
        let line = rendered.join("\t");
        let out = eval.env.stdout_mut();
        out.write_all(line.as_bytes()).map_err(io_failure)?;
        out.write_all(b"\n").map_err(io_failure)?;
        out.flush().map_err(io_failure)?;
        Ok(CallResult::empty())
    }
}

/* ─────────────── type(v) ─────────────── */

struct TypeFn;

impl NativeFunction for TypeFn {
    fn name(&self) -> &'static str {
        "type"
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let value = check_value(self.name(), args, 0)?;
        Ok(CallResult::from(Value::from(value.type_name())))
    }
}

/* ─────────────── tostring(v) / tonumber(v[, base]) ─────────────── */

struct TostringFn;

impl NativeFunction for TostringFn {
    fn name(&self) -> &'static str {
        "tostring"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let value = check_value(self.name(), args, 0)?;
        Ok(CallResult::from(Value::from(
            value.display_string(&eval.arena),
        )))
    }
}

struct TonumberFn;

impl NativeFunction for TonumberFn {
    fn name(&self) -> &'static str {
        "tonumber"
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let value = check_value(self.name(), args, 0)?;

        if let Some(base_value) = opt_value(args, 1) {
            let base = base_value
                .as_number()
                .and_then(Number::as_exact_int)
                .filter(|b| (2..=36).contains(b))
                .ok_or_else(|| {
                    LuaError::bad_argument(self.name(), 2, "base out of range")
                })?;
            let text = check_string(self.name(), args, 0)?;
            let text = text.to_lossy_string();
            let parsed = i64::from_str_radix(text.trim(), base as u32).ok();
            return Ok(CallResult::from(
                parsed.map(Value::from).unwrap_or_else(Value::nil),
            ));
        }

        if value.is_number() {
            return Ok(CallResult::from(value));
        }
        let converted = match value.as_str() {
            Some(s) => parse_number(&s.to_lossy_string()),
            None => None,
        };
        Ok(CallResult::from(
            converted.map(Value::from).unwrap_or_else(Value::nil),
        ))
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(Number::Int);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::Int(i));
    }
    text.parse::<f64>().ok().map(Number::Float)
}

/* ─────────────── assert / error ─────────────── */

struct AssertFn;

impl NativeFunction for AssertFn {
    fn name(&self) -> &'static str {
        "assert"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let value = check_value(self.name(), args, 0)?;
        if value.truthy() {
            return Ok(CallResult::from(args.clone()));
        }
        let message = match opt_value(args, 1) {
            Some(m) => m.display_string(&eval.arena),
            None => "assertion failed!".to_string(),
        };
        Err(LuaError::assertion(message))
    }
}

struct ErrorFn;

impl NativeFunction for ErrorFn {
    fn name(&self) -> &'static str {
        "error"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let message = args.first().display_string(&eval.arena);
        Err(LuaError::assertion(message))
    }
}

/* ─────────────── next / pairs / ipairs ─────────────── */

struct NextFn;

impl NativeFunction for NextFn {
    fn name(&self) -> &'static str {
        "next"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let handle = check_table(self.name(), args, 0)?;
        let key = opt_value(args, 1);
        let pair = eval.arena.get(handle).next_pair(key.as_ref())?;
        let mut values = Vallist::new();
        match pair {
            Some((key, value)) => {
                values.push(key);
                values.push(value);
            }
            None => values.push(Value::nil()),
        }
        Ok(CallResult::from(values))
    }
}

struct PairsFn;

impl NativeFunction for PairsFn {
    fn name(&self) -> &'static str {
        "pairs"
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        check_table(self.name(), args, 0)?;
        let mut values = Vallist::new();
        values.push(native(NextFn));
        values.push(args.get(0));
        values.push(Value::nil());
        Ok(CallResult::from(values))
    }
}

struct IpairsFn;

impl NativeFunction for IpairsFn {
    fn name(&self) -> &'static str {
        "ipairs"
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        check_table(self.name(), args, 0)?;
        let mut values = Vallist::new();
        values.push(native(IpairsIterFn));
        values.push(args.get(0));
        values.push(Value::from(0i64));
        Ok(CallResult::from(values))
    }
}

struct IpairsIterFn;

impl NativeFunction for IpairsIterFn {
    fn name(&self) -> &'static str {
        "ipairs iterator"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        range: Range,
    ) -> Result<CallResult, LuaError> {
        let table = args.get(0);
        let index = check_value(self.name(), args, 1)?
            .as_number()
            .and_then(Number::as_exact_int)
            .unwrap_or(0);
        let next_index = Value::from(index + 1);
        let value = eval.index_get(&table, &next_index, range)?;
        let mut values = Vallist::new();
        if value.is_nil() {
            values.push(Value::nil());
        } else {
            values.push(next_index);
            values.push(value);
        }
        Ok(CallResult::from(values))
    }
}

/* ─────────────── select ─────────────── */

struct SelectFn;

impl NativeFunction for SelectFn {
    fn name(&self) -> &'static str {
        "select"
    }

    fn call(
        &self,
        _eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let selector = check_value(self.name(), args, 0)?;
        let rest = args.len().saturating_sub(1);

        if let Some(s) = selector.as_str() {
            if s.as_bytes() == b"#" {
                return Ok(CallResult::from(Value::from(rest as i64)));
            }
        }

        let position = selector
            .as_number()
            .and_then(Number::as_exact_int)
            .ok_or_else(|| {
                LuaError::bad_argument(self.name(), 1, "number expected")
            })?;
        let start = if position < 0 {
            let from_end = rest as i64 + position;
            if from_end < 0 {
                return Err(LuaError::bad_argument(self.name(), 1, "index out of range"));
            }
            from_end as usize
        } else if position == 0 {
            return Err(LuaError::bad_argument(self.name(), 1, "index out of range"));
        } else {
            position as usize - 1
        };

        let values: Vallist = args.iter().skip(1 + start).cloned().collect();
        Ok(CallResult::from(values))
    }
}

/* ─────────────── raw table access / metatables ─────────────── */

struct RawgetFn;

impl NativeFunction for RawgetFn {
    fn name(&self) -> &'static str {
        "rawget"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let handle = check_table(self.name(), args, 0)?;
        let key = check_value(self.name(), args, 1)?;
        Ok(CallResult::from(eval.arena.get(handle).get(&key)))
    }
}

struct RawsetFn;

impl NativeFunction for RawsetFn {
    fn name(&self) -> &'static str {
        "rawset"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let handle = check_table(self.name(), args, 0)?;
        let key = check_value(self.name(), args, 1)?;
        let value = args.get(2);
        eval.arena.get_mut(handle).set(key, value)?;
        Ok(CallResult::from(args.get(0)))
    }
}

struct SetmetatableFn;

impl NativeFunction for SetmetatableFn {
    fn name(&self) -> &'static str {
        "setmetatable"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let handle = check_table(self.name(), args, 0)?;
        let meta = match opt_value(args, 1) {
            Some(value) => Some(value.as_table().ok_or_else(|| {
                LuaError::bad_argument(self.name(), 2, "nil or table expected")
            })?),
            None => None,
        };
        eval.arena.get_mut(handle).set_metatable(meta);
        Ok(CallResult::from(args.get(0)))
    }
}

/* ─────────────── force(value, target) ─────────────── */

/// Ask a value's origin for edits that would make it evaluate to `target`,
/// and surface them as this evaluation's source-change suggestion. Returns
/// whether a proposal exists; no proposal is not an error.
struct ForceFn;

impl NativeFunction for ForceFn {
    fn name(&self) -> &'static str {
        "force"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let value = check_value(self.name(), args, 0)?;
        let target = check_value(self.name(), args, 1)?;
        let change = value.force(&target, &eval.arena);
        Ok(CallResult {
            values: Vallist::of(Value::from(change.is_some())),
            source_change: change,
        })
    }
}

struct GetmetatableFn;

impl NativeFunction for GetmetatableFn {
    fn name(&self) -> &'static str {
        "getmetatable"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let handle = check_table(self.name(), args, 0)?;
        let meta = eval.arena.get(handle).metatable();
        Ok(CallResult::from(
            meta.map(Value::from).unwrap_or_else(Value::nil),
        ))
    }
}
