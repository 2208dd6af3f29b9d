//! The `io` table: line/number/whole-stream reads and unformatted writes
//! over the environment's stream slots. Blocking happens here, at the
//! boundary, never inside the evaluator.

use bilua_common::{LuaError, Range};

use crate::args::opt_value;
use crate::builtins::native;
use crate::interpreter::{CallResult, Evaluator, NativeFunction};
use crate::value::{RawValue, Value, Vallist};

pub fn register(eval: &mut Evaluator) {
    let handle = eval.arena.allocate();
    let table = eval.arena.get_mut(handle);
    table
        .set(Value::from("read"), native(IoReadFn))
        .expect("io table key");
    table
        .set(Value::from("write"), native(IoWriteFn))
        .expect("io table key");
    eval.env.add("io", Value::from(handle));
}

fn io_failure(error: std::io::Error) -> LuaError {
    LuaError::assertion(format!("io error: {error}"))
}

/* ─────────────── io.read([format]) ─────────────── */

struct IoReadFn;

impl NativeFunction for IoReadFn {
    fn name(&self) -> &'static str {
        "read"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let format = match opt_value(args, 0) {
            Some(value) => match value.as_str() {
                Some(s) => s.to_lossy_string(),
                None => {
                    return Err(LuaError::bad_argument(
                        "read",
                        1,
                        format!("invalid format, got {}", value.type_name()),
                    ));
                }
            },
            None => "l".to_string(),
        };

        let result = match format.trim_start_matches('*') {
            "l" => eval
                .env
                .read_line()
                .map_err(io_failure)?
                .map(Value::from)
                .unwrap_or_else(Value::nil),
            "n" => match eval.env.read_line().map_err(io_failure)? {
                Some(line) => match line.trim().parse::<i64>() {
                    Ok(i) => Value::from(i),
                    Err(_) => line
                        .trim()
                        .parse::<f64>()
                        .map(Value::from)
                        .unwrap_or_else(|_| Value::nil()),
                },
                None => Value::nil(),
            },
            "a" => Value::from(eval.env.read_all().map_err(io_failure)?),
            other => {
                return Err(LuaError::bad_argument(
                    "read",
                    1,
                    format!("invalid format '{other}'"),
                ));
            }
        };

        Ok(CallResult::from(result))
    }
}

/* ─────────────── io.write(...) ─────────────── */

struct IoWriteFn;

impl NativeFunction for IoWriteFn {
    fn name(&self) -> &'static str {
        "write"
    }

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        _range: Range,
    ) -> Result<CallResult, LuaError> {
        let mut chunks: Vec<Vec<u8>> = Vec::with_capacity(args.len());
        for (index, value) in args.iter().enumerate() {
            match value.raw() {
                RawValue::Str(s) => chunks.push(s.as_bytes().to_vec()),
                RawValue::Number(n) => chunks.push(n.display_string().into_bytes()),
                _ => {
                    return Err(LuaError::bad_argument(
                        "write",
                        index + 1,
                        format!("string expected, got {}", value.type_name()),
                    ));
                }
            }
        }

        let out = eval.env.stdout_mut();
        for chunk in chunks {
            out.write_all(&chunk).map_err(io_failure)?;
        }
        out.flush().map_err(io_failure)?;
        Ok(CallResult::empty())
    }
}
