//! Argument access for built-in functions.
//!
//! Every accessor produces the canonical `bad argument #N to 'fn' (msg)`
//! error with a 1-based index, so built-ins stay terse.

use bilua_common::LuaError;

use crate::number::Number;
use crate::table::TableHandle;
use crate::value::{LuaString, Value, Vallist};

pub fn check_value(function: &str, args: &Vallist, index: usize) -> Result<Value, LuaError> {
    if index < args.len() {
        Ok(args.get(index))
    } else {
        Err(LuaError::bad_argument(function, index + 1, "value expected"))
    }
}

pub fn check_number(function: &str, args: &Vallist, index: usize) -> Result<Number, LuaError> {
    let value = check_value(function, args, index)?;
    value.as_number().ok_or_else(|| {
        LuaError::bad_argument(
            function,
            index + 1,
            format!("number expected, got {}", value.type_name()),
        )
    })
}

pub fn check_string(function: &str, args: &Vallist, index: usize) -> Result<LuaString, LuaError> {
    let value = check_value(function, args, index)?;
    match value.as_str() {
        Some(s) => Ok(s.clone()),
        // numbers coerce to their canonical string form, like Lua
        None => match value.as_number() {
            Some(n) => Ok(LuaString::from_bytes(n.display_string().into_bytes())),
            None => Err(LuaError::bad_argument(
                function,
                index + 1,
                format!("string expected, got {}", value.type_name()),
            )),
        },
    }
}

pub fn check_table(function: &str, args: &Vallist, index: usize) -> Result<TableHandle, LuaError> {
    let value = check_value(function, args, index)?;
    value.as_table().ok_or_else(|| {
        LuaError::bad_argument(
            function,
            index + 1,
            format!("table expected, got {}", value.type_name()),
        )
    })
}

/// Optional argument: `nil` and missing both mean absent.
pub fn opt_value(args: &Vallist, index: usize) -> Option<Value> {
    let value = args.get(index);
    (!value.is_nil()).then_some(value)
}
