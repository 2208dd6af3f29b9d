//! The standard library: just enough to exercise origin tracking.

use std::rc::Rc;

use crate::interpreter::{Evaluator, NativeFunction};
use crate::value::{FunctionValue, Value};

pub mod basic;
pub mod io;
pub mod math;

/// Install every built-in into the evaluator's global environment.
pub fn install(eval: &mut Evaluator) {
    basic::register(eval);
    math::register(eval);
    io::register(eval);
}

pub(crate) fn native(function: impl NativeFunction + 'static) -> Value {
    Value::from(FunctionValue::Native(Rc::new(function)))
}
