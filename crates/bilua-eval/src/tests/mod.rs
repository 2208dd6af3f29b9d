//! End-to-end suites: parse → evaluate → (force) over real programs.

mod interpreter;

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use bilua_common::LuaError;

use crate::driver::Interpreter;
use crate::value::Value;

/// A cloneable in-memory stdout so tests can inspect what `print` wrote.
#[derive(Clone, Default)]
pub(crate) struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl SharedSink {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub(crate) fn interpreter_for(source: &str) -> (Interpreter, SharedSink) {
    let mut interpreter = Interpreter::new();
    let sink = SharedSink::default();
    interpreter
        .environment_mut()
        .set_stdout(Box::new(sink.clone()));
    let result = interpreter.parse(source);
    assert!(result.is_ok(), "parse errors: {:?}", result.errors);
    (interpreter, sink)
}

pub(crate) fn eval_value(source: &str) -> Value {
    let (mut interpreter, _) = interpreter_for(source);
    interpreter.evaluate().expect("evaluation failed").value
}

pub(crate) fn eval_error(source: &str) -> LuaError {
    let (mut interpreter, _) = interpreter_for(source);
    interpreter
        .evaluate()
        .err()
        .expect("expected evaluation to fail")
}
