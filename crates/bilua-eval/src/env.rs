//! Lexical environments.
//!
//! Frames live in a per-interpreter arena and are addressed by index, so a
//! closure can hold on to its defining frame without creating an ownership
//! cycle; frames are only deallocated with the interpreter itself. The
//! frame at index 0 is the global frame: the one assignments to unbound
//! names write to, and the only frame that survives between evaluations.

use std::fmt;
use std::io::{self, BufRead, Read, Write};

use rustc_hash::FxHashMap;

use crate::value::{Value, Vallist};

pub type FrameId = usize;

#[derive(Default)]
struct Frame {
    vars: FxHashMap<String, Value>,
    parent: Option<FrameId>,
    /// Set on call frames; `...` resolves against the nearest one.
    varargs: Option<Vallist>,
}

pub struct Environment {
    frames: Vec<Frame>,
    current: FrameId,
    stdin: Box<dyn BufRead>,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

impl Environment {
    pub fn new() -> Environment {
        let global = Frame {
            vars: FxHashMap::default(),
            parent: None,
            // the top-level chunk is a vararg scope
            varargs: Some(Vallist::new()),
        };
        Environment {
            frames: vec![global],
            current: 0,
            stdin: Box::new(io::BufReader::new(io::stdin())),
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }

    /* ───────────────────── bindings ───────────────────── */

    /// Define a global, regardless of the current frame.
    pub fn add(&mut self, name: impl Into<String>, value: Value) {
        self.frames[0].vars.insert(name.into(), value);
    }

    /// Declare into the innermost frame only.
    pub fn declare_local(&mut self, name: impl Into<String>, value: Value) {
        self.frames[self.current].vars.insert(name.into(), value);
    }

    /// Innermost binding of `name`; `nil` when unbound.
    pub fn get(&self, name: &str) -> Value {
        let mut frame = self.current;
        loop {
            if let Some(value) = self.frames[frame].vars.get(name) {
                return value.clone();
            }
            match self.frames[frame].parent {
                Some(parent) => frame = parent,
                None => return Value::nil(),
            }
        }
    }

    /// Write the innermost existing binding; fall back to a new global.
    pub fn assign(&mut self, name: &str, value: Value) {
        let mut frame = self.current;
        loop {
            if self.frames[frame].vars.contains_key(name) {
                self.frames[frame].vars.insert(name.to_string(), value);
                return;
            }
            match self.frames[frame].parent {
                Some(parent) => frame = parent,
                None => break,
            }
        }
        self.frames[0].vars.insert(name.to_string(), value);
    }

    /// Number of global bindings.
    pub fn size(&self) -> usize {
        self.frames[0].vars.len()
    }

    /* ───────────────────── frames ───────────────────── */

    pub fn current_frame(&self) -> FrameId {
        self.current
    }

    /// Open a child scope of the current frame and enter it.
    pub fn push_frame(&mut self) -> FrameId {
        let id = self.frames.len();
        self.frames.push(Frame {
            vars: FxHashMap::default(),
            parent: Some(self.current),
            varargs: None,
        });
        self.current = id;
        id
    }

    /// Open a call frame whose lexical parent is the callee's captured
    /// frame, not the caller's. The caller must remember its own frame and
    /// restore it afterwards.
    pub fn push_call_frame(&mut self, parent: FrameId, varargs: Option<Vallist>) -> FrameId {
        let id = self.frames.len();
        self.frames.push(Frame {
            vars: FxHashMap::default(),
            parent: Some(parent),
            varargs,
        });
        self.current = id;
        id
    }

    /// Leave the current scope for its lexical parent. The frame itself
    /// stays in the arena; closures may still reference it.
    pub fn pop_frame(&mut self) {
        if let Some(parent) = self.frames[self.current].parent {
            self.current = parent;
        }
    }

    /// Jump back to a frame remembered with [`current_frame`].
    ///
    /// [`current_frame`]: Environment::current_frame
    pub fn restore_frame(&mut self, frame: FrameId) {
        self.current = frame;
    }

    /// The varargs of the nearest enclosing call frame.
    pub fn varargs(&self) -> Vallist {
        let mut frame = self.current;
        loop {
            if let Some(varargs) = &self.frames[frame].varargs {
                return varargs.clone();
            }
            match self.frames[frame].parent {
                Some(parent) => frame = parent,
                None => return Vallist::new(),
            }
        }
    }

    /* ───────────────────── I/O slots ───────────────────── */

    // The stream setters take ownership, so a "null" handle cannot exist;
    // passing a fresh handle drops the previous one.

    pub fn set_stdin(&mut self, stdin: Box<dyn BufRead>) {
        self.stdin = stdin;
    }

    pub fn set_stdout(&mut self, stdout: Box<dyn Write>) {
        self.stdout = stdout;
    }

    pub fn set_stderr(&mut self, stderr: Box<dyn Write>) {
        self.stderr = stderr;
    }

    pub fn stdin_mut(&mut self) -> &mut dyn BufRead {
        &mut *self.stdin
    }

    pub fn stdout_mut(&mut self) -> &mut dyn Write {
        &mut *self.stdout
    }

    pub fn stderr_mut(&mut self) -> &mut dyn Write {
        &mut *self.stderr
    }

    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let n = self.stdin.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    pub fn read_all(&mut self) -> io::Result<String> {
        let mut all = String::new();
        self.stdin.read_to_string(&mut all)?;
        Ok(all)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

/// Two environments are equal iff their globals are equal; inner frames
/// are transient evaluation state.
impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.frames[0].vars == other.frames[0].vars
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("globals", &self.frames[0].vars.len())
            .field("frames", &self.frames.len())
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let mut env = Environment::new();
        env.add("x", Value::from(1i64));
        env.push_frame();
        assert_eq!(env.get("x"), Value::from(1i64));
        env.declare_local("x", Value::from(2i64));
        assert_eq!(env.get("x"), Value::from(2i64));
        env.pop_frame();
        assert_eq!(env.get("x"), Value::from(1i64));
    }

    #[test]
    fn assign_prefers_existing_binding_over_global() {
        let mut env = Environment::new();
        env.add("x", Value::from(1i64));
        env.push_frame();
        env.declare_local("x", Value::from(2i64));
        env.assign("x", Value::from(3i64));
        assert_eq!(env.get("x"), Value::from(3i64));
        env.pop_frame();
        assert_eq!(env.get("x"), Value::from(1i64));
    }

    #[test]
    fn assign_to_unbound_name_creates_a_global() {
        let mut env = Environment::new();
        env.push_frame();
        env.assign("fresh", Value::from(9i64));
        env.pop_frame();
        assert_eq!(env.get("fresh"), Value::from(9i64));
        assert_eq!(env.size(), 1);
    }

    #[test]
    fn unbound_names_read_as_nil() {
        let env = Environment::new();
        assert!(env.get("nothing").is_nil());
    }

    #[test]
    fn call_frames_are_lexically_parented() {
        let mut env = Environment::new();
        env.add("g", Value::from(1i64));

        // a closure captured the global frame; entering its call frame from
        // a deeply nested scope must not see that scope's locals
        let captured = env.current_frame();
        env.push_frame();
        env.declare_local("hidden", Value::from(99i64));
        let caller = env.current_frame();

        env.push_call_frame(captured, None);
        assert!(env.get("hidden").is_nil());
        assert_eq!(env.get("g"), Value::from(1i64));
        env.restore_frame(caller);
        assert_eq!(env.get("hidden"), Value::from(99i64));
    }

    #[test]
    fn environments_compare_by_globals() {
        let mut a = Environment::new();
        let mut b = Environment::new();
        assert_eq!(a, b);
        a.add("x", Value::from(1i64));
        assert_ne!(a, b);
        b.add("x", Value::from(1i64));
        assert_eq!(a, b);
    }
}
