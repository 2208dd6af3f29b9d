//! The runtime value model.
//!
//! A [`Value`] is a tagged payload plus an [`Origin`] describing how it was
//! derived. Equality and hashing ignore the origin: `38` computed from
//! `25 + 13` equals a literal `38`. Tables and functions compare by
//! identity (arena handle / pointer), never by contents.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use bilua_common::{LuaError, SourceChange};
use bilua_parse::ast::FunctionBody;

use crate::env::FrameId;
use crate::interpreter::NativeFunction;
use crate::number::Number;
use crate::origin::Origin;
use crate::table::{TableArena, TableHandle};

/* ───────────────────── byte strings ───────────────────── */

/// An immutable, 8-bit clean Lua string. Cloning shares the buffer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LuaString(Rc<[u8]>);

impl LuaString {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        LuaString(bytes.into().into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_lossy_string(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<&str> for LuaString {
    fn from(s: &str) -> Self {
        LuaString::from_bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for LuaString {
    fn from(s: String) -> Self {
        LuaString::from_bytes(s.into_bytes())
    }
}

impl fmt::Display for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lossy_string())
    }
}

impl fmt::Debug for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_lossy_string())
    }
}

/* ───────────────────── functions ───────────────────── */

/// A Lua-level function defined in source: its body plus the frame it
/// closed over. Frames live in the interpreter's frame arena, so the
/// captured id stays valid for the closure's whole life.
pub struct Closure {
    pub name: Option<String>,
    pub body: Rc<FunctionBody>,
    pub captured: FrameId,
}

#[derive(Clone)]
pub enum FunctionValue {
    Native(Rc<dyn NativeFunction>),
    Closure(Rc<Closure>),
}

impl FunctionValue {
    /// Name for stack traces; anonymous closures report `?`.
    pub fn name(&self) -> String {
        match self {
            FunctionValue::Native(native) => native.name().to_string(),
            FunctionValue::Closure(closure) => {
                closure.name.clone().unwrap_or_else(|| "?".to_string())
            }
        }
    }

    fn identity(&self) -> usize {
        match self {
            FunctionValue::Native(native) => Rc::as_ptr(native) as *const () as usize,
            FunctionValue::Closure(closure) => Rc::as_ptr(closure) as usize,
        }
    }
}

impl PartialEq for FunctionValue {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionValue::Native(native) => write!(f, "<native {}>", native.name()),
            FunctionValue::Closure(closure) => {
                write!(f, "<function {}>", closure.name.as_deref().unwrap_or("?"))
            }
        }
    }
}

/* ───────────────────── values ───────────────────── */

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Nil,
    Bool(bool),
    Number(Number),
    Str(LuaString),
    Table(TableHandle),
    Function(FunctionValue),
}

#[derive(Debug, Clone)]
pub struct Value {
    raw: RawValue,
    origin: Origin,
}

impl Value {
    pub fn nil() -> Value {
        Value {
            raw: RawValue::Nil,
            origin: Origin::None,
        }
    }

    pub fn new(raw: RawValue) -> Value {
        Value {
            raw,
            origin: Origin::None,
        }
    }

    pub fn raw(&self) -> &RawValue {
        &self.raw
    }

    pub fn into_raw(self) -> RawValue {
        self.raw
    }

    /* ----- predicates ----- */

    pub fn is_nil(&self) -> bool {
        matches!(self.raw, RawValue::Nil)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.raw, RawValue::Bool(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self.raw, RawValue::Number(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.raw, RawValue::Str(_))
    }

    pub fn is_table(&self) -> bool {
        matches!(self.raw, RawValue::Table(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self.raw, RawValue::Function(_))
    }

    pub fn as_number(&self) -> Option<Number> {
        match &self.raw {
            RawValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&LuaString> {
        match &self.raw {
            RawValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<TableHandle> {
        match &self.raw {
            RawValue::Table(h) => Some(*h),
            _ => None,
        }
    }

    /// Only `nil` and `false` are falsy; `0` and `""` are true.
    pub fn truthy(&self) -> bool {
        !matches!(self.raw, RawValue::Nil | RawValue::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self.raw {
            RawValue::Nil => "nil",
            RawValue::Bool(_) => "boolean",
            RawValue::Number(_) => "number",
            RawValue::Str(_) => "string",
            RawValue::Table(_) => "table",
            RawValue::Function(_) => "function",
        }
    }

    /* ----- origins ----- */

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn with_origin(mut self, origin: Origin) -> Value {
        self.origin = origin;
        self
    }

    pub fn remove_origin(mut self) -> Value {
        self.origin = Origin::None;
        self
    }

    /// Propose source changes that would make re-evaluation yield `target`.
    /// `None` means no proposal, which is not an error.
    pub fn force(&self, target: &Value, arena: &TableArena) -> Option<SourceChange> {
        self.origin.force(target, arena)
    }

    /* ----- rendering ----- */

    /// A source-language literal evaluating to this value.
    /// Functions, non-finite numbers, and self-recursive tables have none.
    pub fn to_literal(&self, arena: &TableArena) -> Result<String, LuaError> {
        let mut visited = FxHashSet::default();
        self.literal_impl(arena, &mut visited)
    }

    fn literal_impl(
        &self,
        arena: &TableArena,
        visited: &mut FxHashSet<TableHandle>,
    ) -> Result<String, LuaError> {
        match &self.raw {
            RawValue::Nil => Ok("nil".to_string()),
            RawValue::Bool(b) => Ok(b.to_string()),
            RawValue::Number(n) => n
                .to_literal()
                .ok_or_else(|| LuaError::not_representable("number has no literal form")),
            RawValue::Str(s) => Ok(quote_bytes(s.as_bytes())),
            RawValue::Table(handle) => {
                if !visited.insert(*handle) {
                    return Err(LuaError::not_representable(
                        "table contains itself and has no literal form",
                    ));
                }
                let data = arena.get(*handle);
                let mut parts = Vec::with_capacity(data.len());
                for (key, value) in data.iter() {
                    let rendered = value.literal_impl(arena, visited)?;
                    match key.as_str() {
                        Some(s) if is_identifier(s.as_bytes()) => {
                            parts.push(format!("{} = {}", s.to_lossy_string(), rendered));
                        }
                        _ => {
                            let key_lit = key.literal_impl(arena, visited)?;
                            parts.push(format!("[{key_lit}] = {rendered}"));
                        }
                    }
                }
                visited.remove(handle);
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            RawValue::Function(_) => Err(LuaError::not_representable(
                "functions have no literal form",
            )),
        }
    }

    /// `tostring` rendering: raw string bytes, canonical numbers, an
    /// identity tag for tables and functions.
    pub fn display_string(&self, _arena: &TableArena) -> String {
        match &self.raw {
            RawValue::Nil => "nil".to_string(),
            RawValue::Bool(b) => b.to_string(),
            RawValue::Number(n) => n.display_string(),
            RawValue::Str(s) => s.to_lossy_string(),
            RawValue::Table(handle) => format!("table: 0x{:08x}", handle.index()),
            RawValue::Function(function) => match function {
                FunctionValue::Native(native) => format!("function: builtin: '{}'", native.name()),
                FunctionValue::Closure(_) => {
                    format!("function: 0x{:012x}", function.identity())
                }
            },
        }
    }
}

/// Equality compares payloads only; origins are invisible to `==`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.raw, &other.raw) {
            (RawValue::Nil, RawValue::Nil) => true,
            (RawValue::Bool(a), RawValue::Bool(b)) => a == b,
            (RawValue::Number(a), RawValue::Number(b)) => a.num_eq(*b),
            (RawValue::Str(a), RawValue::Str(b)) => a == b,
            (RawValue::Table(a), RawValue::Table(b)) => a == b,
            (RawValue::Function(a), RawValue::Function(b)) => a == b,
            _ => false,
        }
    }
}

// NaN never enters a hash table (table writes reject it), so treating
// Value as Eq for map purposes is sound.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.raw {
            RawValue::Nil => state.write_u8(0),
            RawValue::Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            RawValue::Number(n) => {
                state.write_u8(2);
                n.hash(state);
            }
            RawValue::Str(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            RawValue::Table(h) => {
                state.write_u8(4);
                h.hash(state);
            }
            RawValue::Function(f) => {
                state.write_u8(5);
                f.identity().hash(state);
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::new(RawValue::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::new(RawValue::Number(Number::Int(i)))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::new(RawValue::Number(Number::Float(f)))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Value {
        Value::new(RawValue::Number(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::new(RawValue::Str(s.into()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::new(RawValue::Str(s.into()))
    }
}

impl From<LuaString> for Value {
    fn from(s: LuaString) -> Value {
        Value::new(RawValue::Str(s))
    }
}

impl From<TableHandle> for Value {
    fn from(handle: TableHandle) -> Value {
        Value::new(RawValue::Table(handle))
    }
}

impl From<FunctionValue> for Value {
    fn from(function: FunctionValue) -> Value {
        Value::new(RawValue::Function(function))
    }
}

fn is_identifier(bytes: &[u8]) -> bool {
    const KEYWORDS: &[&[u8]] = &[
        b"and", b"break", b"do", b"else", b"elseif", b"end", b"false", b"for", b"function",
        b"goto", b"if", b"in", b"local", b"nil", b"not", b"or", b"repeat", b"return", b"then",
        b"true", b"until", b"while",
    ];
    !bytes.is_empty()
        && !bytes[0].is_ascii_digit()
        && bytes
            .iter()
            .all(|&c| c.is_ascii_alphanumeric() || c == b'_')
        && !KEYWORDS.contains(&bytes)
}

/// String-literal quoting for `to_literal`: common escapes spelled out,
/// other non-printable bytes as 3-digit decimal escapes.
fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            other => out.push_str(&format!("\\{other:03}")),
        }
    }
    out.push('"');
    out
}

/* ───────────────────── vallists ───────────────────── */

/// An ordered multi-value sequence: arguments, returns, and the right-hand
/// side of a multiple assignment. Reads past the end yield `nil`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vallist(SmallVec<[Value; 4]>);

impl Vallist {
    pub fn new() -> Vallist {
        Vallist(SmallVec::new())
    }

    pub fn of(value: Value) -> Vallist {
        let mut list = Vallist::new();
        list.push(value);
        list
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn extend(&mut self, other: Vallist) {
        self.0.extend(other.0);
    }

    /// Positional read; out-of-range positions are `nil`.
    pub fn get(&self, index: usize) -> Value {
        self.0.get(index).cloned().unwrap_or_else(Value::nil)
    }

    pub fn first(&self) -> Value {
        self.get(0)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

impl From<Vec<Value>> for Vallist {
    fn from(values: Vec<Value>) -> Vallist {
        Vallist(values.into())
    }
}

impl FromIterator<Value> for Vallist {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Vallist {
        Vallist(iter.into_iter().collect())
    }
}

impl IntoIterator for Vallist {
    type Item = Value;
    type IntoIter = smallvec::IntoIter<[Value; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_only_rejects_nil_and_false() {
        assert!(!Value::nil().truthy());
        assert!(!Value::from(false).truthy());
        assert!(Value::from(true).truthy());
        assert!(Value::from(0i64).truthy());
        assert!(Value::from("").truthy());
    }

    #[test]
    fn equality_ignores_origin() {
        use bilua_common::Range;
        let plain = Value::from(38i64);
        let tracked = Value::from(38i64).with_origin(Origin::Literal {
            range: Range::default(),
        });
        assert_eq!(plain, tracked);
    }

    #[test]
    fn int_and_float_compare_numerically() {
        assert_eq!(Value::from(3i64), Value::from(3.0));
        assert_ne!(Value::from(3i64), Value::from(3.5));
    }

    #[test]
    fn scalar_literals() {
        let arena = TableArena::new();
        assert_eq!(Value::nil().to_literal(&arena).unwrap(), "nil");
        assert_eq!(Value::from(38i64).to_literal(&arena).unwrap(), "38");
        assert_eq!(Value::from(14.0).to_literal(&arena).unwrap(), "14.0");
        assert_eq!(
            Value::from("hi\n").to_literal(&arena).unwrap(),
            "\"hi\\n\""
        );
    }

    #[test]
    fn cyclic_table_literal_is_rejected() {
        let mut arena = TableArena::new();
        let handle = arena.allocate();
        arena
            .get_mut(handle)
            .set(Value::from("me"), Value::from(handle))
            .unwrap();
        let err = Value::from(handle).to_literal(&arena).unwrap_err();
        assert_eq!(err.kind, bilua_common::LuaErrorKind::NotRepresentable);
    }

    #[test]
    fn vallist_pads_with_nil() {
        let list = Vallist::of(Value::from(1i64));
        assert_eq!(list.get(0), Value::from(1i64));
        assert_eq!(list.get(5), Value::nil());
    }
}
