//! The table store.
//!
//! All tables of one interpreter live in a [`TableArena`] and are addressed
//! by opaque [`TableHandle`]s. Copying a table Value copies the handle, so
//! every holder observes mutations; equality and hashing use the handle
//! alone. Handles stay valid until the arena is torn down.

use rustc_hash::FxHashMap;

use bilua_common::LuaError;

use crate::number::Number;
use crate::value::{RawValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle(u32);

impl TableHandle {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// One table: insertion-ordered entries plus a hash index for lookup.
/// Keys compare with value semantics (so `t[2]` and `t[2.0]` are the same
/// slot), minus origins.
#[derive(Debug, Default)]
pub struct TableData {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<Value, usize>,
    metatable: Option<TableHandle>,
}

impl TableData {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metatable(&self) -> Option<TableHandle> {
        self.metatable
    }

    pub fn set_metatable(&mut self, metatable: Option<TableHandle>) {
        self.metatable = metatable;
    }

    /// Raw read; absent keys yield `nil`. The stored key's origin is
    /// irrelevant to the lookup.
    pub fn get(&self, key: &Value) -> Value {
        self.index
            .get(key)
            .map(|&slot| self.entries[slot].1.clone())
            .unwrap_or_else(Value::nil)
    }

    /// Raw write. Writing `nil` erases the key; nil or NaN keys are errors.
    pub fn set(&mut self, key: Value, value: Value) -> Result<(), LuaError> {
        if key.is_nil() {
            return Err(LuaError::type_error("table index is nil"));
        }
        if matches!(key.raw(), RawValue::Number(n) if n.is_nan()) {
            return Err(LuaError::arithmetic("table index is NaN"));
        }

        match self.index.get(&key).copied() {
            Some(slot) => {
                if value.is_nil() {
                    self.remove_slot(slot);
                } else {
                    self.entries[slot].1 = value;
                }
            }
            None => {
                if !value.is_nil() {
                    self.index.insert(key.clone().remove_origin(), self.entries.len());
                    self.entries.push((key, value));
                }
            }
        }
        Ok(())
    }

    fn remove_slot(&mut self, slot: usize) {
        let (key, _) = self.entries.remove(slot);
        self.index.remove(&key);
        for moved in self.index.values_mut() {
            if *moved > slot {
                *moved -= 1;
            }
        }
    }

    /// The length-operator result: an `n` with `t[n]` non-nil and `t[n+1]`
    /// nil, 0 when `t[1]` is nil.
    pub fn border(&self) -> i64 {
        let mut n: i64 = 0;
        while !self.get(&Value::from(Number::Int(n + 1))).is_nil() {
            n += 1;
        }
        n
    }

    /// Insertion-order iteration.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// `next`: `None` key yields the first pair; otherwise the pair after
    /// `key` in insertion order. The end of the table is `Ok(None)`.
    pub fn next_pair(&self, key: Option<&Value>) -> Result<Option<(Value, Value)>, LuaError> {
        let slot = match key {
            None => 0,
            Some(key) => match self.index.get(key) {
                Some(&slot) => slot + 1,
                None => {
                    return Err(LuaError::type_error("invalid key to 'next'"));
                }
            },
        };
        Ok(self.entries.get(slot).cloned())
    }
}

/// Arena of all tables belonging to one interpreter. Not shared across
/// interpreters; single-threaded.
#[derive(Debug, Default)]
pub struct TableArena {
    tables: Vec<TableData>,
}

impl TableArena {
    pub fn new() -> TableArena {
        TableArena::default()
    }

    pub fn allocate(&mut self) -> TableHandle {
        let handle = TableHandle(self.tables.len() as u32);
        self.tables.push(TableData::default());
        handle
    }

    pub fn get(&self, handle: TableHandle) -> &TableData {
        &self.tables[handle.0 as usize]
    }

    pub fn get_mut(&mut self, handle: TableHandle) -> &mut TableData {
        &mut self.tables[handle.0 as usize]
    }

    /// Bulk teardown. Existing handles must not be used afterwards.
    pub fn free_all(&mut self) {
        self.tables.clear();
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
