//! A string/atom-keyed attribute map with per-entry visibility flags.
//!
//! Grounded on `examples/original_source/src/vm/datatype/namespace.cpp`:
//! every binding is tagged `public`/`const`/`weak` at insertion time, and
//! those flags are what `type_set_attr`/`type_get_attr` (see
//! `src/object/types.rs`) consult to enforce the dot-access visibility and
//! mutability rules.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::Value;

/// Visibility/mutability bits for a namespace binding. A hand-rolled bitset
/// rather than the `bitflags` crate since three bits don't earn a new
/// dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrFlags(u8);

impl AttrFlags {
    pub const PUBLIC: AttrFlags = AttrFlags(0b001);
    pub const CONST: AttrFlags = AttrFlags(0b010);
    pub const WEAK: AttrFlags = AttrFlags(0b100);

    pub const fn empty() -> Self {
        AttrFlags(0)
    }

    pub fn contains(self, other: AttrFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AttrFlags {
    type Output = AttrFlags;
    fn bitor(self, rhs: AttrFlags) -> AttrFlags {
        AttrFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    flags: AttrFlags,
}

pub struct Namespace {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn declare(&self, name: impl Into<String>, value: Value, flags: AttrFlags) {
        self.entries
            .write()
            .insert(name.into(), Entry { value, flags });
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.read().get(name).map(|e| e.value.clone())
    }

    pub fn flags(&self, name: &str) -> Option<AttrFlags> {
        self.entries.read().get(name).map(|e| e.flags)
    }

    pub fn is_const(&self, name: &str) -> bool {
        self.flags(name).map(|f| f.contains(AttrFlags::CONST)).unwrap_or(false)
    }

    pub fn is_public(&self, name: &str) -> bool {
        self.flags(name).map(|f| f.contains(AttrFlags::PUBLIC)).unwrap_or(false)
    }

    /// Overwrites an existing binding's value, failing if it's `const`.
    pub fn set(&self, name: &str, value: Value) -> Result<(), ()> {
        let mut entries = self.entries.write();
        match entries.get_mut(name) {
            Some(entry) if entry.flags.contains(AttrFlags::CONST) => Err(()),
            Some(entry) => {
                entry.value = value;
                Ok(())
            }
            None => Err(()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace").field("keys", &self.keys()).finish()
    }
}
