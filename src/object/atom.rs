//! Interned, identity-compared unique-by-string values.
//!
//! Grounded on `examples/original_source/src/vm/datatype/atom.cpp`: atoms are
//! compared and hashed by their interned string, but two atoms built from the
//! same string are the *same* allocation, so identity comparison is equivalent
//! to string comparison after interning.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

static ATOM_TABLE: Lazy<Mutex<HashMap<String, Arc<str>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// An interned atom. Cloning is a cheap `Arc` bump; two atoms interned from
/// equal strings point at the same backing allocation.
#[derive(Debug, Clone, Eq)]
pub struct Atom(Arc<str>);

impl Atom {
    pub fn intern(s: &str) -> Self {
        let mut table = ATOM_TABLE.lock();
        if let Some(existing) = table.get(s) {
            return Atom(existing.clone());
        }
        let arc: Arc<str> = Arc::from(s);
        table.insert(s.to_string(), arc.clone());
        Atom(arc)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity comparison: true iff both atoms were interned from the same string.
    pub fn is(&self, other: &Atom) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl std::hash::Hash for Atom {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_atoms_share_allocation() {
        let a = Atom::intern("TypeError");
        let b = Atom::intern("TypeError");
        assert!(a.is(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_strings_are_distinct_atoms() {
        let a = Atom::intern("TypeError");
        let b = Atom::intern("ValueError");
        assert!(!a.is(&b));
    }
}
