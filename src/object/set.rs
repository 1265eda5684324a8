//! Hash set built directly on top of [`super::dict::Dict`], storing members
//! as keys mapped to `Nil`.
//!
//! Grounded on `examples/original_source/src/vm/datatype/set.cpp`, which
//! itself is implemented as a thin wrapper over the same `HashMap` backing
//! `Dict` — we follow the same reuse here instead of duplicating the
//! chaining/freelist machinery.

use super::dict::Dict;
use super::Value;

pub struct ArSet {
    inner: Dict,
}

impl ArSet {
    pub fn new() -> Self {
        ArSet { inner: Dict::new() }
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let set = ArSet::new();
        for v in values {
            set.add(v);
        }
        set
    }

    pub fn add(&self, v: Value) -> bool {
        self.inner.insert(v, Value::Nil).is_none()
    }

    pub fn contains(&self, v: &Value) -> bool {
        self.inner.contains_key(v)
    }

    pub fn remove(&self, v: &Value) -> bool {
        self.inner.remove(v).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn members(&self) -> Vec<Value> {
        self.inner.items().into_iter().map(|(k, _)| k).collect()
    }

    pub fn union(&self, other: &ArSet) -> ArSet {
        let result = ArSet::from_values(self.members());
        for v in other.members() {
            result.add(v);
        }
        result
    }

    pub fn intersection(&self, other: &ArSet) -> ArSet {
        ArSet::from_values(self.members().into_iter().filter(|v| other.contains(v)))
    }

    pub fn difference(&self, other: &ArSet) -> ArSet {
        ArSet::from_values(self.members().into_iter().filter(|v| !other.contains(v)))
    }

    pub fn symmetric_difference(&self, other: &ArSet) -> ArSet {
        let a_minus_b = self.difference(other);
        let b_minus_a = other.difference(self);
        a_minus_b.union(&b_minus_a)
    }
}

impl Default for ArSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ArSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.members()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_contains_remove() {
        let s = ArSet::new();
        assert!(s.add(Value::Int(1)));
        assert!(!s.add(Value::Int(1)));
        assert!(s.contains(&Value::Int(1)));
        assert!(s.remove(&Value::Int(1)));
        assert!(!s.contains(&Value::Int(1)));
    }

    #[test]
    fn set_algebra() {
        let a = ArSet::from_values([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let b = ArSet::from_values([Value::Int(2), Value::Int(3), Value::Int(4)]);

        assert_eq!(a.union(&b).len(), 4);
        assert_eq!(a.intersection(&b).len(), 2);
        assert_eq!(a.difference(&b).len(), 1);
        assert_eq!(a.symmetric_difference(&b).len(), 2);
    }
}
