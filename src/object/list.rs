//! Mutable, growable sequence behind a single shared lock.
//!
//! Grounded on `examples/original_source/src/vm/datatype/list.cpp`: lists
//! support negative indices and Python-style slicing via `Bounds`, and all
//! mutation goes through one lock so iteration and index assignment can't
//! interleave torn writes (the original VM uses a spinlock on the object
//! header for the same purpose).

use parking_lot::RwLock;

use super::bounds::Bounds;
use super::Value;

pub struct List {
    items: RwLock<Vec<Value>>,
}

impl List {
    pub fn new() -> Self {
        List {
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn from_vec(v: Vec<Value>) -> Self {
        List {
            items: RwLock::new(v),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, v: Value) {
        self.items.write().push(v);
    }

    pub fn pop(&self) -> Option<Value> {
        self.items.write().pop()
    }

    fn normalize(idx: i64, len: usize) -> Option<usize> {
        let len = len as i64;
        let real = if idx < 0 { idx + len } else { idx };
        if real < 0 || real >= len {
            None
        } else {
            Some(real as usize)
        }
    }

    pub fn get(&self, idx: i64) -> Option<Value> {
        let items = self.items.read();
        Self::normalize(idx, items.len()).map(|i| items[i].clone())
    }

    pub fn set(&self, idx: i64, value: Value) -> Result<(), ()> {
        let mut items = self.items.write();
        match Self::normalize(idx, items.len()) {
            Some(i) => {
                items[i] = value;
                Ok(())
            }
            None => Err(()),
        }
    }

    pub fn insert(&self, idx: i64, value: Value) -> Result<(), ()> {
        let mut items = self.items.write();
        let len = items.len();
        match Self::normalize(idx, len.max(1)) {
            Some(i) if i <= len => {
                items.insert(i, value);
                Ok(())
            }
            _ if idx == len as i64 => {
                items.push(value);
                Ok(())
            }
            _ => Err(()),
        }
    }

    pub fn remove(&self, idx: i64) -> Option<Value> {
        let mut items = self.items.write();
        Self::normalize(idx, items.len()).map(|i| items.remove(i))
    }

    /// Returns the elements selected by `bounds`, applying step direction.
    pub fn slice(&self, bounds: &Bounds) -> Vec<Value> {
        let items = self.items.read();
        let (start, stop, step) = bounds.resolve(items.len());
        let mut out = Vec::new();
        if step > 0 {
            let mut i = start;
            while i < stop {
                out.push(items[i].clone());
                i += step as usize;
            }
        } else if step < 0 {
            let mut i = start as i64;
            while i > stop as i64 {
                out.push(items[i as usize].clone());
                i += step as i64;
            }
        }
        out
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    pub fn extend(&self, other: &[Value]) {
        self.items.write().extend_from_slice(other);
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for List {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_get_negative_index() {
        let l = List::new();
        l.push(Value::Int(1));
        l.push(Value::Int(2));
        l.push(Value::Int(3));
        assert!(matches!(l.get(-1), Some(Value::Int(3))));
        assert!(l.get(3).is_none());
    }

    #[test]
    fn insert_and_remove() {
        let l = List::from_vec(vec![Value::Int(1), Value::Int(3)]);
        l.insert(1, Value::Int(2)).unwrap();
        assert_eq!(l.len(), 3);
        let removed = l.remove(1).unwrap();
        assert!(matches!(removed, Value::Int(2)));
    }

    #[test]
    fn slice_with_step() {
        let l = List::from_vec((0..10).map(Value::Int).collect());
        let bounds = Bounds::new(Some(0), Some(10), Some(2));
        let sliced = l.slice(&bounds);
        let vals: Vec<i64> = sliced
            .into_iter()
            .map(|v| match v {
                Value::Int(n) => n,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(vals, vec![0, 2, 4, 6, 8]);
    }
}
