//! Hash map with chaining, doubly-linked insertion-order iteration, a
//! freelist of reusable slots, and 0.75 load-factor growth.
//!
//! Grounded on `examples/original_source/src/vm/datatype/hashmap.h` and
//! `dict.cpp`: entries live in a flat `Vec<Slot>` indexed by bucket chains
//! (`next` links within a bucket), and a second doubly-linked list threaded
//! through the same slots (`iter_prev`/`iter_next`) preserves insertion
//! order for iteration, the way `dict.items()` walks it in the original VM.
//! Deleted slots are pushed onto a freelist capped at 1024 entries so a
//! dict that churns keys doesn't grow its backing `Vec` without bound.

use parking_lot::RwLock;
use std::hash::Hasher;

use super::Value;

const FREELIST_CAP: usize = 1024;
const LOAD_FACTOR_NUM: usize = 3;
const LOAD_FACTOR_DEN: usize = 4;

struct Slot {
    key: Value,
    value: Value,
    hash: u64,
    /// Next slot in this bucket's chain, `None` if last.
    bucket_next: Option<usize>,
    /// Doubly-linked insertion order, for iteration.
    iter_prev: Option<usize>,
    iter_next: Option<usize>,
    occupied: bool,
}

struct Inner {
    buckets: Vec<Option<usize>>,
    slots: Vec<Slot>,
    freelist: Vec<usize>,
    len: usize,
    iter_head: Option<usize>,
    iter_tail: Option<usize>,
}

impl Inner {
    fn new() -> Self {
        Inner {
            buckets: vec![None; 8],
            slots: Vec::new(),
            freelist: Vec::new(),
            len: 0,
            iter_head: None,
            iter_tail: None,
        }
    }

    fn bucket_index(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn find_slot(&self, key: &Value, hash: u64) -> Option<usize> {
        let mut cur = self.buckets[self.bucket_index(hash)];
        while let Some(idx) = cur {
            let slot = &self.slots[idx];
            if slot.occupied && slot.hash == hash && slot.key.eq_value(key) {
                return Some(idx);
            }
            cur = slot.bucket_next;
        }
        None
    }

    fn needs_rehash(&self) -> bool {
        self.len * LOAD_FACTOR_DEN >= self.buckets.len() * LOAD_FACTOR_NUM
    }

    fn rehash(&mut self) {
        let new_cap = self.buckets.len() + self.buckets.len() / 2 + 1;
        let mut new_buckets: Vec<Option<usize>> = vec![None; new_cap.next_power_of_two()];
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if !slot.occupied {
                continue;
            }
            let b = (slot.hash as usize) & (new_buckets.len() - 1);
            slot.bucket_next = new_buckets[b];
            new_buckets[b] = Some(idx);
        }
        self.buckets = new_buckets;
    }

    fn alloc_slot(&mut self) -> usize {
        if let Some(idx) = self.freelist.pop() {
            idx
        } else {
            self.slots.push(Slot {
                key: Value::Nil,
                value: Value::Nil,
                hash: 0,
                bucket_next: None,
                iter_prev: None,
                iter_next: None,
                occupied: false,
            });
            self.slots.len() - 1
        }
    }

    fn link_tail(&mut self, idx: usize) {
        self.slots[idx].iter_prev = self.iter_tail;
        self.slots[idx].iter_next = None;
        if let Some(tail) = self.iter_tail {
            self.slots[tail].iter_next = Some(idx);
        } else {
            self.iter_head = Some(idx);
        }
        self.iter_tail = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].iter_prev, self.slots[idx].iter_next);
        match prev {
            Some(p) => self.slots[p].iter_next = next,
            None => self.iter_head = next,
        }
        match next {
            Some(n) => self.slots[n].iter_prev = prev,
            None => self.iter_tail = prev,
        }
    }

    fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        let hash = hash_value(&key);
        if let Some(idx) = self.find_slot(&key, hash) {
            let old = std::mem::replace(&mut self.slots[idx].value, value);
            return Some(old);
        }
        if self.needs_rehash() {
            self.rehash();
        }
        let idx = self.alloc_slot();
        let b = self.bucket_index(hash);
        self.slots[idx] = Slot {
            key,
            value,
            hash,
            bucket_next: self.buckets[b],
            iter_prev: None,
            iter_next: None,
            occupied: true,
        };
        self.buckets[b] = Some(idx);
        self.link_tail(idx);
        self.len += 1;
        None
    }

    fn remove(&mut self, key: &Value) -> Option<Value> {
        let hash = hash_value(key);
        let b = self.bucket_index(hash);
        let mut cur = self.buckets[b];
        let mut prev_in_bucket: Option<usize> = None;
        while let Some(idx) = cur {
            let (matches, bucket_next) = {
                let slot = &self.slots[idx];
                (
                    slot.occupied && slot.hash == hash && slot.key.eq_value(key),
                    slot.bucket_next,
                )
            };
            if matches {
                match prev_in_bucket {
                    Some(p) => self.slots[p].bucket_next = bucket_next,
                    None => self.buckets[b] = bucket_next,
                }
                self.unlink(idx);
                let value = std::mem::replace(&mut self.slots[idx].value, Value::Nil);
                self.slots[idx].key = Value::Nil;
                self.slots[idx].occupied = false;
                self.len -= 1;
                if self.freelist.len() < FREELIST_CAP {
                    self.freelist.push(idx);
                }
                return Some(value);
            }
            prev_in_bucket = cur;
            cur = bucket_next;
        }
        None
    }

    fn iter_values(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.iter_head;
        while let Some(idx) = cur {
            let slot = &self.slots[idx];
            out.push((slot.key.clone(), slot.value.clone()));
            cur = slot.iter_next;
        }
        out
    }
}

fn hash_value(v: &Value) -> u64 {
    struct H(u64);
    impl Hasher for H {
        fn finish(&self) -> u64 {
            self.0
        }
        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = self.0.wrapping_mul(0x100000001b3) ^ (b as u64);
            }
        }
    }
    let mut h = H(0xcbf29ce484222325);
    v.hash_value(&mut h);
    h.finish()
}

/// A dict: ordered, hashable-keyed map with interior mutability behind a
/// single `RwLock`, matching the container locking discipline used for
/// every mutable Argon container.
pub struct Dict {
    inner: RwLock<Inner>,
}

impl Dict {
    pub fn new() -> Self {
        Dict {
            inner: RwLock::new(Inner::new()),
        }
    }

    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        self.inner.write().insert(key, value)
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        let inner = self.inner.read();
        let hash = hash_value(key);
        inner
            .find_slot(key, hash)
            .map(|idx| inner.slots[idx].value.clone())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        let inner = self.inner.read();
        inner.find_slot(key, hash_value(key)).is_some()
    }

    pub fn remove(&self, key: &Value) -> Option<Value> {
        self.inner.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of `(key, value)` pairs in insertion order.
    pub fn items(&self) -> Vec<(Value, Value)> {
        self.inner.read().iter_values()
    }
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.items()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let d = Dict::new();
        assert_eq!(d.insert(Value::Int(1), Value::Int(10)), None);
        assert_eq!(d.get(&Value::Int(1)), Some(Value::Int(10)));
        assert_eq!(d.insert(Value::Int(1), Value::Int(20)), Some(Value::Int(10)));
        assert_eq!(d.remove(&Value::Int(1)), Some(Value::Int(20)));
        assert_eq!(d.get(&Value::Int(1)), None);
        assert!(d.is_empty());
    }

    #[test]
    fn preserves_insertion_order() {
        let d = Dict::new();
        for i in [3, 1, 4, 1, 5, 9] {
            d.insert(Value::Int(i), Value::Nil);
        }
        let keys: Vec<i64> = d
            .items()
            .into_iter()
            .map(|(k, _)| match k {
                Value::Int(n) => n,
                _ => unreachable!(),
            })
            .collect();
        // "1" inserted twice updates the existing slot in place, keeping its
        // original position rather than moving to the end.
        assert_eq!(keys, vec![3, 1, 4, 5, 9]);
    }

    #[test]
    fn grows_past_load_factor() {
        let d = Dict::new();
        for i in 0..100 {
            d.insert(Value::Int(i), Value::Int(i * 2));
        }
        assert_eq!(d.len(), 100);
        for i in 0..100 {
            assert_eq!(d.get(&Value::Int(i)), Some(Value::Int(i * 2)));
        }
    }

    #[test]
    fn freelist_reuses_slots_after_removal() {
        let d = Dict::new();
        for i in 0..10 {
            d.insert(Value::Int(i), Value::Nil);
        }
        for i in 0..10 {
            d.remove(&Value::Int(i));
        }
        assert!(d.is_empty());
        d.insert(Value::Int(0), Value::Int(42));
        assert_eq!(d.get(&Value::Int(0)), Some(Value::Int(42)));
    }
}
