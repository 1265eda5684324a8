//! Shared byte buffer with an explicit frozen/unfrozen split.
//!
//! Grounded on `examples/original_source/src/vm/datatype/bytes.cpp`: bytes
//! can be built mutable (a buffer under construction) and then frozen into
//! an immutable, freely shareable view, at which point mutation methods
//! become unavailable rather than racing under a lock.

use parking_lot::RwLock;

enum Storage {
    Frozen(Box<[u8]>),
    Mutable(RwLock<Vec<u8>>),
}

pub struct ArBytes {
    storage: Storage,
}

impl ArBytes {
    pub fn from_vec(v: Vec<u8>) -> Self {
        ArBytes {
            storage: Storage::Mutable(RwLock::new(v)),
        }
    }

    pub fn frozen(v: Vec<u8>) -> Self {
        ArBytes {
            storage: Storage::Frozen(v.into_boxed_slice()),
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.storage, Storage::Frozen(_))
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Frozen(b) => b.len(),
            Storage::Mutable(v) => v.read().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current bytes. Cheap for the frozen case (borrow),
    /// allocating for the mutable case since a live reference can't outlive
    /// the read guard.
    pub fn to_vec(&self) -> Vec<u8> {
        match &self.storage {
            Storage::Frozen(b) => b.to_vec(),
            Storage::Mutable(v) => v.read().clone(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Frozen(b) => b,
            Storage::Mutable(_) => {
                panic!("as_slice() is only available on frozen bytes; use to_vec() or with_read()")
            }
        }
    }

    pub fn with_read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        match &self.storage {
            Storage::Frozen(b) => f(b),
            Storage::Mutable(v) => f(&v.read()),
        }
    }

    pub fn push(&self, byte: u8) -> Result<(), ()> {
        match &self.storage {
            Storage::Frozen(_) => Err(()),
            Storage::Mutable(v) => {
                v.write().push(byte);
                Ok(())
            }
        }
    }

    /// Consumes a mutable buffer and returns a frozen copy; no-op clone if
    /// already frozen.
    pub fn freeze(&self) -> ArBytes {
        match &self.storage {
            Storage::Frozen(b) => ArBytes::frozen(b.to_vec()),
            Storage::Mutable(v) => ArBytes::frozen(v.read().clone()),
        }
    }
}

impl std::fmt::Debug for ArBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArBytes")
            .field("len", &self.len())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutable_push_then_freeze() {
        let b = ArBytes::from_vec(vec![1, 2, 3]);
        b.push(4).unwrap();
        assert_eq!(b.as_slice(), &[1, 2, 3, 4]);
        let frozen = b.freeze();
        assert!(frozen.is_frozen());
        assert!(frozen.push(5).is_err());
    }

    #[test]
    fn frozen_rejects_mutation() {
        let b = ArBytes::frozen(vec![9, 9]);
        assert!(b.push(1).is_err());
        assert_eq!(b.len(), 2);
    }
}
