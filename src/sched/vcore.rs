//! A virtual core: a local run queue plus a wiring flag.
//!
//! Grounded on `examples/original_source/src/vm/runtime.cpp`'s `VCore`
//! struct: at most one `OSThread` may be "wired" to a given `VCore` at a
//! time, enforced here with a `compare_exchange` on `wired` rather than the
//! original's mutex-guarded linked list membership.

use std::sync::atomic::{AtomicBool, Ordering};

use super::queue::FiberQueue;

pub struct VCore {
    pub id: usize,
    pub queue: FiberQueue,
    wired: AtomicBool,
    pub stealing: AtomicBool,
}

impl VCore {
    pub fn new(id: usize, queue_max_len: usize) -> Self {
        VCore {
            id,
            queue: FiberQueue::new(queue_max_len),
            wired: AtomicBool::new(false),
            stealing: AtomicBool::new(false),
        }
    }

    /// Attempts to wire this VCore to the calling OS thread. Returns
    /// `false` if another thread already holds it.
    pub fn try_wire(&self) -> bool {
        self.wired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn unwire(&self) {
        self.wired.store(false, Ordering::Release);
    }

    pub fn is_wired(&self) -> bool {
        self.wired.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_wire_succeeds() {
        let vc = VCore::new(0, 64);
        assert!(vc.try_wire());
        assert!(!vc.try_wire());
        vc.unwire();
        assert!(vc.try_wire());
    }
}
