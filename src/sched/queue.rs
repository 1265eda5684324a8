//! A doubly-linked, mutex-guarded FIFO of runnable fibers, with
//! midpoint-split work stealing.
//!
//! Grounded on `examples/original_source/src/vm/fqueue.h` / `.cpp`
//! (`FiberQueue`): fibers carry their own `rq_prev`/`rq_next` links (see
//! `crate::fiber::Fiber`), so the queue itself just tracks head/tail ids
//! and a length under one `std::mutex`-equivalent.

use parking_lot::Mutex;
use std::collections::HashMap;

struct Links {
    prev: Option<u64>,
    next: Option<u64>,
}

struct Inner {
    head: Option<u64>,
    tail: Option<u64>,
    links: HashMap<u64, Links>,
    len: usize,
    max_len: usize,
}

pub struct FiberQueue {
    inner: Mutex<Inner>,
}

impl FiberQueue {
    pub fn new(max_len: usize) -> Self {
        FiberQueue {
            inner: Mutex::new(Inner {
                head: None,
                tail: None,
                links: HashMap::new(),
                len: 0,
                max_len,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends to the tail. Returns `false` (fiber rejected) if the queue
    /// is already at its configured maximum length. A `max_len` of `0`
    /// means unbounded.
    pub fn enqueue(&self, fiber_id: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.max_len != 0 && inner.len >= inner.max_len {
            return false;
        }
        let old_tail = inner.tail;
        inner.links.insert(
            fiber_id,
            Links {
                prev: old_tail,
                next: None,
            },
        );
        if let Some(t) = old_tail {
            inner.links.get_mut(&t).unwrap().next = Some(fiber_id);
        } else {
            inner.head = Some(fiber_id);
        }
        inner.tail = Some(fiber_id);
        inner.len += 1;
        true
    }

    /// Pushes to the head instead of the tail: used to put a fiber that
    /// just yielded back at the front of its own local queue.
    pub fn insert_head(&self, fiber_id: u64) {
        let mut inner = self.inner.lock();
        let old_head = inner.head;
        inner.links.insert(
            fiber_id,
            Links {
                prev: None,
                next: old_head,
            },
        );
        if let Some(h) = old_head {
            inner.links.get_mut(&h).unwrap().prev = Some(fiber_id);
        } else {
            inner.tail = Some(fiber_id);
        }
        inner.head = Some(fiber_id);
        inner.len += 1;
    }

    pub fn dequeue(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        let head = inner.head?;
        Self::unlink_locked(&mut inner, head);
        Some(head)
    }

    /// Removes an arbitrary fiber from wherever it sits in the queue
    /// (`Relinquish` in the original), used when a scheduler decides a
    /// queued fiber should instead run immediately on the calling thread.
    pub fn relinquish(&self, fiber_id: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.links.contains_key(&fiber_id) {
            Self::unlink_locked(&mut inner, fiber_id);
            true
        } else {
            false
        }
    }

    fn unlink_locked(inner: &mut Inner, fiber_id: u64) {
        let links = inner.links.remove(&fiber_id).expect("fiber not in queue");
        match links.prev {
            Some(p) => inner.links.get_mut(&p).unwrap().next = links.next,
            None => inner.head = links.next,
        }
        match links.next {
            Some(n) => inner.links.get_mut(&n).unwrap().prev = links.prev,
            None => inner.tail = links.prev,
        }
        inner.len -= 1;
    }

    /// Steals up to half this queue's fibers (rounded so the victim keeps
    /// at least one), removing them from the tail end and returning them in
    /// FIFO order for the thief to enqueue locally. Mirrors `StealDequeue`'s
    /// midpoint split in `runtime.cpp`.
    pub fn steal_half(&self) -> Vec<u64> {
        let mut inner = self.inner.lock();
        let take = inner.len / 2;
        if take == 0 {
            return Vec::new();
        }
        let mut stolen = Vec::with_capacity(take);
        for _ in 0..take {
            let tail = match inner.tail {
                Some(t) => t,
                None => break,
            };
            Self::unlink_locked(&mut inner, tail);
            stolen.push(tail);
        }
        stolen.reverse();
        stolen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let q = FiberQueue::new(100);
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), Some(3));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn insert_head_jumps_the_line() {
        let q = FiberQueue::new(100);
        q.enqueue(1);
        q.enqueue(2);
        q.insert_head(99);
        assert_eq!(q.dequeue(), Some(99));
        assert_eq!(q.dequeue(), Some(1));
    }

    #[test]
    fn max_len_rejects_overflow() {
        let q = FiberQueue::new(1);
        assert!(q.enqueue(1));
        assert!(!q.enqueue(2));
    }

    #[test]
    fn relinquish_removes_from_middle() {
        let q = FiberQueue::new(100);
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        assert!(q.relinquish(2));
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(3));
    }

    #[test]
    fn steal_half_takes_from_tail() {
        let q = FiberQueue::new(100);
        for i in 1..=6 {
            q.enqueue(i);
        }
        let stolen = q.steal_half();
        assert_eq!(stolen.len(), 3);
        assert_eq!(stolen, vec![4, 5, 6]);
        assert_eq!(q.len(), 3);
    }
}
