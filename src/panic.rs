//! Per-fiber panic stack and the reserved out-of-memory panic node.
//!
//! Grounded on `examples/original_source/src/vm/panic.h` /
//! `src/vm/runtime.cpp`'s `PanicOOM`: panics form a singly-linked stack per
//! fiber (`prev`), each node carries the payload object, whether it's been
//! `recovered`, and whether a *new* panic interrupted its handling
//! (`aborted`). `gen_id` records the address of the frame that raised the
//! panic so `recover()` can tell "this frame's own panic" apart from one
//! still propagating out of a callee.

use std::sync::Arc;

use crate::object::Value;

pub struct Panic {
    pub prev: Option<Box<Panic>>,
    pub object: Value,
    pub recovered: bool,
    pub aborted: bool,
    /// Address of the frame active when this panic was raised.
    pub gen_id: usize,
}

impl Panic {
    pub fn new(object: Value, gen_id: usize, prev: Option<Box<Panic>>) -> Box<Panic> {
        Box::new(Panic {
            prev,
            object,
            recovered: false,
            aborted: false,
            gen_id,
        })
    }
}

/// Per-fiber panic stack. `push` marks any panic currently being handled
/// (not yet recovered) as `aborted` when a new one interrupts it, matching
/// `RoutineNewPanic` in the original VM.
#[derive(Default)]
pub struct PanicStack {
    top: Option<Box<Panic>>,
}

impl PanicStack {
    pub fn new() -> Self {
        PanicStack { top: None }
    }

    pub fn push(&mut self, object: Value, gen_id: usize) {
        if let Some(top) = self.top.as_mut() {
            if !top.recovered {
                top.aborted = true;
            }
        }
        let prev = self.top.take();
        self.top = Some(Panic::new(object, gen_id, prev));
    }

    pub fn is_panicking(&self) -> bool {
        matches!(&self.top, Some(p) if !p.recovered)
    }

    /// Recovers the top unrecovered panic raised by frame `gen_id`, exactly
    /// the frame that installed a `recover` trap, and returns its payload.
    /// Panics propagating through (raised in a different, deeper frame) are
    /// not recovered here — they keep unwinding.
    pub fn recover(&mut self, gen_id: usize) -> Option<Value> {
        let top = self.top.as_mut()?;
        if top.recovered || top.gen_id != gen_id {
            return None;
        }
        top.recovered = true;
        Some(top.object.clone())
    }

    pub fn pop(&mut self) -> Option<Box<Panic>> {
        let popped = self.top.take();
        if let Some(p) = &popped {
            self.top = p.prev.as_ref().map(|b| {
                Box::new(Panic {
                    prev: b.prev.clone(),
                    object: b.object.clone(),
                    recovered: b.recovered,
                    aborted: b.aborted,
                    gen_id: b.gen_id,
                })
            });
        }
        popped
    }

    /// Pops every panic off the stack, returning the deepest (first raised)
    /// payload — used by a top-level fiber with no future to report a
    /// script failure (the `GetLastError` equivalent).
    pub fn drain_to_last_error(&mut self) -> Option<Value> {
        let mut last = None;
        while let Some(p) = self.pop() {
            last = Some(p.object);
        }
        last
    }

    pub fn top_aborted(&self) -> bool {
        self.top.as_ref().map(|p| p.aborted).unwrap_or(false)
    }
}

impl Clone for Panic {
    fn clone(&self) -> Self {
        Panic {
            prev: self.prev.clone(),
            object: self.object.clone(),
            recovered: self.recovered,
            aborted: self.aborted,
            gen_id: self.gen_id,
        }
    }
}

/// Reserved, preallocated panic node for out-of-memory conditions: raising
/// it must never itself allocate. Swapped in atomically by whichever fiber
/// hits the OOM path first, matching `runtime.cpp`'s `panic_oom` static.
pub struct OomPanic {
    reserved: Arc<Value>,
}

impl OomPanic {
    pub fn new(value: Value) -> Self {
        OomPanic {
            reserved: Arc::new(value),
        }
    }

    pub fn get(&self) -> Value {
        (*self.reserved).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_marks_prior_unrecovered_as_aborted() {
        let mut stack = PanicStack::new();
        stack.push(Value::Int(1), 0x10);
        stack.push(Value::Int(2), 0x20);
        assert!(stack.top_aborted() == false);
        // The first panic (gen_id 0x10) should now be marked aborted since
        // a second one interrupted it before recovery.
        let popped_second = stack.pop().unwrap();
        assert!(!popped_second.aborted);
        let first = stack.pop().unwrap();
        assert!(first.aborted);
    }

    #[test]
    fn recover_only_matches_owning_frame() {
        let mut stack = PanicStack::new();
        stack.push(Value::Int(42), 0xAA);
        assert!(stack.recover(0xBB).is_none());
        let recovered = stack.recover(0xAA);
        assert!(matches!(recovered, Some(Value::Int(42))));
        assert!(!stack.is_panicking());
    }
}
