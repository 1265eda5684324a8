//! Per-call activation record.
//!
//! Grounded on `examples/original_source/src/vm/frame.cpp`: in the
//! original VM a frame's eval-stack and locals slots are allocated inline
//! right after the frame struct, out of the fiber's bump region. Rust's
//! aliasing rules make that exact layout awkward to express safely, so
//! this port keeps the same *shape* (globals, optional instance, code,
//! instruction pointer, eval stack, locals, enclosed list, deferred chain,
//! return value, caller back-pointer, owner fiber id) but gives the eval
//! stack and locals their own `Vec` rather than being appended in raw
//! memory after the struct.

use std::sync::Arc;

use crate::code::Code;
use crate::object::namespace::Namespace;
use crate::object::Value;

/// One link in a frame's `defer` chain: a deferred call plus the frame that
/// registered it, so `cu_defer`-equivalent access to "the return value of
/// the call currently being deferred" is possible from within a recover
/// handler.
pub struct DeferEntry {
    pub callee: Value,
    pub args: Vec<Value>,
    pub return_value: Option<Value>,
}

pub struct Frame {
    pub globals: Arc<Namespace>,
    /// Bound `self` for method calls; `None` for plain function calls.
    pub instance: Option<Value>,
    pub code: Arc<Code>,
    pub instr_ptr: usize,
    pub eval_stack: Vec<Value>,
    pub locals: Vec<Value>,
    pub enclosed: Vec<Value>,
    pub defer_chain: Vec<DeferEntry>,
    pub return_value: Option<Value>,
    pub caller: Option<Box<Frame>>,
    pub owner_fiber: u64,
}

impl Frame {
    pub fn new(
        globals: Arc<Namespace>,
        instance: Option<Value>,
        code: Arc<Code>,
        locals_count: usize,
        enclosed: Vec<Value>,
        owner_fiber: u64,
        caller: Option<Box<Frame>>,
    ) -> Self {
        Frame {
            globals,
            instance,
            eval_stack: Vec::with_capacity(code.stack_sz as usize),
            code,
            instr_ptr: 0,
            locals: vec![Value::Nil; locals_count],
            enclosed,
            defer_chain: Vec::new(),
            return_value: None,
            caller,
            owner_fiber,
        }
    }

    /// Stable identity for panic `gen_id` matching: the frame's address at
    /// the moment it's boxed on the heap. Only meaningful while the frame
    /// is alive; never persisted past its lifetime.
    pub fn address(&self) -> usize {
        self as *const Frame as usize
    }

    pub fn push(&mut self, v: Value) {
        self.eval_stack.push(v);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.eval_stack.pop()
    }

    pub fn peek(&self) -> Option<&Value> {
        self.eval_stack.last()
    }

    pub fn push_defer(&mut self, callee: Value, args: Vec<Value>) {
        self.defer_chain.push(DeferEntry {
            callee,
            args,
            return_value: None,
        });
    }

    pub fn pop_defer(&mut self) -> Option<DeferEntry> {
        self.defer_chain.pop()
    }

    /// The `cu_defer`-equivalent: the return value of the deferred call
    /// currently executing, if any is in flight.
    pub fn current_defer_return(&self) -> Option<&Value> {
        self.defer_chain.last().and_then(|d| d.return_value.as_ref())
    }
}
