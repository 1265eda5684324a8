//! The immutable compiled-unit artifact produced by the compiler boundary
//! and executed by the evaluator.
//!
//! Grounded on `examples/original_source/src/vm/datatype/code.cpp`: a
//! `Code` is pure data — raw instruction bytes plus three constant-pool
//! tuples (statics, global names, local names) and a closure capture list.
//! It never changes after construction, so sharing it across fibers (and
//! across repeated calls to the same function) needs no locking.

use std::sync::Arc;

use crate::object::tuple::Tuple;
use crate::object::Value;

pub struct Code {
    pub instr: Box<[u8]>,
    /// Eval-stack depth this unit requires, computed by the compiler so the
    /// evaluator can preallocate the frame's stack slots exactly once.
    pub stack_sz: u32,
    pub statics: Arc<Tuple>,
    pub names: Arc<Tuple>,
    pub locals: Arc<Tuple>,
    pub enclosed: Arc<Tuple>,
    hash: u64,
}

impl Code {
    pub fn new(
        instr: Vec<u8>,
        stack_sz: u32,
        statics: Arc<Tuple>,
        names: Arc<Tuple>,
        locals: Arc<Tuple>,
        enclosed: Arc<Tuple>,
    ) -> Arc<Code> {
        let mut h = Hasher(0xcbf29ce484222325);
        for &b in &instr {
            h.write(b);
        }
        Arc::new(Code {
            instr: instr.into_boxed_slice(),
            stack_sz,
            statics,
            names,
            locals,
            enclosed,
            hash: h.0,
        })
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn len(&self) -> usize {
        self.instr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instr.is_empty()
    }

    pub fn local_name(&self, idx: usize) -> Option<String> {
        self.locals.get(idx).and_then(|v| match v {
            Value::Str(s) => Some(s.as_str().to_string()),
            _ => None,
        })
    }

    pub fn global_name(&self, idx: usize) -> Option<String> {
        self.names.get(idx).and_then(|v| match v {
            Value::Str(s) => Some(s.as_str().to_string()),
            _ => None,
        })
    }

    pub fn static_value(&self, idx: usize) -> Option<Value> {
        self.statics.get(idx).cloned()
    }
}

struct Hasher(u64);
impl Hasher {
    fn write(&mut self, b: u8) {
        self.0 = self.0.wrapping_mul(0x100000001b3) ^ (b as u64);
    }
}

impl std::fmt::Debug for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Code")
            .field("len", &self.instr.len())
            .field("stack_sz", &self.stack_sz)
            .field("hash", &self.hash)
            .finish()
    }
}
