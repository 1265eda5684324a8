//! Evaluator: opcode set, instruction encoding, and the dispatch loop.

pub mod dispatch;
pub mod opcode;

pub use dispatch::{eval_fiber, EvalOutcome};
