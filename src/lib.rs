//! `argon_rt` — the execution runtime for an Argon-style dynamic language:
//! an M:N fiber scheduler, a stack-based bytecode evaluator, and a
//! reference-counted + cycle-collecting object model with C3-linearized
//! multiple inheritance.
//!
//! The lexer/parser/compiler front end and the concrete importer (file
//! search, package resolution) are out of scope; this crate exposes their
//! boundaries as traits (`compiler::Compile`, `import::Importer`) and ships
//! a minimal textual assembler so the runtime is self-exercising without a
//! real front end.

pub mod code;
pub mod compiler;
pub mod config;
pub mod error;
pub mod eval;
pub mod fiber;
pub mod frame;
pub mod function;
pub mod gc;
pub mod import;
pub mod object;
pub mod panic;
pub mod sched;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use config::{Config, RuntimeConfig};
use error::{VmError, VmResult};
use object::Value;
use sched::Scheduler;

static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// The process-wide handle a host embeds: the scheduler plus the module
/// importer. Mirrors spec.md §6's entry-point contract (`Initialize`,
/// `Eval`, `Spawn`, `Shutdown`).
pub struct Runtime {
    pub scheduler: Arc<Scheduler>,
    pub importer: parking_lot::RwLock<import::Importer>,
}

impl Runtime {
    fn new(config: &RuntimeConfig) -> Arc<Self> {
        Arc::new(Runtime {
            scheduler: Scheduler::new(config.max_vc, config.max_ost, config.fiber_ss, config.queue_max_len),
            importer: parking_lot::RwLock::new(import::Importer::new()),
        })
    }

    pub fn spawn(&self, func: Arc<function::Function>, args: Vec<Value>) -> Arc<object::future::Future> {
        self.scheduler.spawn(func, args)
    }

    pub fn eval(&self, func: Arc<function::Function>, args: Vec<Value>) -> Result<Value, Value> {
        self.scheduler.eval_sync(func, args)
    }
}

/// Brings up the process-wide runtime: starts the scheduler's worker pool
/// sized per `config`. Fails with [`VmError::AlreadyInitialized`] if called
/// twice without an intervening [`shutdown`].
pub fn initialize(config: RuntimeConfig) -> VmResult<Arc<Runtime>> {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        return Err(VmError::AlreadyInitialized);
    }
    let runtime = Runtime::new(&config);
    runtime.scheduler.run_workers(config.max_ost.min(config.max_vc.max(1)));
    RUNTIME
        .set(runtime.clone())
        .unwrap_or_else(|_| panic!("runtime cell already set despite passing the init guard"));
    Ok(runtime)
}

/// Brings up the runtime using `argon.toml` discovered by searching upward
/// from the current directory, falling back to defaults.
pub fn initialize_from_cwd() -> VmResult<Arc<Runtime>> {
    let config = Config::load_from_cwd()?;
    initialize(config.runtime)
}

pub fn current() -> VmResult<Arc<Runtime>> {
    RUNTIME.get().cloned().ok_or(VmError::NotInitialized)
}

/// Runs every native module's `fini` hook, then stops the scheduler's
/// worker threads, retrying the join for a bounded number of attempts
/// before giving up.
pub fn shutdown() -> VmResult<()> {
    let runtime = current()?;
    runtime.importer.read().finalize_all();
    if !runtime.scheduler.shutdown() {
        return Err(VmError::ShutdownTimeout(10));
    }
    INITIALIZED.store(false, Ordering::Release);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Code;
    use crate::eval::opcode::{encode, Opcode};
    use crate::function::{Function, FunctionFlags};
    use crate::object::namespace::Namespace;
    use crate::object::tuple::Tuple;

    #[test]
    fn initialize_eval_shutdown_round_trip() {
        let mut instr = Vec::new();
        instr.extend(encode(Opcode::LStatic, 0));
        instr.extend(encode(Opcode::Return, 0));
        let statics = Tuple::new(vec![Value::Int(7)]);
        let empty = Tuple::new(vec![]);
        let code = Code::new(instr, 4, statics, empty.clone(), empty.clone(), empty);
        let func = Function::new_code("seven", code, 0, FunctionFlags::empty(), vec![], Arc::new(Namespace::new()));

        let mut config = RuntimeConfig::default();
        config.max_vc = 1;
        config.max_ost = 1;
        let runtime = initialize(config).expect("first initialize should succeed");

        assert!(matches!(runtime.eval(func, vec![]), Ok(Value::Int(7))));
        assert!(matches!(initialize(RuntimeConfig::default()), Err(VmError::AlreadyInitialized)));

        shutdown().expect("shutdown should succeed");
    }
}
