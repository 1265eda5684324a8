//! Function objects and the calling convention: currying/partial
//! application, variadic/keyword packing, method instance binding, native
//! dispatch, and generator framing.
//!
//! Grounded on `examples/original_source/src/vm/datatype/function.h`/`.cpp`
//! (the `FunctionFlags` bitset and `FunctionNew` variants) and
//! `src/vm/fiber.cpp`'s `FrameNew` (the exact arg-filling algorithm this
//! module's `bind_call` reimplements).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::code::Code;
use crate::error::{error_value, ErrorKind};
use crate::frame::Frame;
use crate::object::dict::Dict;
use crate::object::list::List;
use crate::object::namespace::Namespace;
use crate::object::types::TypeInfo;
use crate::object::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionFlags(u16);

impl FunctionFlags {
    pub const NATIVE: FunctionFlags = FunctionFlags(1);
    pub const METHOD: FunctionFlags = FunctionFlags(2);
    pub const CLOSURE: FunctionFlags = FunctionFlags(4);
    pub const VARIADIC: FunctionFlags = FunctionFlags(8);
    pub const KWARGS: FunctionFlags = FunctionFlags(16);
    pub const GENERATOR: FunctionFlags = FunctionFlags(32);
    pub const ASYNC: FunctionFlags = FunctionFlags(64);
    pub const RECOVERABLE: FunctionFlags = FunctionFlags(128);

    pub const fn empty() -> Self {
        FunctionFlags(0)
    }

    pub fn contains(self, other: FunctionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Self {
        FunctionFlags(bits)
    }
}

impl std::ops::BitOr for FunctionFlags {
    type Output = FunctionFlags;
    fn bitor(self, rhs: FunctionFlags) -> FunctionFlags {
        FunctionFlags(self.0 | rhs.0)
    }
}

pub type NativeImpl = Arc<dyn Fn(&[Value]) -> Result<Value, Value> + Send + Sync>;

pub enum Body {
    Code(Arc<Code>),
    Native(NativeImpl),
}

/// Generator/async reentrancy guard: a simple CAS-based spinlock keyed by
/// "is somebody in here right now", matching `LockAndGetStatus`/`Unlock` in
/// the original `Function`. The original keys the lock by fiber address;
/// here a bool suffices since only one fiber at a time may ever hold it.
pub struct GeneratorLock(AtomicBool);

impl GeneratorLock {
    pub fn new() -> Self {
        GeneratorLock(AtomicBool::new(false))
    }

    pub fn try_lock(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn unlock(&self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct GeneratorState {
    pub lock: GeneratorLock,
    pub frame: parking_lot::Mutex<Option<Box<Frame>>>,
    pub exhausted: AtomicBool,
}

pub struct Function {
    pub name: String,
    pub qname: String,
    pub doc: String,
    pub body: Body,
    pub currying: Vec<Value>,
    pub enclosed: Vec<Value>,
    pub base: Option<Arc<TypeInfo>>,
    pub globals: Arc<Namespace>,
    pub arity: usize,
    pub flags: FunctionFlags,
    /// Declared parameter names; used for keyword-arg validation and to name
    /// the variadic/kwargs local slot.
    pub param_names: Vec<String>,
    pub generator: Option<GeneratorState>,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("qname", &self.qname)
            .field("arity", &self.arity)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl Function {
    pub fn new_code(
        name: impl Into<String>,
        code: Arc<Code>,
        arity: usize,
        flags: FunctionFlags,
        param_names: Vec<String>,
        globals: Arc<Namespace>,
    ) -> Arc<Function> {
        let generator = if flags.contains(FunctionFlags::GENERATOR) {
            Some(GeneratorState {
                lock: GeneratorLock::new(),
                frame: parking_lot::Mutex::new(None),
                exhausted: AtomicBool::new(false),
            })
        } else {
            None
        };
        let name = name.into();
        Arc::new(Function {
            qname: name.clone(),
            name,
            doc: String::new(),
            body: Body::Code(code),
            currying: Vec::new(),
            enclosed: Vec::new(),
            base: None,
            globals,
            arity,
            flags,
            param_names,
            generator,
        })
    }

    pub fn new_closure(
        name: impl Into<String>,
        code: Arc<Code>,
        arity: usize,
        flags: FunctionFlags,
        param_names: Vec<String>,
        enclosed: Vec<Value>,
        globals: Arc<Namespace>,
    ) -> Arc<Function> {
        let generator = if flags.contains(FunctionFlags::GENERATOR) {
            Some(GeneratorState {
                lock: GeneratorLock::new(),
                frame: parking_lot::Mutex::new(None),
                exhausted: AtomicBool::new(false),
            })
        } else {
            None
        };
        let name = name.into();
        Arc::new(Function {
            qname: name.clone(),
            name,
            doc: String::new(),
            body: Body::Code(code),
            currying: Vec::new(),
            enclosed,
            base: None,
            globals,
            arity,
            flags: flags | FunctionFlags::CLOSURE,
            param_names,
            generator,
        })
    }

    pub fn new_native(
        name: impl Into<String>,
        arity: usize,
        param_names: Vec<String>,
        implementation: NativeImpl,
        globals: Arc<Namespace>,
    ) -> Arc<Function> {
        let name = name.into();
        Arc::new(Function {
            qname: name.clone(),
            name,
            doc: String::new(),
            body: Body::Native(implementation),
            currying: Vec::new(),
            enclosed: Vec::new(),
            base: None,
            globals,
            arity,
            flags: FunctionFlags::NATIVE,
            param_names,
            generator: None,
        })
    }

    pub fn is_native(&self) -> bool {
        self.flags.contains(FunctionFlags::NATIVE)
    }

    pub fn is_variadic(&self) -> bool {
        self.flags.contains(FunctionFlags::VARIADIC)
    }

    pub fn is_kwargs(&self) -> bool {
        self.flags.contains(FunctionFlags::KWARGS)
    }

    pub fn is_generator(&self) -> bool {
        self.flags.contains(FunctionFlags::GENERATOR)
    }

    /// Returns a new function object identical to `self` but with
    /// `extra_args` appended to its currying tuple (partial application).
    pub fn with_curry(self: &Arc<Self>, extra_args: Vec<Value>) -> Arc<Function> {
        let mut currying = self.currying.clone();
        currying.extend(extra_args);
        Arc::new(Function {
            name: self.name.clone(),
            qname: self.qname.clone(),
            doc: self.doc.clone(),
            body: match &self.body {
                Body::Code(c) => Body::Code(c.clone()),
                Body::Native(n) => Body::Native(n.clone()),
            },
            currying,
            enclosed: self.enclosed.clone(),
            base: self.base.clone(),
            globals: self.globals.clone(),
            arity: self.arity,
            flags: self.flags,
            param_names: self.param_names.clone(),
            generator: None,
        })
    }
}

/// Outcome of binding arguments to a function before execution begins.
pub enum BindOutcome {
    /// Arity satisfied (or excess absorbed by variadic/kwargs): a fully
    /// filled locals vector ready for a new frame.
    Ready(Vec<Value>),
    /// Too few positional args: a new partial-application function.
    Partial(Arc<Function>),
}

/// Implements spec.md §4.5's calling convention steps 1-4 (currying prepend,
/// arity partitioning, keyword handling, method instance binding). Native
/// dispatch (step 5) and frame allocation (step 6) are the caller's job.
pub fn bind_call(
    func: &Arc<Function>,
    mut args: Vec<Value>,
    kwargs: Option<Arc<Dict>>,
    instance: Option<Value>,
) -> Result<BindOutcome, Value> {
    let mut full_args = func.currying.clone();
    full_args.append(&mut args);
    let n = full_args.len();

    if n < func.arity {
        if n == 0 && func.arity > 0 {
            // A zero-arg call against a function with required parameters and
            // no prior currying is a direct arity error, not a partial.
            if func.currying.is_empty() {
                return Err(error_value(
                    ErrorKind::TypeError,
                    format!(
                        "{} takes {} arguments but 0 were given",
                        func.name, func.arity
                    ),
                ));
            }
        }
        return Ok(BindOutcome::Partial(func.with_curry(full_args[func.currying.len()..].to_vec())));
    }

    let mut locals = Vec::new();
    if let Some(inst) = instance {
        locals.push(inst);
    }

    if n > func.arity {
        if func.is_variadic() {
            let (fixed, rest) = full_args.split_at(func.arity);
            locals.extend_from_slice(fixed);
            locals.push(Value::List(Arc::new(List::from_vec(rest.to_vec()))));
        } else {
            return Err(error_value(
                ErrorKind::TypeError,
                format!(
                    "{} takes {} arguments but {} were given",
                    func.name, func.arity, n
                ),
            ));
        }
    } else {
        locals.extend_from_slice(&full_args);
    }

    if let Some(kw) = kwargs {
        if func.is_kwargs() {
            locals.push(Value::Dict(kw));
        } else {
            for (k, _) in kw.items() {
                if let Value::Str(s) = &k {
                    if !func.param_names.iter().any(|p| p == s.as_str()) {
                        return Err(error_value(
                            ErrorKind::TypeError,
                            format!("unexpected keyword argument '{}'", s.as_str()),
                        ));
                    }
                }
            }
        }
    }

    Ok(BindOutcome::Ready(locals))
}

/// Dispatches a native function: runs the (already-bound) argument vector
/// through `implementation`, converting an `Err` result into a panic
/// payload per spec.md §4.5 step 5.
pub fn call_native(implementation: &NativeImpl, args: &[Value]) -> Result<Value, Value> {
    implementation(args)
}
