//! Argon-level error objects and host-side VM errors.
//!
//! Two error universes exist side by side, per spec.md §7:
//!
//! - [`Error`] is a plain Argon value (atom id + reason + optional detail
//!   dict) raised as a panic payload and observed by `recover`/`trap`. It is
//!   never a Rust `std::error::Error`.
//! - [`VmError`] is a host-side failure (bad config, allocation failure at a
//!   boundary that cannot itself raise an Argon panic) using `thiserror`,
//!   matching the style of the teacher's `config::ConfigError`.

use std::fmt;
use std::sync::Arc;

use crate::object::atom::Atom;
use crate::object::dict::Dict;
use crate::object::Value;

/// Well-known error atoms, interned once at process start.
///
/// Non-exhaustive by design (spec.md §7): native modules may define their
/// own atoms for kinds this list doesn't anticipate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    OutOfMemory,
    RuntimeError,
    TypeError,
    ValueError,
    AttributeError,
    AccessViolationError,
    UnassignableError,
    UndeclaredError,
    OverflowError,
    DivByZeroError,
    KeyError,
    UnhashableError,
    NotImplementedError,
    AssertionError,
    ModuleImportError,
    ExhaustedGeneratorError,
    OSError,
    FileError,
    PermissionDeniedError,
    InterruptError,
    TryAgainError,
    IsDirectoryError,
    BrokenPipeError,
    OperationError,
}

impl ErrorKind {
    pub fn atom_id(self) -> &'static str {
        match self {
            ErrorKind::OutOfMemory => "OutOfMemory",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::AttributeError => "AttributeError",
            ErrorKind::AccessViolationError => "AccessViolationError",
            ErrorKind::UnassignableError => "UnassignableError",
            ErrorKind::UndeclaredError => "UndeclaredError",
            ErrorKind::OverflowError => "OverflowError",
            ErrorKind::DivByZeroError => "DivByZeroError",
            ErrorKind::KeyError => "KeyError",
            ErrorKind::UnhashableError => "UnhashableError",
            ErrorKind::NotImplementedError => "NotImplementedError",
            ErrorKind::AssertionError => "AssertionError",
            ErrorKind::ModuleImportError => "ModuleImportError",
            ErrorKind::ExhaustedGeneratorError => "ExhaustedGeneratorError",
            ErrorKind::OSError => "OSError",
            ErrorKind::FileError => "FileError",
            ErrorKind::PermissionDeniedError => "PermissionDeniedError",
            ErrorKind::InterruptError => "InterruptError",
            ErrorKind::TryAgainError => "TryAgainError",
            ErrorKind::IsDirectoryError => "IsDirectoryError",
            ErrorKind::BrokenPipeError => "BrokenPipeError",
            ErrorKind::OperationError => "OperationError",
        }
    }
}

/// An Argon `Error` value: an interned kind atom, a human-readable reason,
/// and an optional detail dict (e.g. the two type names in a `NotImplementedError`).
#[derive(Debug, Clone)]
pub struct ErrorObj {
    pub id: Atom,
    pub reason: String,
    pub detail: Option<Arc<Dict>>,
}

impl ErrorObj {
    pub fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        ErrorObj {
            id: Atom::intern(kind.atom_id()),
            reason: reason.into(),
            detail: None,
        }
    }

    pub fn with_detail(kind: ErrorKind, reason: impl Into<String>, detail: Dict) -> Self {
        ErrorObj {
            id: Atom::intern(kind.atom_id()),
            reason: reason.into(),
            detail: Some(Arc::new(detail)),
        }
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.id.as_str() == kind.atom_id()
    }
}

impl fmt::Display for ErrorObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id.as_str(), self.reason)
    }
}

/// Convenience: build a panic payload `Value` directly from a kind + message.
pub fn error_value(kind: ErrorKind, reason: impl Into<String>) -> Value {
    Value::Error(Arc::new(ErrorObj::new(kind, reason)))
}

/// Host-side failures: things that happen before there is an Argon context
/// to panic into (config parsing, process bring-up). Mirrors the teacher's
/// `#[derive(thiserror::Error)]` convention in `config.rs`.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("runtime already initialized")]
    AlreadyInitialized,

    #[error("runtime not initialized")]
    NotInitialized,

    #[error("shutdown timed out waiting for {0} worker thread(s) to exit")]
    ShutdownTimeout(usize),

    #[error("compile error in unit {unit}: {message}")]
    Compile { unit: String, message: String },

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

pub type VmResult<T> = Result<T, VmError>;
