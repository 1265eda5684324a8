//! The Argon object model: a tagged `Value` enum over reference-counted
//! heap objects, plus the container and descriptor submodules it's built
//! from.
//!
//! Grounded on `examples/original_source/src/vm/datatype/arobject.h`: the
//! original VM gives every heap object a shared header (refcount kind,
//! `TypeInfo*`) and treats small immediates (bool, small int, nil) as
//! static singletons to skip allocation entirely. Rust's ownership model
//! already gives us that for free: primitives are `Copy` variants of
//! `Value` itself, heap objects are `Arc`-wrapped, and "static singleton"
//! becomes a `once_cell::Lazy` holding a permanently-alive `Arc`.

pub mod atom;
pub mod bounds;
pub mod bytes;
pub mod dict;
pub mod future;
pub mod instance;
pub mod list;
pub mod namespace;
pub mod option;
pub mod result;
pub mod set;
pub mod string;
pub mod tuple;
pub mod types;

use std::hash::Hasher;
use std::sync::Arc;

use crate::code::Code;
use crate::error::ErrorObj;
use crate::function::Function;

use atom::Atom;
use bounds::Bounds;
use bytes::ArBytes;
use dict::Dict;
use future::Future;
use instance::Instance;
use list::List;
use namespace::Namespace;
use option::OptionObj;
use result::ResultObj;
use set::ArSet;
use string::ArString;
use tuple::Tuple;
use types::TypeInfo;

/// A runtime value. Primitives are inline and `Copy`; everything else is a
/// cheap `Arc` clone of a heap object, mirroring the original VM's
/// strong/weak refcounted handles without hand-rolling a refcount.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(Arc<ArString>),
    Bytes(Arc<ArBytes>),
    Tuple(Arc<Tuple>),
    List(Arc<List>),
    Dict(Arc<Dict>),
    Set(Arc<ArSet>),
    Bounds(Arc<Bounds>),
    Namespace(Arc<Namespace>),
    Atom(Atom),
    Option(Arc<OptionObj>),
    Result(Arc<ResultObj>),
    Future(Arc<Future>),
    Function(Arc<Function>),
    Code(Arc<Code>),
    Type(Arc<TypeInfo>),
    Error(Arc<ErrorObj>),
    /// An instance of a user-defined type created through `TypeNew`, holding
    /// its own namespace of fields plus a back-pointer to its `TypeInfo`.
    Instance(Arc<Instance>),
}

impl Value {
    pub fn type_name(&self) -> &str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::UInt(_) => "UInt",
            Value::Str(_) => "Str",
            Value::Bytes(_) => "Bytes",
            Value::Tuple(_) => "Tuple",
            Value::List(_) => "List",
            Value::Dict(_) => "Dict",
            Value::Set(_) => "Set",
            Value::Bounds(_) => "Bounds",
            Value::Namespace(_) => "Namespace",
            Value::Atom(_) => "Atom",
            Value::Option(_) => "Option",
            Value::Result(_) => "Result",
            Value::Future(_) => "Future",
            Value::Function(_) => "Function",
            Value::Code(_) => "Code",
            Value::Type(_) => "Type",
            Value::Error(_) => "Error",
            Value::Instance(inst) => inst.type_info.name(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::UInt(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Set(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Value equality (not identity). Used by `Dict`/`Set` lookups and the
    /// `EQ`/`NE` opcodes' fallback when no type-level `compare` slot applies.
    pub fn eq_value(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (Int(a), UInt(b)) | (UInt(b), Int(a)) => *a >= 0 && (*a as u64) == *b,
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) => a.with_read(|sa| b.with_read(|sb| sa == sb)),
            (Tuple(a), Tuple(b)) => a == b,
            (Atom(a), Atom(b)) => a == b,
            (Type(a), Type(b)) => Arc::ptr_eq(a, b),
            (Function(a), Function(b)) => Arc::ptr_eq(a, b),
            (Instance(a), Instance(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Feeds a stable hash of this value into `state`. Only values allowed
    /// as dict/set keys (spec.md §5.2's "hashable" set) produce meaningful
    /// hashes; unhashable containers hash by identity, matching `eq_value`'s
    /// fallback of "never equal to anything but itself".
    pub fn hash_value<H: Hasher>(&self, state: &mut H) {
        use Value::*;
        match self {
            Nil => state.write_u8(0),
            Bool(b) => {
                state.write_u8(1);
                state.write_u8(*b as u8);
            }
            Int(n) => {
                state.write_u8(2);
                state.write_i64(*n);
            }
            UInt(n) => {
                state.write_u8(2);
                state.write_i64(*n as i64);
            }
            Str(s) => {
                state.write_u8(3);
                state.write_u64(s.hash());
            }
            Bytes(b) => {
                state.write_u8(4);
                b.with_read(|s| state.write(s));
            }
            Tuple(t) => {
                state.write_u8(5);
                state.write_u64(t.hash());
            }
            Atom(a) => {
                state.write_u8(6);
                state.write(a.as_str().as_bytes());
            }
            other => {
                state.write_u8(255);
                state.write_usize(other as *const _ as *const () as usize);
            }
        }
    }

    pub fn is_hashable(&self) -> bool {
        matches!(
            self,
            Value::Nil
                | Value::Bool(_)
                | Value::Int(_)
                | Value::UInt(_)
                | Value::Str(_)
                | Value::Bytes(_)
                | Value::Tuple(_)
                | Value::Atom(_)
        )
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_value(other)
    }
}

/// Process-wide singletons for the three values every type system needs at
/// zero allocation cost: `nil`, `true`, `false`. Kept as plain functions
/// rather than `Lazy<Value>` statics since `Value` is cheap to construct
/// inline (`Bool`/`Nil` carry no heap allocation at all).
pub fn nil() -> Value {
    Value::Nil
}

pub fn true_() -> Value {
    Value::Bool(true)
}

pub fn false_() -> Value {
    Value::Bool(false)
}

pub fn bool_value(b: bool) -> Value {
    Value::Bool(b)
}
