//! Discriminated `Some(value) | None` wrapper, distinct from Rust's own
//! `Option` so Argon code can pattern-match on it as a first-class value.
//!
//! Grounded on `examples/original_source/src/vm/datatype/option.cpp`.

use super::Value;

#[derive(Debug, Clone)]
pub enum OptionObj {
    Some(Value),
    None,
}

impl OptionObj {
    pub fn is_some(&self) -> bool {
        matches!(self, OptionObj::Some(_))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, OptionObj::None)
    }

    pub fn unwrap_or(self, default: Value) -> Value {
        match self {
            OptionObj::Some(v) => v,
            OptionObj::None => default,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            OptionObj::Some(v) => Some(v),
            OptionObj::None => None,
        }
    }
}
