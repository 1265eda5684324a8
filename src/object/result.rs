//! Discriminated `Ok(value) | Err(value)` wrapper for Argon-level fallible
//! results that don't go through the panic/recover machinery.
//!
//! Grounded on `examples/original_source/src/vm/datatype/result.cpp`.

use super::Value;

#[derive(Debug, Clone)]
pub enum ResultObj {
    Ok(Value),
    Err(Value),
}

impl ResultObj {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResultObj::Ok(_))
    }

    pub fn is_err(&self) -> bool {
        matches!(self, ResultObj::Err(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            ResultObj::Ok(v) | ResultObj::Err(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminates_ok_err() {
        let ok = ResultObj::Ok(Value::Int(1));
        let err = ResultObj::Err(Value::Nil);
        assert!(ok.is_ok());
        assert!(err.is_err());
    }
}
