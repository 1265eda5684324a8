//! An instance of a user-defined trait/struct type created through
//! `TypeNew`: a field namespace plus a back-pointer to its descriptor.
//!
//! Grounded on `examples/original_source/src/vm/datatype/arobject.h`'s
//! generic object layout (`TypeInfo*` header field) applied to
//! non-builtin types defined at the Argon level rather than natively.

use std::sync::Arc;

use super::namespace::Namespace;
use super::types::TypeInfo;

pub struct Instance {
    pub type_info: Arc<TypeInfo>,
    pub fields: Namespace,
}

impl Instance {
    pub fn new(type_info: Arc<TypeInfo>, fields: Namespace) -> Self {
        Instance { type_info, fields }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_info.name())
            .finish()
    }
}
