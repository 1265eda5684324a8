//! Type descriptors: display/qualified name, doc text, flags, an MRO tuple
//! computed by C3 linearization, and slot tables for the handful of
//! protocols every builtin and user type can opt into.
//!
//! Grounded on `examples/original_source/src/vm/datatype/arobject.cpp`
//! (`type_get_attr`, `ComputeMRO`, `Compare`) and `type.cpp`'s `TypeNew`.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::{error_value, ErrorKind};

use super::namespace::Namespace;
use super::Value;

/// Comparison mode passed to a type's `compare` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareMode {
    pub fn reversed(self) -> CompareMode {
        match self {
            CompareMode::Eq => CompareMode::Eq,
            CompareMode::Ne => CompareMode::Ne,
            CompareMode::Lt => CompareMode::Gt,
            CompareMode::Le => CompareMode::Ge,
            CompareMode::Gt => CompareMode::Lt,
            CompareMode::Ge => CompareMode::Le,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareMode::Eq => "==",
            CompareMode::Ne => "!=",
            CompareMode::Lt => "<",
            CompareMode::Le => "<=",
            CompareMode::Gt => ">",
            CompareMode::Ge => ">=",
        }
    }
}

type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, Value> + Send + Sync>;

/// Lifecycle protocol: hash, truthiness, compare, string conversion,
/// iteration. Each slot is optional; absence drives the fallback behavior
/// described in spec.md §4.1.
#[derive(Default, Clone)]
pub struct LifecycleSlots {
    pub hash: Option<NativeFn>,
    pub compare: Option<Arc<dyn Fn(&Value, &Value, CompareMode) -> Option<bool> + Send + Sync>>,
    pub repr: Option<Arc<dyn Fn(&Value) -> String + Send + Sync>>,
    pub str: Option<Arc<dyn Fn(&Value) -> String + Send + Sync>>,
    pub iter: Option<Arc<dyn Fn(&Value, bool) -> Result<Value, Value> + Send + Sync>>,
    pub iter_next: Option<Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>>,
}

/// Arithmetic/bitwise protocol. Every slot is optional; binary dispatch
/// falls back left-then-right per spec.md §4.1/§4.3.
#[derive(Default, Clone)]
pub struct ArithmeticSlots {
    pub add: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub sub: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub mul: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub div: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub idiv: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub rem: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub pos: Option<Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>>,
    pub neg: Option<Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>>,
    pub band: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub bor: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub bxor: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub shl: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub shr: Option<Arc<dyn Fn(&Value, &Value) -> Option<Value> + Send + Sync>>,
    pub invert: Option<Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>>,
    pub inc: Option<Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>>,
    pub dec: Option<Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>>,
}

/// Produces a readable/writable byte view of an object (spec.md §3.2's
/// buffer slot).
#[derive(Clone)]
pub struct BufferSlot {
    pub view: Arc<dyn Fn(&Value) -> Result<Vec<u8>, Value> + Send + Sync>,
}

/// Subscript protocol: `obj[key]`, `obj[key] = v`, slicing, `in`.
#[derive(Clone)]
pub struct SubscriptSlots {
    pub length: Option<Arc<dyn Fn(&Value) -> usize + Send + Sync>>,
    pub get_item: Option<Arc<dyn Fn(&Value, &Value) -> Result<Value, Value> + Send + Sync>>,
    pub set_item: Option<Arc<dyn Fn(&Value, &Value, Value) -> Result<(), Value> + Send + Sync>>,
    pub contains: Option<Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>>,
}

impl Default for SubscriptSlots {
    fn default() -> Self {
        SubscriptSlots {
            length: None,
            get_item: None,
            set_item: None,
            contains: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TypeFlags {
    pub is_trait: bool,
    pub is_struct: bool,
    pub weakable: bool,
    pub initialized: bool,
}

/// A type descriptor. Builtin types are constructed once at process start
/// and held behind `once_cell::Lazy` statics (see `crate::object::types::builtin`);
/// user-defined types are built at runtime by [`TypeInfo::new_trait`]/
/// [`TypeInfo::new_struct`] via C3 linearization over explicit bases.
pub struct TypeInfo {
    name: String,
    qname: String,
    pub doc: String,
    pub flags: TypeFlags,
    /// Method/attribute table; for builtins this holds native wrapper
    /// closures, for user types it holds whatever the `namespace` argument
    /// of `TypeNew` declared.
    pub tp_map: Namespace,
    /// C3-linearized ancestor list, excluding `self`.
    mro: RwLock<Vec<Arc<TypeInfo>>>,
    pub lifecycle: LifecycleSlots,
    pub arithmetic: ArithmeticSlots,
    pub buffer: Option<BufferSlot>,
    pub subscript: SubscriptSlots,
}

impl TypeInfo {
    pub fn builtin(name: &str, lifecycle: LifecycleSlots) -> Arc<TypeInfo> {
        Arc::new(TypeInfo {
            name: name.to_string(),
            qname: name.to_string(),
            doc: String::new(),
            flags: TypeFlags {
                initialized: true,
                ..Default::default()
            },
            tp_map: Namespace::new(),
            mro: RwLock::new(Vec::new()),
            lifecycle,
            arithmetic: ArithmeticSlots::default(),
            buffer: None,
            subscript: SubscriptSlots::default(),
        })
    }

    /// `TypeNew` for a user-defined trait or struct: computes the MRO by C3
    /// linearization over `bases`, installs `namespace`, flags initialized.
    pub fn new_user(
        name: &str,
        qname: &str,
        doc: &str,
        is_trait: bool,
        namespace: Namespace,
        bases: &[Arc<TypeInfo>],
    ) -> Result<Arc<TypeInfo>, Value> {
        for base in bases {
            if !base.flags.is_trait {
                return Err(error_value(
                    ErrorKind::TypeError,
                    format!("cannot inherit from non-trait type '{}'", base.name()),
                ));
            }
        }
        let mro = compute_mro(bases)?;
        Ok(Arc::new(TypeInfo {
            name: name.to_string(),
            qname: qname.to_string(),
            doc: doc.to_string(),
            flags: TypeFlags {
                is_trait,
                is_struct: !is_trait,
                weakable: false,
                initialized: true,
            },
            tp_map: namespace,
            mro: RwLock::new(mro),
            lifecycle: LifecycleSlots::default(),
            arithmetic: ArithmeticSlots::default(),
            buffer: None,
            subscript: SubscriptSlots::default(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qname(&self) -> &str {
        &self.qname
    }

    pub fn mro(&self) -> Vec<Arc<TypeInfo>> {
        self.mro.read().clone()
    }

    /// True if `self` appears in `other`'s MRO or `other` IS `self`,
    /// i.e. an `is-a` check used by the private-attribute access rule.
    pub fn is_in_mro_of(self: &Arc<Self>, other: &Arc<TypeInfo>) -> bool {
        Arc::ptr_eq(self, other) || other.mro().iter().any(|t| Arc::ptr_eq(t, self))
    }

    /// Dot-access: per-instance namespace first (when `instance` is given),
    /// then this type's own `tp_map`, then walk the MRO. `accessor` is the
    /// MRO (or `None`) of the calling frame's bound instance, used to decide
    /// whether a private attribute on an ancestor is visible.
    pub fn get_attr_dot(
        self: &Arc<Self>,
        instance_ns: Option<&Namespace>,
        attr: &str,
        accessor: Option<&Arc<TypeInfo>>,
    ) -> Result<Value, Value> {
        if let Some(ns) = instance_ns {
            if let Some(v) = ns.get(attr) {
                return Ok(v);
            }
        }
        if let Some(v) = self.tp_map.get(attr) {
            return check_visibility(&self.tp_map, attr, self, accessor, v);
        }
        for ancestor in self.mro().iter() {
            if let Some(v) = ancestor.tp_map.get(attr) {
                return check_visibility(&ancestor.tp_map, attr, ancestor, accessor, v);
            }
        }
        Err(error_value(
            ErrorKind::AttributeError,
            format!("'{}' has no attribute '{}'", self.name, attr),
        ))
    }

    /// Scope-access (`T::x`): only `const` attributes on the type itself
    /// (not inherited) are visible.
    pub fn get_attr_scope(self: &Arc<Self>, attr: &str) -> Result<Value, Value> {
        match self.tp_map.get(attr) {
            Some(v) if self.tp_map.is_const(attr) => Ok(v),
            Some(_) => Err(error_value(
                ErrorKind::AccessViolationError,
                format!("'{}::{}' is not a const attribute", self.name, attr),
            )),
            None => Err(error_value(
                ErrorKind::AttributeError,
                format!("'{}' has no attribute '{}'", self.name, attr),
            )),
        }
    }

    pub fn set_attr_dot(
        self: &Arc<Self>,
        instance_ns: Option<&Namespace>,
        attr: &str,
        value: Value,
    ) -> Result<(), Value> {
        if let Some(ns) = instance_ns {
            if ns.contains(attr) {
                return ns.set(attr, value).map_err(|_| {
                    error_value(
                        ErrorKind::UnassignableError,
                        format!("'{}' is not assignable", attr),
                    )
                });
            }
        }
        Err(error_value(
            ErrorKind::AttributeError,
            format!("'{}' has no attribute '{}'", self.name, attr),
        ))
    }
}

fn check_visibility(
    owner_ns: &Namespace,
    attr: &str,
    owner: &Arc<TypeInfo>,
    accessor: Option<&Arc<TypeInfo>>,
    value: Value,
) -> Result<Value, Value> {
    if owner_ns.is_public(attr) {
        return Ok(value);
    }
    match accessor {
        Some(acc) if owner.is_in_mro_of(acc) => Ok(value),
        _ => Err(error_value(
            ErrorKind::AccessViolationError,
            format!("'{}' is not accessible from this scope", attr),
        )),
    }
}

/// C3 linearization per spec.md §4.1: `L[i] = [b_i] ++ MRO(b_i)` for each
/// base, plus `L[n+1] = bases` itself; repeatedly pop a valid head.
fn compute_mro(bases: &[Arc<TypeInfo>]) -> Result<Vec<Arc<TypeInfo>>, Value> {
    if bases.is_empty() {
        return Ok(Vec::new());
    }

    let mut lists: Vec<Vec<Arc<TypeInfo>>> = bases
        .iter()
        .map(|b| {
            let mut l = vec![b.clone()];
            l.extend(b.mro());
            l
        })
        .collect();
    lists.push(bases.to_vec());

    let mut out: Vec<Arc<TypeInfo>> = Vec::new();

    loop {
        lists.retain(|l| !l.is_empty());
        if lists.is_empty() {
            break;
        }

        let mut chosen: Option<Arc<TypeInfo>> = None;
        for candidate_list in &lists {
            let head = &candidate_list[0];
            let in_any_tail = lists.iter().any(|l| {
                l.iter()
                    .skip(1)
                    .any(|t| Arc::ptr_eq(t, head))
            });
            if !in_any_tail {
                chosen = Some(head.clone());
                break;
            }
        }

        let head = match chosen {
            Some(h) => h,
            None => {
                return Err(error_value(
                    ErrorKind::TypeError,
                    "inconsistent method resolution order",
                ))
            }
        };

        out.push(head.clone());
        for l in lists.iter_mut() {
            if !l.is_empty() && Arc::ptr_eq(&l[0], &head) {
                l.remove(0);
            }
        }
    }

    Ok(out)
}

impl std::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("qname", &self.qname)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::namespace::AttrFlags;

    fn trait_type(name: &str, bases: &[Arc<TypeInfo>]) -> Arc<TypeInfo> {
        TypeInfo::new_user(name, name, "", true, Namespace::new(), bases).unwrap()
    }

    #[test]
    fn c3_linearization_diamond() {
        let a = trait_type("A", &[]);
        let b = trait_type("B", &[a.clone()]);
        let c = trait_type("C", &[a.clone()]);
        let d = trait_type("D", &[b.clone(), c.clone()]);

        let mro = d.mro();
        let names: Vec<&str> = mro.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[test]
    fn inconsistent_mro_fails() {
        let a = trait_type("A", &[]);
        let b = trait_type("B", &[]);
        // Conflicting orders: X wants [A, B], Y wants [B, A].
        let x = TypeInfo::new_user("X", "X", "", true, Namespace::new(), &[a.clone(), b.clone()])
            .unwrap();
        let y = TypeInfo::new_user("Y", "Y", "", true, Namespace::new(), &[b.clone(), a.clone()])
            .unwrap();
        let z = TypeInfo::new_user("Z", "Z", "", true, Namespace::new(), &[x, y]);
        assert!(z.is_err());
    }

    #[test]
    fn private_attr_requires_mro_membership() {
        let base_ns = Namespace::new();
        base_ns.declare("secret", Value::Int(1), AttrFlags::empty());
        let base = TypeInfo::new_user("Base", "Base", "", true, base_ns, &[]).unwrap();
        let derived = TypeInfo::new_user(
            "Derived",
            "Derived",
            "",
            false,
            Namespace::new(),
            &[base.clone()],
        )
        .unwrap();

        // Accessed with no bound instance: private attribute must be rejected.
        assert!(derived.get_attr_dot(None, "secret", None).is_err());
        // Accessed with an instance whose type has Base in its MRO: allowed.
        assert!(derived
            .get_attr_dot(None, "secret", Some(&derived))
            .is_ok());
    }

    #[test]
    fn scope_access_rejects_non_const() {
        let ns = Namespace::new();
        ns.declare("mutable_field", Value::Int(1), AttrFlags::PUBLIC);
        ns.declare(
            "VERSION",
            Value::Int(2),
            AttrFlags::PUBLIC | AttrFlags::CONST,
        );
        let t = TypeInfo::new_user("T", "T", "", false, ns, &[]).unwrap();
        assert!(t.get_attr_scope("mutable_field").is_err());
        assert!(matches!(t.get_attr_scope("VERSION"), Ok(Value::Int(2))));
    }
}
