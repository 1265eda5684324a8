//! Importer collaborator contract: resolves a module name to a
//! [`ModuleSpec`] (native descriptor or source to compile), then
//! instantiates the resulting namespace.
//!
//! Grounded on spec.md §6's "Boundary with importer" — `resolve(name) ->
//! ModuleSpec`, where a spec names a loader plus an origin — and, for the
//! registry shape (name-keyed map, install/scan-style bulk registration),
//! on `examples/jeremyhahn-neurlang/src/extensions/registry.rs`'s
//! `ExtensionRegistry`. File-system package discovery is out of scope here;
//! this module is the in-memory contract and registry only.

use std::sync::Arc;

use crate::code::Code;
use crate::error::{error_value, ErrorKind};
use crate::object::namespace::{AttrFlags, Namespace};
use crate::object::Value;

/// One binding a native module contributes, with the same visibility bits
/// as any other namespace entry (spec.md §6: "a list of `{name,
/// value|function, const|public|weak}` entries").
pub struct NativeEntry {
    pub name: String,
    pub value: Value,
    pub flags: AttrFlags,
}

/// A native module: a fixed entry list plus optional lifecycle hooks run at
/// first resolution (`init`) and at runtime shutdown (`fini`).
pub struct NativeModule {
    pub name: String,
    pub entries: Vec<NativeEntry>,
    pub init: Option<Arc<dyn Fn() -> Result<(), Value> + Send + Sync>>,
    pub fini: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl NativeModule {
    pub fn new(name: impl Into<String>) -> Self {
        NativeModule {
            name: name.into(),
            entries: Vec::new(),
            init: None,
            fini: None,
        }
    }

    pub fn with_entry(mut self, name: impl Into<String>, value: Value, flags: AttrFlags) -> Self {
        self.entries.push(NativeEntry {
            name: name.into(),
            value,
            flags,
        });
        self
    }

    pub fn with_init(mut self, init: Arc<dyn Fn() -> Result<(), Value> + Send + Sync>) -> Self {
        self.init = Some(init);
        self
    }

    pub fn with_fini(mut self, fini: Arc<dyn Fn() + Send + Sync>) -> Self {
        self.fini = Some(fini);
        self
    }

    /// Builds the module's namespace, running `init` first if present.
    pub fn instantiate(&self) -> Result<Namespace, Value> {
        if let Some(init) = &self.init {
            init()?;
        }
        let ns = Namespace::new();
        for entry in &self.entries {
            ns.declare(entry.name.clone(), entry.value.clone(), entry.flags);
        }
        Ok(ns)
    }
}

/// Where a module's content comes from once `resolve` has located it.
pub enum Origin {
    Native(Arc<NativeModule>),
    Source { unit_name: String, code: Arc<Code> },
}

pub struct ModuleSpec {
    pub name: String,
    pub origin: Origin,
}

impl std::fmt::Debug for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Native(m) => f.debug_tuple("Native").field(&m.name).finish(),
            Origin::Source { unit_name, .. } => {
                f.debug_struct("Source").field("unit_name", unit_name).finish_non_exhaustive()
            }
        }
    }
}

impl std::fmt::Debug for ModuleSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleSpec")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish()
    }
}

/// In-memory registry standing in for the real package/path search the
/// spec marks out of scope; `resolve` only ever consults what's been
/// explicitly registered.
pub struct Importer {
    natives: std::collections::HashMap<String, Arc<NativeModule>>,
    sources: std::collections::HashMap<String, Arc<Code>>,
}

impl Importer {
    pub fn new() -> Self {
        Importer {
            natives: std::collections::HashMap::new(),
            sources: std::collections::HashMap::new(),
        }
    }

    pub fn register_native(&mut self, module: NativeModule) {
        self.natives.insert(module.name.clone(), Arc::new(module));
    }

    pub fn register_source(&mut self, name: impl Into<String>, code: Arc<Code>) {
        self.sources.insert(name.into(), code);
    }

    /// `resolve(name: str) -> ModuleSpec` per spec.md §6. Native modules are
    /// preferred over same-named source registrations, matching the
    /// original importer's search order (builtins shadow user code).
    pub fn resolve(&self, name: &str) -> Result<ModuleSpec, Value> {
        if let Some(native) = self.natives.get(name) {
            return Ok(ModuleSpec {
                name: name.to_string(),
                origin: Origin::Native(native.clone()),
            });
        }
        if let Some(code) = self.sources.get(name) {
            return Ok(ModuleSpec {
                name: name.to_string(),
                origin: Origin::Source {
                    unit_name: name.to_string(),
                    code: code.clone(),
                },
            });
        }
        Err(error_value(
            ErrorKind::ModuleImportError,
            format!("no module named '{}'", name),
        ))
    }

    /// Runs every registered native module's `fini` hook, in registration
    /// order, ignoring hooks that were never set. Called from the crate's
    /// top-level `Shutdown`.
    pub fn finalize_all(&self) {
        for module in self.natives.values() {
            if let Some(fini) = &module.fini {
                fini();
            }
        }
    }
}

impl Default for Importer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn resolves_registered_native_module() {
        let mut importer = Importer::new();
        let module = NativeModule::new("math").with_entry(
            "PI",
            Value::Int(3),
            AttrFlags::PUBLIC | AttrFlags::CONST,
        );
        importer.register_native(module);

        let spec = importer.resolve("math").unwrap();
        match spec.origin {
            Origin::Native(m) => {
                let ns = m.instantiate().unwrap();
                assert!(matches!(ns.get("PI"), Some(Value::Int(3))));
            }
            Origin::Source { .. } => panic!("expected native origin"),
        }
    }

    #[test]
    fn unregistered_name_is_import_error() {
        let importer = Importer::new();
        let err = importer.resolve("nope").unwrap_err();
        assert!(matches!(&err, Value::Error(e) if e.is_kind(ErrorKind::ModuleImportError)));
    }

    #[test]
    fn native_shadows_same_named_source() {
        let mut importer = Importer::new();
        importer.register_native(NativeModule::new("dup"));
        let empty = crate::object::tuple::Tuple::new(vec![]);
        importer.register_source(
            "dup",
            Code::new(vec![], 0, empty.clone(), empty.clone(), empty.clone(), empty),
        );
        let spec = importer.resolve("dup").unwrap();
        assert!(matches!(spec.origin, Origin::Native(_)));
    }

    #[test]
    fn init_hook_runs_before_instantiate() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        let module = NativeModule::new("hooked").with_init(Arc::new(move || {
            ran2.store(true, Ordering::SeqCst);
            Ok(())
        }));
        module.instantiate().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
