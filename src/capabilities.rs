//! External interfaces the core requires of host objects and callables
//! (§6). These are the seams the teacher crate puts traits at
//! (`AsObject`, `Callable`, `GetAttr`/`SetAttr` in `types/slot.rs`):
//! every capability here is optional except `FastCall`, which every
//! native implementation must provide (the core wraps anything else in
//! a slow adapter, §6).

use crate::error::PyCoreResult;
use crate::object::PyObjectRef;
use crate::type_obj::TypeHandle;

/// `(self)` is a Python object carrying its own type. Required for
/// instances of `ReplaceableType` and for objects behind a `Shared`
/// representation (§3, §4.B).
pub trait WithClass: Send + Sync {
    fn get_class(&self) -> TypeHandle;
}

/// Optional: `(self)` carries an instance dictionary.
pub trait WithDict: Send + Sync {
    fn get_dict(&self) -> Option<crate::type_obj::AttrDict>;
}

/// Optional: `(self)` may have its `__class__` reassigned (§4.C.2,
/// scenario S7). The default `check_class_assignment` enforces that the
/// replacement's representation host class equals `self`'s host class —
/// i.e. that both types are in the same clique.
pub trait WithClassAssignment: WithClass {
    fn set_class(&self, new_type: TypeHandle) -> PyCoreResult<()>;

    fn check_class_assignment(&self, new_type: &TypeHandle) -> PyCoreResult<()> {
        let current = self.get_class();
        let current_repr_class = current.representations()[0].host_class();
        let new_repr_class = new_type.representations().first().map(|r| r.host_class());
        if new_repr_class == Some(current_repr_class) {
            Ok(())
        } else {
            Err(crate::error::PyCoreError::type_error(format!(
                "__class__ assignment: '{}' object layout differs from '{}'",
                new_type.name(),
                current.name()
            )))
        }
    }
}

/// Positional/keyword argument bundle, matching the teacher's `FuncArgs`
/// and the spec's `(args[], kwnames[])` shape used uniformly by `CALL`,
/// and (with `self` prepended) by the generic dispatch algorithm
/// (§4.A.2).
#[derive(Debug, Clone, Default)]
pub struct ArgValues {
    pub args: Vec<PyObjectRef>,
    pub kwargs: Vec<(String, PyObjectRef)>,
}

impl ArgValues {
    pub fn positional(args: Vec<PyObjectRef>) -> Self {
        Self {
            args,
            kwargs: Vec::new(),
        }
    }

    pub fn with_leading(&self, leading: PyObjectRef) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(leading);
        args.extend(self.args.iter().cloned());
        Self {
            args,
            kwargs: self.kwargs.clone(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.kwargs.iter().map(|(k, _)| k.as_str()).collect()
    }
}

/// Capability expected of every native callable (§6). Optimised
/// arity-specific overloads are left to callers; the core only ever
/// needs the general form.
pub trait FastCall: Send + Sync {
    fn call(&self, args: &ArgValues) -> PyCoreResult<PyObjectRef>;

    /// Convert an argument-shape mismatch into the conventional
    /// TypeError, naming the method and arity (§6, §7).
    fn type_error(&self, method_name: &str, expected_arity: &str) -> crate::error::PyCoreError {
        crate::error::PyCoreError::type_error(format!(
            "{method_name}() expected {expected_arity}"
        ))
    }
}

/// Wraps a plain Rust closure so it satisfies [`FastCall`] — the "slow
/// adapter" mentioned in §6 for callables that don't implement it
/// natively.
pub struct NativeFunction {
    pub name: &'static str,
    func: Box<dyn Fn(&ArgValues) -> PyCoreResult<PyObjectRef> + Send + Sync>,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish()
    }
}

impl NativeFunction {
    pub fn new(
        name: &'static str,
        func: impl Fn(&ArgValues) -> PyCoreResult<PyObjectRef> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            func: Box::new(func),
        }
    }
}

impl FastCall for NativeFunction {
    fn call(&self, args: &ArgValues) -> PyCoreResult<PyObjectRef> {
        (self.func)(args)
    }
}
