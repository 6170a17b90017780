//! Type–Representation–SpecialMethod dispatch core for a hosted Python
//! runtime: the object model, type hierarchy, MRO calculator, special
//! method catalogue/cache, and the attribute/call protocols that sit on
//! top of them. Everything above this core (bytecode execution,
//! parsing, the standard library) is out of scope — see the module docs
//! below for what each piece actually owns.

pub mod builtins;
pub mod capabilities;
pub mod error;
pub mod exposer;
pub mod factory;
pub mod lookup;
pub mod mro;
pub mod object;
pub mod protocol;
pub mod registry;
pub mod representation;
pub mod runtime;
pub mod special_method;
pub mod subclass_builder;
pub mod type_obj;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{PyCoreError, PyCoreResult};
pub use object::PyObjectRef;
pub use runtime::Runtime;
pub use type_obj::TypeHandle;

/// `isinstance(obj, t)` (§4.C.1 `is_subtype_of`, applied to
/// `python_type(obj)`), exposed as a free function the way the teacher
/// exposes `obj.is_instance(t, vm)` off `AsObject` rather than requiring
/// every caller to resolve `python_type` by hand.
pub fn is_instance(rt: &Runtime, obj: &PyObjectRef, t: &TypeHandle) -> PyCoreResult<bool> {
    let obj_type = rt.python_type_handle(obj)?;
    Ok(t.check(&obj_type))
}

/// `issubclass(a, b)`.
pub fn is_subclass(a: &TypeHandle, b: &TypeHandle) -> bool {
    a.is_same(b) || a.is_subtype_of(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_instance_true_for_own_type() {
        let (rt, _object, typ, instance) = testutil::fresh_runtime_with_object_and_type();
        assert!(is_instance(&rt, &instance, &typ).unwrap());
    }

    #[test]
    fn is_subclass_reflexive_and_via_object() {
        let (_rt, object_type, typ, _instance) = testutil::fresh_runtime_with_object_and_type();
        assert!(is_subclass(&typ, &typ));
        assert!(is_subclass(&typ, &object_type));
        assert!(!is_subclass(&object_type, &typ));
    }
}
