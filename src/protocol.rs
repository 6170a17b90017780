//! Attribute get/set/delete (§4.C.3) and the `type(...)` call protocol
//! (§4.C.4). Grounded on the teacher's `builtins/type.rs::GetAttr for
//! PyType` / `SetAttr for PyType` / `Callable for PyType` (generic
//! descriptor-precedence algorithm, specialised here to work for any
//! object via the `Runtime`, not just for type objects).

use crate::capabilities::ArgValues;
use crate::error::{PyCoreError, PyCoreResult};
use crate::object::{downcast, downcast_ref, PyObjectRef};
use crate::runtime::Runtime;
use crate::special_method::{generic_invoke, CachedSlot, DispatchFailure, SpecialMethod};
use crate::type_obj::{AttrDict, KernelFlags, PyType, TypeHandle};

fn instance_dict(obj: &PyObjectRef) -> Option<AttrDict> {
    if let Some(instance) = downcast_ref::<crate::subclass_builder::Instance>(obj) {
        return Some(instance.dict_snapshot());
    }
    None
}

fn instance_dict_put(obj: &PyObjectRef, name: String, value: PyObjectRef) -> bool {
    if let Some(instance) = downcast_ref::<crate::subclass_builder::Instance>(obj) {
        instance.dict_put(name, value);
        return true;
    }
    false
}

fn instance_dict_remove(obj: &PyObjectRef, name: &str) -> Option<PyObjectRef> {
    downcast_ref::<crate::subclass_builder::Instance>(obj).and_then(|i| i.dict_remove(name))
}

/// `object.__getattribute__` (§4.C.3): data descriptor on the metatype
/// wins; then the object's own attribute storage — the instance
/// dictionary for a plain instance, or (§4.C.3 "on a type") `self`'s own
/// MRO, bound "type-side" (`__get__(nil, self)`), when `obj` is itself a
/// type; then a non-data descriptor or plain class attribute; then
/// `__getattr__` as a last resort; else `AttributeError`.
pub fn getattro(rt: &Runtime, obj: &PyObjectRef, name: &str) -> PyCoreResult<PyObjectRef> {
    let typ = rt.python_type_handle(obj)?;
    let class_attr = typ.lookup_extended(name, false);

    if let Some(ref found) = class_attr {
        let descr_flags = descriptor_kernel_flags(rt, &found.value);
        let is_data_descr = descr_flags.contains(KernelFlags::HAS_SET) || descr_flags.contains(KernelFlags::HAS_DELETE);
        if is_data_descr {
            return bind_or_return(rt, &found.value, Some(obj.clone()), typ.clone());
        }
    }

    if let Ok(self_type) = downcast::<PyType>(obj.clone()) {
        if let Some(value) = self_type.lookup(name) {
            return bind_or_return(rt, &value, None, self_type);
        }
    } else if let Some(dict) = instance_dict(obj) {
        if let Some(v) = dict.get(name) {
            return Ok(v.clone());
        }
    }

    if let Some(found) = class_attr {
        return bind_or_return(rt, &found.value, Some(obj.clone()), typ.clone());
    }

    if let Some(getattr) = typ.lookup("__getattr__") {
        let args = ArgValues::positional(vec![obj.clone(), crate::builtins::new_str(name)]);
        return rt.call_object(&getattr, &args);
    }

    Err(PyCoreError::attribute_error(format!(
        "'{}' object has no attribute '{}'",
        typ.name(),
        name
    )))
}

pub(crate) fn descriptor_kernel_flags(rt: &Runtime, descriptor: &PyObjectRef) -> KernelFlags {
    rt.python_type_handle(descriptor)
        .map(|t| t.kernel_flags())
        .unwrap_or_default()
}

/// Invokes `special` (`__set__`/`__delete__`) on `descriptor` itself,
/// the way [`Runtime::try_descr_get`] invokes `__get__` — the descriptor
/// is never itself callable, so this must dispatch the special method
/// rather than `call_object` the descriptor directly. Shared with
/// [`Runtime::type_dict_put`]/[`Runtime::type_dict_remove`], which need
/// the exact same invocation for a metatype descriptor intercepting a
/// type's own dictionary mutation.
pub(crate) fn dispatch_special(
    rt: &Runtime,
    descriptor: &PyObjectRef,
    special: SpecialMethod,
    args: &ArgValues,
) -> PyCoreResult<PyObjectRef> {
    match rt.special_method_handle(descriptor, special) {
        CachedSlot::Empty => Err(PyCoreError::type_error(format!(
            "'{}' object has no {}",
            rt.python_type_handle(descriptor).map(|t| t.name()).unwrap_or_default(),
            special.dunder()
        ))),
        CachedSlot::Generic => generic_invoke(rt, special, descriptor, args).map_err(|f| match f {
            DispatchFailure::Raised(e) => e,
            DispatchFailure::Empty => PyCoreError::type_error(format!("descriptor has no {}", special.dunder())),
        }),
        CachedSlot::Direct(handle) => handle(rt, descriptor, args),
    }
}

/// `instance = None` is the "type-side" binding form (`__get__(nil,
/// self)`), used when `self` is itself the type a descriptor was found
/// on rather than an instance of it.
fn bind_or_return(
    rt: &Runtime,
    value: &PyObjectRef,
    instance: Option<PyObjectRef>,
    owner: TypeHandle,
) -> PyCoreResult<PyObjectRef> {
    match rt.descriptor_get(value, instance, Some(owner)) {
        Ok(bound) => Ok(bound),
        Err(crate::special_method::DispatchFailure::Empty) => Ok(value.clone()),
        Err(crate::special_method::DispatchFailure::Raised(e)) => Err(e),
    }
}

/// `object.__setattr__` (§4.C.3): a data descriptor found on the
/// metatype intercepts the write; otherwise the value lands in the
/// object's own attribute storage — a type's own dictionary (via
/// [`Runtime::type_dict_put`], which re-derives and honors this same
/// metatype-descriptor check) when `obj` is itself a type, or the
/// instance dictionary otherwise.
pub fn setattro(rt: &Runtime, obj: &PyObjectRef, name: &str, value: PyObjectRef) -> PyCoreResult<()> {
    let typ = rt.python_type_handle(obj)?;
    if let Some(found) = typ.lookup_extended(name, false) {
        let flags = descriptor_kernel_flags(rt, &found.value);
        if flags.contains(KernelFlags::HAS_SET) {
            let args = ArgValues::positional(vec![obj.clone(), value]);
            dispatch_special(rt, &found.value, SpecialMethod::Set, &args)?;
            return Ok(());
        }
    }
    if let Ok(target_type) = downcast::<PyType>(obj.clone()) {
        return rt.type_dict_put(&target_type, name, value);
    }
    if instance_dict_put(obj, name.to_owned(), value) {
        Ok(())
    } else {
        Err(PyCoreError::attribute_error(format!(
            "'{}' object has no attribute '__dict__'",
            typ.name()
        )))
    }
}

pub fn delattro(rt: &Runtime, obj: &PyObjectRef, name: &str) -> PyCoreResult<()> {
    let typ = rt.python_type_handle(obj)?;
    if let Some(found) = typ.lookup_extended(name, false) {
        let flags = descriptor_kernel_flags(rt, &found.value);
        if flags.contains(KernelFlags::HAS_DELETE) {
            let args = ArgValues::positional(vec![obj.clone()]);
            dispatch_special(rt, &found.value, SpecialMethod::Delete, &args)?;
            return Ok(());
        }
    }
    if let Ok(target_type) = downcast::<PyType>(obj.clone()) {
        return rt.type_dict_remove(&target_type, name).map(|_| ());
    }
    match instance_dict_remove(obj, name) {
        Some(_) => Ok(()),
        None => Err(PyCoreError::attribute_error(format!(
            "'{}' object has no attribute '{}'",
            typ.name(),
            name
        ))),
    }
}

/// `type.__call__` (§4.C.4): `type(x)` (one positional argument, no
/// metaclass subclass target) returns `python_type(x)`; `type(name,
/// bases, ns)` builds a new subclass through the factory;
/// otherwise, run `__new__` then, if the result actually is an instance
/// of `typ` (or a subtype), `__init__`.
pub fn type_call(rt: &Runtime, typ: &TypeHandle, args: &ArgValues) -> PyCoreResult<PyObjectRef> {
    if rt.registry.is_type_metaclass(typ) {
        match args.args.len() {
            1 if args.kwargs.is_empty() => {
                return rt.python_type(&args.args[0]).map_err(|f| match f {
                    crate::special_method::DispatchFailure::Raised(e) => e,
                    crate::special_method::DispatchFailure::Empty => {
                        PyCoreError::type_error("object has no type")
                    }
                });
            }
            3 => {
                return crate::factory::build_user_subclass(rt, args);
            }
            _ => {
                return Err(PyCoreError::type_error("type() takes 1 or 3 arguments"));
            }
        }
    }

    let new_handle = rt.resolve_new(typ)?;
    let typ_obj = crate::builtins::type_as_object(typ.clone());
    let obj = new_handle(rt, &typ_obj, args)?;

    let obj_type = rt.python_type_handle(&obj)?;
    if !typ.check(&obj_type) {
        return Ok(obj);
    }

    if let Some(init) = obj_type.lookup("__init__") {
        let init_args = args.with_leading(obj.clone());
        rt.call_object(&init, &init_args)?;
    }
    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fresh_runtime_with_object_and_type;

    #[test]
    fn getattro_finds_class_attribute() {
        let (rt, _object, _typ, instance) = fresh_runtime_with_object_and_type();
        let err = getattro(&rt, &instance, "does_not_exist");
        assert!(err.is_err());
    }
}
