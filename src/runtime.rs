//! The runtime context (§9 "Global mutable state": "a runtime context
//! created once, injected everywhere ... allow test suites to spin up
//! fresh runtimes"). Ties the [`crate::registry::Registry`], the
//! [`crate::factory::TypeFactory`], and the dispatch algorithms of §4.A/
//! §4.C together. Grounded on the teacher's `vm::Context`/
//! `VirtualMachine`, trimmed to the parts this core needs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::capabilities::{ArgValues, FastCall, WithClass};
use crate::error::{PyCoreError, PyCoreResult};
use crate::object::{downcast_ref, PyObjectRef};
use crate::registry::Registry;
use crate::representation::RepresentationRef;
use crate::special_method::{
    generic_invoke, CachedSlot, DispatchFailure, DispatchResult, SpecialMethod,
};
use crate::type_obj::{KernelFlags, PublicFlags, TypeHandle};

pub struct Runtime {
    pub registry: Registry,
    factory: crate::factory::TypeFactory,
    /// Bumped by any dictionary mutation on any type; cache entries
    /// record the epoch they were computed at and are recomputed lazily
    /// the next time they're consulted (§9 Open Question #1). Starts at
    /// `1` so a freshly constructed Representation (epoch `0`) always
    /// misses on first use.
    epoch: AtomicU64,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            factory: crate::factory::TypeFactory::new(),
            epoch: AtomicU64::new(1),
        }
    }

    pub fn factory_from_spec(&self, spec: crate::factory::TypeSpec) -> PyCoreResult<TypeHandle> {
        self.factory.from_spec(self, spec)
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn bump_epoch(&self) {
        let next = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("epoch bumped to {}", next);
    }

    /// `python_type(x)` (§4.B), resolved through whichever Representation
    /// the registry has bound to `x`'s host class.
    pub fn python_type(&self, obj: &PyObjectRef) -> DispatchResult {
        let repr = self
            .registry
            .representation_for(obj)
            .ok_or(DispatchFailure::Empty)?;
        let probe = downcast_ref_with_class(obj);
        let typ = repr.python_type(obj, probe)?;
        Ok(crate::builtins::type_as_object(typ))
    }

    pub fn python_type_handle(&self, obj: &PyObjectRef) -> PyCoreResult<TypeHandle> {
        let repr = self
            .registry
            .representation_for(obj)
            .ok_or_else(|| PyCoreError::type_error("object has no registered representation"))?;
        let probe = downcast_ref_with_class(obj);
        repr.python_type(obj, probe)
    }

    pub fn has_feature(&self, obj: &PyObjectRef, flag: PublicFlags) -> bool {
        self.python_type_handle(obj)
            .map(|t| t.has_feature(flag))
            .unwrap_or(false)
    }

    /// Invoke any callable object: native functions go straight through
    /// [`FastCall`]; anything else is dispatched through the `Call`
    /// special method on its type (this is how `type(obj)(...)` ends up
    /// running the metaclass protocol of §4.C.4).
    pub fn call_object(&self, callable: &PyObjectRef, args: &ArgValues) -> PyCoreResult<PyObjectRef> {
        if let Some(native) = downcast_ref::<crate::capabilities::NativeFunction>(callable) {
            return native.call(args);
        }
        if let Ok(typ) = crate::object::downcast::<crate::type_obj::PyType>(callable.clone()) {
            return crate::protocol::type_call(self, &typ, args);
        }
        match self.special_method_handle(callable, SpecialMethod::Call) {
            CachedSlot::Empty => Err(PyCoreError::type_error("object is not callable")),
            CachedSlot::Generic => match generic_invoke(self, SpecialMethod::Call, callable, args) {
                Ok(v) => Ok(v),
                Err(DispatchFailure::Empty) => Err(PyCoreError::type_error("object is not callable")),
                Err(DispatchFailure::Raised(e)) => Err(e),
            },
            CachedSlot::Direct(handle) => handle(self, callable, args),
        }
    }

    /// §4.A.2's `__get__` resolution step, used both by the generic
    /// dispatch algorithm and by the attribute protocol (§4.C.3).
    pub(crate) fn try_descr_get(
        &self,
        descriptor: &PyObjectRef,
        instance: Option<PyObjectRef>,
        owner: Option<TypeHandle>,
    ) -> DispatchResult {
        let mut args = ArgValues::default();
        args.args.push(match instance {
            Some(i) => i,
            None => crate::builtins::none_singleton(),
        });
        args.args.push(match owner {
            Some(o) => crate::builtins::type_as_object(o),
            None => crate::builtins::none_singleton(),
        });
        match self.special_method_handle(descriptor, SpecialMethod::Get) {
            CachedSlot::Empty => Err(DispatchFailure::Empty),
            CachedSlot::Generic => generic_invoke(self, SpecialMethod::Get, descriptor, &args),
            CachedSlot::Direct(handle) => Ok(handle(self, descriptor, &args)?),
        }
    }

    pub fn descriptor_get(
        &self,
        descriptor: &PyObjectRef,
        instance: Option<PyObjectRef>,
        owner: Option<TypeHandle>,
    ) -> DispatchResult {
        self.try_descr_get(descriptor, instance, owner)
    }

    /// Resolve (and lazily recompute if stale) the cache discipline for
    /// `special` on `obj`'s Representation (§4.A.3).
    pub(crate) fn special_method_handle(&self, obj: &PyObjectRef, special: SpecialMethod) -> CachedSlot {
        let Some(repr) = self.registry.representation_for(obj) else {
            return CachedSlot::Empty;
        };
        self.resolve_slot(&repr, special)
    }

    pub(crate) fn resolve_slot(&self, repr: &RepresentationRef, special: SpecialMethod) -> CachedSlot {
        let epoch = self.current_epoch();
        if let Some(cached) = repr.get_cached(special.index(), epoch) {
            return cached;
        }
        let typ = repr.owner();
        log::trace!(
            "recomputing {:?} cache entry for '{}' at epoch {}",
            special,
            typ.name(),
            epoch
        );
        let computed = self.compute_cache_entry(&typ, special);
        repr.set_cached(special.index(), computed.clone(), epoch);
        computed
    }

    /// §4.A.3's three disciplines, computed fresh from a
    /// `lookup_extended` walk.
    fn compute_cache_entry(&self, typ: &TypeHandle, special: SpecialMethod) -> CachedSlot {
        let dunder = special.dunder();
        let Some(result) = typ.lookup_extended(dunder, false) else {
            return CachedSlot::Empty;
        };
        use crate::lookup::LookupStatus;
        if result.status == LookupStatus::Once {
            return CachedSlot::Generic;
        }
        let value_is_method_descr = self.has_feature(&result.value, PublicFlags::METHOD_DESCR);
        if !value_is_method_descr {
            return CachedSlot::Generic;
        }
        let value = result.value;
        let handle: crate::special_method::SpecialHandle = Arc::new(move |rt, zelf, args| {
            let bound = args.with_leading(zelf.clone());
            rt.call_object(&value, &bound)
        });
        CachedSlot::Direct(handle)
    }

    /// `type.__setattr__` (§4.C.3): if `typ` is immutable, raise; else
    /// look `name` up on `typ`'s own metatype first — a data descriptor
    /// found there intercepts the write entirely, dispatched through
    /// [`crate::protocol::dispatch_special`] exactly as an instance's
    /// `setattro` would — and only once no such descriptor exists does
    /// this put `name` in `typ`'s own dictionary and run the post-change
    /// hook: kernel flags recompute immediately (inside
    /// `PyType::dict_put_raw`); the special-method cache is invalidated
    /// by bumping the global epoch rather than walking every
    /// Representation eagerly (§9 Open Question #1). If the changed name
    /// is `__new__`, its dedicated cache slot is cleared too.
    pub fn type_dict_put(&self, typ: &TypeHandle, name: &str, value: PyObjectRef) -> PyCoreResult<()> {
        if typ.has_feature(PublicFlags::IMMUTABLE) {
            return Err(PyCoreError::attribute_error(format!(
                "cannot set attributes of immutable type '{}'",
                typ.name()
            )));
        }
        if let Some(meta) = typ.metaclass() {
            if let Some(found) = meta.lookup_extended(name, false) {
                let flags = crate::protocol::descriptor_kernel_flags(self, &found.value);
                if flags.contains(KernelFlags::HAS_SET) {
                    let typ_obj = crate::builtins::type_as_object(typ.clone());
                    let args = ArgValues::positional(vec![typ_obj, value]);
                    crate::protocol::dispatch_special(self, &found.value, SpecialMethod::Set, &args)?;
                    return Ok(());
                }
            }
        }
        typ.dict_put_raw(name.to_owned(), value);
        self.bump_epoch();
        if name == "__new__" {
            for repr in typ.representations() {
                repr.set_new_cache(None, self.current_epoch());
            }
        }
        Ok(())
    }

    /// `type.__delattr__` (§4.C.3): dual of `type_dict_put` — a metatype
    /// data descriptor with `__delete__` intercepts the delete before
    /// `typ`'s own dictionary is ever touched.
    pub fn type_dict_remove(&self, typ: &TypeHandle, name: &str) -> PyCoreResult<PyObjectRef> {
        if typ.has_feature(PublicFlags::IMMUTABLE) {
            return Err(PyCoreError::attribute_error(format!(
                "cannot delete attributes of immutable type '{}'",
                typ.name()
            )));
        }
        if let Some(meta) = typ.metaclass() {
            if let Some(found) = meta.lookup_extended(name, false) {
                let flags = crate::protocol::descriptor_kernel_flags(self, &found.value);
                if flags.contains(KernelFlags::HAS_DELETE) {
                    let typ_obj = crate::builtins::type_as_object(typ.clone());
                    let args = ArgValues::positional(vec![typ_obj]);
                    crate::protocol::dispatch_special(self, &found.value, SpecialMethod::Delete, &args)?;
                    return Ok(crate::builtins::none_singleton());
                }
            }
        }
        let removed = typ.dict_remove_raw(name).ok_or_else(|| {
            PyCoreError::attribute_error(format!(
                "type object '{}' has no attribute '{}'",
                typ.name(),
                name
            ))
        })?;
        self.bump_epoch();
        if name == "__new__" {
            for repr in typ.representations() {
                repr.set_new_cache(None, self.current_epoch());
            }
        }
        Ok(removed)
    }

    /// Resolved `__new__` for `t`, cached on its (first) Representation,
    /// recomputed whenever `__new__` changes along the MRO (§4.C.4 step
    /// 3, §9 Open Question #3: a single resolved `__new__` per type,
    /// even for multi-representation `AdoptiveType`s).
    pub fn resolve_new(&self, typ: &TypeHandle) -> PyCoreResult<crate::special_method::SpecialHandle> {
        let repr = typ
            .representations()
            .first()
            .ok_or_else(|| PyCoreError::type_error("type has no representation"))?;
        let epoch = self.current_epoch();
        if let Some(Some(handle)) = repr.get_new_cache(epoch) {
            return Ok(handle);
        }
        let value = typ
            .lookup("__new__")
            .ok_or_else(|| PyCoreError::type_error(format!("cannot create '{}' instances", typ.name())))?;
        let handle: crate::special_method::SpecialHandle = Arc::new(move |rt, zelf, args| {
            let bound = args.with_leading(zelf.clone());
            rt.call_object(&value, &bound)
        });
        repr.set_new_cache(Some(handle.clone()), epoch);
        Ok(handle)
    }

    pub fn has_init(&self, typ: &TypeHandle) -> bool {
        typ.kernel_flags().contains(KernelFlags::HAS_INIT)
    }
}

fn downcast_ref_with_class(obj: &PyObjectRef) -> Option<TypeHandle> {
    // Any payload implementing `WithClass` exposes its own type; since
    // `WithClass` isn't object-safe together with `PyObjectPayload` in a
    // single downcast, concrete Shared-representation payloads (e.g.
    // `Instance`, see `subclass_builder.rs`) are probed directly.
    if let Some(instance) = downcast_ref::<crate::subclass_builder::Instance>(obj) {
        return Some(instance.get_class());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_starts_above_zero_slot_default() {
        let rt = Runtime::new();
        assert_eq!(rt.current_epoch(), 1);
        rt.bump_epoch();
        assert_eq!(rt.current_epoch(), 2);
    }
}
