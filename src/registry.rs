//! The Registry (§4.E): the durable map from host class to
//! Representation, published atomically by the factory once a Type has
//! finished construction. Grounded on the teacher's `TypeZoo`/
//! `PyClassDef::static_cell` bootstrap-table pattern in `types/zoo.rs`,
//! generalised from a fixed set of static cells to a growable map since
//! this core must also register classes built at runtime (§4.G).

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::object::{host_class_of, PyObjectRef};
use crate::representation::RepresentationRef;
use crate::type_obj::TypeHandle;

pub struct Registry {
    /// Immutable once a binding is inserted (§4.B invariant (ii)); the
    /// `RwLock` only guards the map's own structure, not any individual
    /// entry.
    published: RwLock<HashMap<TypeId, RepresentationRef>>,
    /// Set once during bootstrap; `type(x)`/`type(name, bases, ns)`
    /// dispatches on identity with this handle (§4.C.4).
    type_type: OnceLock<TypeHandle>,
    object_type: OnceLock<TypeHandle>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            published: RwLock::new(HashMap::new()),
            type_type: OnceLock::new(),
            object_type: OnceLock::new(),
        }
    }

    /// §4.E "atomic batch publication": the factory calls this once per
    /// Representation after the owning Type's MRO/best_base/flags are
    /// fully settled, never before.
    pub fn publish(&self, host_class: TypeId, repr: RepresentationRef) {
        log::trace!("registry: publishing host class '{}'", repr.host_class_name());
        self.published.write().insert(host_class, repr);
    }

    pub fn lookup(&self, host_class: TypeId) -> Option<RepresentationRef> {
        let found = self.published.read().get(&host_class).cloned();
        if found.is_none() {
            log::trace!("registry: lookup miss for host class {:?}", host_class);
        }
        found
    }

    pub fn representation_for(&self, obj: &PyObjectRef) -> Option<RepresentationRef> {
        self.lookup(host_class_of(obj))
    }

    pub fn find(&self, host_class: TypeId) -> Option<TypeHandle> {
        self.lookup(host_class).map(|r| r.owner())
    }

    pub(crate) fn set_type_type(&self, handle: TypeHandle) {
        let _ = self.type_type.set(handle);
    }

    pub(crate) fn set_object_type(&self, handle: TypeHandle) {
        let _ = self.object_type.set(handle);
    }

    pub fn type_type(&self) -> Option<TypeHandle> {
        self.type_type.get().cloned()
    }

    pub fn object_type(&self) -> Option<TypeHandle> {
        self.object_type.get().cloned()
    }

    pub fn is_type_metaclass(&self, typ: &TypeHandle) -> bool {
        self.type_type.get().is_some_and(|t| t.is_same(typ))
    }
}
