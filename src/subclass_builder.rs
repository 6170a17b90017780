//! The generic host representation behind user-defined (`Shared`)
//! subclasses (§4.G). The source system synthesises a dedicated host
//! class per Python class at runtime (a JVM-style bytecode emitter);
//! Rust has no runtime code generation, so every user-defined class
//! instance is backed by one shared `Instance` struct carrying a slot
//! array, the way a V8/SpiderMonkey "shape" object backs arbitrarily
//! shaped objects without per-shape native classes (§9 redesign
//! decision, recorded in DESIGN.md). Grounded on the teacher's
//! `PyInstance`/`object::core::Py<T>` attribute storage, adapted to a
//! name-indexed slot table since this core has no fixed-layout
//! `__slots__` story of its own to mirror.

use ahash::RandomState;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::capabilities::{WithClass, WithClassAssignment, WithDict};
use crate::error::PyCoreResult;
use crate::object::PyObjectRef;
use crate::type_obj::{AttrDict, TypeHandle};

/// Maps attribute name to a slot index, shared (via the factory's
/// memoization table, §4.G "memoized by `(base, slot count, has_dict)`")
/// across every instance of classes with the same inherited slot shape.
#[derive(Debug)]
pub struct SlotLayout {
    names: Vec<String>,
    index: IndexMap<String, usize, RandomState>,
}

impl SlotLayout {
    pub fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self { names, index }
    }

    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The shared host representation for Python-defined classes (§4.C.2
/// `ReplaceableType`): `__class__` is mutable (subject to
/// `WithClassAssignment::check_class_assignment`), and attributes not
/// covered by the slot layout overflow into `extra`.
#[derive(Debug)]
pub struct Instance {
    class: RwLock<TypeHandle>,
    layout: std::sync::Arc<SlotLayout>,
    slots: RwLock<Vec<Option<PyObjectRef>>>,
    extra: RwLock<AttrDict>,
}

impl Instance {
    pub fn new(class: TypeHandle, layout: std::sync::Arc<SlotLayout>) -> Self {
        let n = layout.len();
        Self {
            class: RwLock::new(class),
            layout,
            slots: RwLock::new(vec![None; n]),
            extra: RwLock::new(AttrDict::default()),
        }
    }

    pub fn dict_snapshot(&self) -> AttrDict {
        let mut merged = AttrDict::default();
        for (name, slot) in &self.layout.index {
            if let Some(v) = self.slots.read()[*slot].clone() {
                merged.insert(name.clone(), v);
            }
        }
        for (k, v) in self.extra.read().iter() {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }

    pub fn dict_put(&self, name: String, value: PyObjectRef) {
        if let Some(slot) = self.layout.slot_of(&name) {
            self.slots.write()[slot] = Some(value);
        } else {
            self.extra.write().insert(name, value);
        }
    }

    pub fn dict_remove(&self, name: &str) -> Option<PyObjectRef> {
        if let Some(slot) = self.layout.slot_of(name) {
            self.slots.write()[slot].take()
        } else {
            self.extra.write().shift_remove(name)
        }
    }
}

impl WithClass for Instance {
    fn get_class(&self) -> TypeHandle {
        self.class.read().clone()
    }
}

impl WithDict for Instance {
    fn get_dict(&self) -> Option<AttrDict> {
        Some(self.dict_snapshot())
    }
}

impl WithClassAssignment for Instance {
    fn set_class(&self, new_type: TypeHandle) -> PyCoreResult<()> {
        self.check_class_assignment(&new_type)?;
        *self.class.write() = new_type;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fresh_runtime_with_object_and_type;

    #[test]
    fn unmapped_attribute_overflows_into_extra_dict() {
        let (_rt, _object, typ, _instance) = fresh_runtime_with_object_and_type();
        let layout = std::sync::Arc::new(SlotLayout::new(vec!["x".to_owned()]));
        let inst = Instance::new(typ, layout);
        inst.dict_put("x".to_owned(), crate::builtins::new_int(1));
        inst.dict_put("y".to_owned(), crate::builtins::new_int(2));
        let snap = inst.dict_snapshot();
        assert_eq!(snap.len(), 2);
    }
}
