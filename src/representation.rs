//! Representation (§3, §4.B) — tagged-variant redesign per §9 ("Reimplement
//! as tagged variants: a `Representation` sum type with `Canonical`,
//! `Adopted`, `Shared`").

use std::any::TypeId;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{InterpreterFault, PyCoreError, PyCoreResult};
use crate::object::PyObjectRef;
use crate::special_method::{CachedSlot, SpecialHandle, NUM_SPECIAL_METHODS};
use crate::type_obj::TypeHandle;

#[derive(Clone)]
pub enum RepresentationKind {
    /// The Type object *is* its own Representation.
    Canonical,
    /// Links a foreign host class to an `AdoptiveType`; `index` is its
    /// non-zero slot within that type's `representations()`.
    Adopted { index: usize },
    /// Backs potentially many Python types sharing one host class;
    /// `python_type` is read off the object itself via `WithClass`.
    Shared,
}

/// A binding between one host class and one Python type, plus that
/// binding's own per-special-method cache (§4.B invariant (ii): once
/// published, immutable *as a binding*; the cache array inside it is
/// the only thing ever mutated afterwards, and only through the
/// post-change hook).
pub struct Representation {
    pub kind: RepresentationKind,
    /// The host class this representation was registered for, kept for
    /// diagnostics and for `WithClassAssignment`'s default check.
    host_class: TypeId,
    host_class_name: &'static str,
    /// Back-reference to the owning Type. `Weak` would be more correct
    /// for the canonical case (the Type *is* this Representation's
    /// owner) but Types are never freed in this core (§9: "a runtime
    /// context created once"), so a strong handle set post-construction
    /// is simplest; see `Representation::bind`.
    owner: RwLock<Option<TypeHandle>>,
    /// Cache entries paired with the runtime epoch they were computed
    /// against (§9 Open Question #1: invalidate-on-next-lookup via a
    /// coarse global epoch rather than walking subclasses eagerly).
    /// Epoch `0` never matches a live epoch (the runtime starts its
    /// counter at `1`), so a fresh Representation always recomputes on
    /// first use.
    cache: RwLock<[(CachedSlot, u64); NUM_SPECIAL_METHODS]>,
    new_cache: RwLock<(Option<SpecialHandle>, u64)>,
}

impl Representation {
    pub fn new<T: 'static>(host_class_name: &'static str, kind: RepresentationKind) -> Self {
        Self {
            kind,
            host_class: TypeId::of::<T>(),
            host_class_name,
            owner: RwLock::new(None),
            cache: RwLock::new(std::array::from_fn(|_| (CachedSlot::Empty, 0))),
            new_cache: RwLock::new((None, 0)),
        }
    }

    pub fn new_dynamic(
        host_class: TypeId,
        host_class_name: &'static str,
        kind: RepresentationKind,
    ) -> Self {
        Self {
            kind,
            host_class,
            host_class_name,
            owner: RwLock::new(None),
            cache: RwLock::new(std::array::from_fn(|_| (CachedSlot::Empty, 0))),
            new_cache: RwLock::new((None, 0)),
        }
    }

    /// Called once by the factory when the owning Type is constructed
    /// (two-phase construction needs the Type to exist before its
    /// Representations can point back to it).
    pub fn bind(&self, owner: TypeHandle) {
        *self.owner.write() = Some(owner);
    }

    pub fn owner(&self) -> TypeHandle {
        self.owner
            .read()
            .clone()
            .expect("Representation used before its owning Type finished construction")
    }

    pub fn host_class(&self) -> TypeId {
        self.host_class
    }

    pub fn host_class_name(&self) -> &'static str {
        self.host_class_name
    }

    pub fn index(&self) -> usize {
        match self.kind {
            RepresentationKind::Adopted { index } => index,
            _ => 0,
        }
    }

    /// `python_type(x)` (§4.B). Canonical and Adopted never need to
    /// inspect `x`; Shared always does.
    pub fn python_type(&self, obj: &PyObjectRef, probe: Option<TypeHandle>) -> PyCoreResult<TypeHandle> {
        match self.kind {
            RepresentationKind::Canonical | RepresentationKind::Adopted { .. } => Ok(self.owner()),
            RepresentationKind::Shared => probe.ok_or_else(|| {
                PyCoreError::fatal(InterpreterFault::UnprobableShared)
            }),
        }
    }

    pub fn is_data_descriptor(&self, has_set: bool, has_delete: bool) -> bool {
        has_set || has_delete
    }

    /// Returns the cached slot if it was computed at `current_epoch`,
    /// else `None` (stale — caller must recompute and re-store).
    pub fn get_cached(&self, slot: usize, current_epoch: u64) -> Option<CachedSlot> {
        let (value, epoch) = &self.cache.read()[slot];
        (*epoch == current_epoch).then(|| value.clone())
    }

    pub fn set_cached(&self, slot: usize, value: CachedSlot, current_epoch: u64) {
        self.cache.write()[slot] = (value, current_epoch);
    }

    pub fn get_new_cache(&self, current_epoch: u64) -> Option<Option<SpecialHandle>> {
        let (value, epoch) = &*self.new_cache.read();
        (*epoch == current_epoch).then(|| value.clone())
    }

    pub fn set_new_cache(&self, value: Option<SpecialHandle>, current_epoch: u64) {
        *self.new_cache.write() = (value, current_epoch);
    }
}

impl std::fmt::Debug for Representation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Representation")
            .field("host_class_name", &self.host_class_name)
            .field("index", &self.index())
            .finish()
    }
}

pub type RepresentationRef = Arc<Representation>;
