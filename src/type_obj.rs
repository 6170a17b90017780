//! The Type hierarchy (§3, §4.C) — `SimpleType`/`AdoptiveType`/
//! `ReplaceableType` reimplemented as one `PyType` record carrying a
//! `TypeKind` tag (§9: "Reimplement as tagged variants ... Methods that
//! are virtual in the source become pattern matches"), grounded on the
//! teacher's `builtins/type.rs::PyType`.

use std::sync::Arc;

use ahash::RandomState;
use bitflags::bitflags;
use crossbeam_utils::atomic::AtomicCell;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::lookup::{LookupResult, LookupStatus};
use crate::object::PyObjectRef;
use crate::representation::RepresentationRef;

bitflags! {
    /// Public feature flags (§6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PublicFlags: u32 {
        const BASETYPE         = 1 << 0;
        const IMMUTABLE        = 1 << 1;
        const REPLACEABLE      = 1 << 2;
        const INSTANTIABLE     = 1 << 3;
        const SEQUENCE         = 1 << 4;
        const MAPPING          = 1 << 5;
        const MATCH_SELF       = 1 << 6;
        const METHOD_DESCR     = 1 << 7;
        const READY            = 1 << 8;
        const READYING         = 1 << 9;
        const MUTABLE          = 1 << 10;
        const ABSTRACT         = 1 << 11;
        const INT_SUBCLASS     = 1 << 12;
        const LIST_SUBCLASS    = 1 << 13;
        const TUPLE_SUBCLASS   = 1 << 14;
        const BYTES_SUBCLASS   = 1 << 15;
        const STR_SUBCLASS     = 1 << 16;
        const DICT_SUBCLASS    = 1 << 17;
        const EXCEPTION_SUBCLASS = 1 << 18;
        const TYPE_SUBCLASS    = 1 << 19;
    }
}

impl PublicFlags {
    /// Flags a subtype inherits unconditionally from its base (§4.F
    /// "Inherit heritable feature flags from base", §8 property 8).
    pub const HERITABLE: Self = Self::from_bits_truncate(
        Self::MATCH_SELF.bits()
            | Self::INT_SUBCLASS.bits()
            | Self::LIST_SUBCLASS.bits()
            | Self::TUPLE_SUBCLASS.bits()
            | Self::BYTES_SUBCLASS.bits()
            | Self::STR_SUBCLASS.bits()
            | Self::DICT_SUBCLASS.bits()
            | Self::EXCEPTION_SUBCLASS.bits()
            | Self::TYPE_SUBCLASS.bits(),
    );
}

bitflags! {
    /// Private kernel flags, recomputed by the post-change hook from the
    /// presence/absence of specific dunders (§4.C.3 step 2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KernelFlags: u32 {
        const HAS_GETITEM = 1 << 0;
        const HAS_ITER    = 1 << 1;
        const HAS_NEXT    = 1 << 2;
        const HAS_INDEX   = 1 << 3;
        const HAS_GET     = 1 << 4;
        const HAS_SET     = 1 << 5;
        const HAS_DELETE  = 1 << 6;
        const HAS_INIT    = 1 << 7;
    }
}

/// The three concrete kinds from §4.C.2, as a tag over the data every
/// `Type` already carries in `representations`/`self_classes` — so the
/// tag only needs to record which *shape* of those lists is allowed,
/// matching §4.C.2's invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// `representations() = [self]`.
    Simple,
    /// `representations() = [self, adopted_1, ...]`.
    Adoptive,
    /// `representations() = [shared]`, possibly aliased by sibling
    /// types in the same clique.
    Replaceable,
}

pub type TypeHandle = Arc<PyType>;

pub type AttrDict = IndexMap<String, PyObjectRef, RandomState>;

/// A fully-qualified Type record (§3 "Type").
pub struct PyType {
    id: u64,
    name: RwLock<String>,
    kind: TypeKind,
    /// Empty only for `object`.
    bases: RwLock<Vec<TypeHandle>>,
    best_base: RwLock<Option<TypeHandle>>,
    mro: RwLock<Vec<TypeHandle>>,
    dict: RwLock<AttrDict>,
    public_flags: RwLock<PublicFlags>,
    /// Recomputed wholesale on every dict mutation (§4.C.3 step 2); a
    /// lock-free cell since readers vastly outnumber writers and a
    /// whole-flags swap is already atomic by construction.
    kernel_flags: AtomicCell<KernelFlags>,
    metaclass: RwLock<Option<TypeHandle>>,
    representations: Vec<RepresentationRef>,
    self_classes: Vec<(std::any::TypeId, &'static str)>,
    /// Native constructors gathered in the Java-ready phase (§4.F). No
    /// runtime reflection exists in Rust, so these are supplied directly
    /// by the `TypeSpec` rather than discovered by inspecting a host
    /// class's constructors — see DESIGN.md.
    constructors: Vec<crate::special_method::SpecialHandle>,
}

impl std::fmt::Debug for PyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PyType").field("name", &self.name()).finish()
    }
}

static NEXT_TYPE_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

impl PyType {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_raw(
        name: String,
        kind: TypeKind,
        bases: Vec<TypeHandle>,
        dict: AttrDict,
        public_flags: PublicFlags,
        representations: Vec<RepresentationRef>,
        self_classes: Vec<(std::any::TypeId, &'static str)>,
        constructors: Vec<crate::special_method::SpecialHandle>,
    ) -> Self {
        Self {
            id: NEXT_TYPE_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            name: RwLock::new(name),
            kind,
            bases: RwLock::new(bases),
            best_base: RwLock::new(None),
            mro: RwLock::new(Vec::new()),
            dict: RwLock::new(dict),
            public_flags: RwLock::new(public_flags),
            kernel_flags: AtomicCell::new(KernelFlags::default()),
            metaclass: RwLock::new(None),
            representations,
            self_classes,
            constructors,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_same(&self, other: &TypeHandle) -> bool {
        self.id == other.id
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn rename(&self, new_name: String) {
        *self.name.write() = new_name;
    }

    /// §4.C.1 `bases()` — defensive copy.
    pub fn bases(&self) -> Vec<TypeHandle> {
        self.bases.read().clone()
    }

    pub(crate) fn set_bases(&self, bases: Vec<TypeHandle>) {
        *self.bases.write() = bases;
    }

    pub fn base(&self) -> Option<TypeHandle> {
        self.bases.read().first().cloned()
    }

    pub fn best_base(&self) -> Option<TypeHandle> {
        self.best_base.read().clone()
    }

    pub(crate) fn set_best_base(&self, base: Option<TypeHandle>) {
        *self.best_base.write() = base;
    }

    /// §4.C.1 `mro()` — defensive copy. Invariant (iv)/(v): `mro[0] ==
    /// self`, `mro[-1] == object` for every reachable type (enforced by
    /// the factory/MRO calculator, not here).
    pub fn mro(&self) -> Vec<TypeHandle> {
        self.mro.read().clone()
    }

    pub(crate) fn set_mro(&self, mro: Vec<TypeHandle>) {
        *self.mro.write() = mro;
    }

    pub fn metaclass(&self) -> Option<TypeHandle> {
        self.metaclass.read().clone()
    }

    pub(crate) fn set_metaclass(&self, metaclass: TypeHandle) {
        *self.metaclass.write() = Some(metaclass);
    }

    pub fn representations(&self) -> &[RepresentationRef] {
        &self.representations
    }

    pub fn self_classes(&self) -> &[(std::any::TypeId, &'static str)] {
        &self.self_classes
    }

    pub fn constructors(&self) -> &[crate::special_method::SpecialHandle] {
        &self.constructors
    }

    pub fn flags(&self) -> PublicFlags {
        *self.public_flags.read()
    }

    pub fn has_feature(&self, flag: PublicFlags) -> bool {
        self.public_flags.read().contains(flag)
    }

    pub(crate) fn set_flags(&self, flags: PublicFlags) {
        *self.public_flags.write() = flags;
    }

    pub(crate) fn insert_flags(&self, flags: PublicFlags) {
        self.public_flags.write().insert(flags);
    }

    pub fn kernel_flags(&self) -> KernelFlags {
        self.kernel_flags.load()
    }

    pub(crate) fn recompute_kernel_flags(&self) {
        let dict = self.dict.read();
        let has = |n: &str| dict.contains_key(n);
        let mut flags = KernelFlags::default();
        flags.set(KernelFlags::HAS_GETITEM, has("__getitem__"));
        flags.set(KernelFlags::HAS_ITER, has("__iter__"));
        flags.set(KernelFlags::HAS_NEXT, has("__next__"));
        flags.set(KernelFlags::HAS_INDEX, has("__index__"));
        flags.set(KernelFlags::HAS_GET, has("__get__"));
        flags.set(KernelFlags::HAS_SET, has("__set__"));
        flags.set(KernelFlags::HAS_DELETE, has("__delete__"));
        flags.set(KernelFlags::HAS_INIT, has("__init__"));
        drop(dict);
        self.kernel_flags.store(flags);
    }

    /// §4.C.1 `lookup(name)` — first MRO dictionary entry, no descriptor
    /// binding.
    pub fn lookup(&self, name: &str) -> Option<PyObjectRef> {
        for cls in self.mro_iter() {
            if let Some(v) = cls.dict.read().get(name) {
                return Some(v.clone());
            }
        }
        None
    }

    fn mro_iter(&self) -> Vec<TypeHandle> {
        let mro = self.mro.read();
        if mro.is_empty() {
            // MRO not computed yet: walk the base chain (§4.C.1).
            let mut chain = Vec::new();
            let mut cur = self.base();
            while let Some(c) = cur {
                chain.push(c.clone());
                cur = c.base();
            }
            chain
        } else {
            mro.clone()
        }
    }

    /// §4.C.1 `lookup_extended`.
    pub fn lookup_extended(
        &self,
        name: &str,
        has_callback: bool,
    ) -> Option<LookupResult> {
        let mro = self.mro_iter();
        let mut any_mutable = false;
        for cls in &mro {
            any_mutable |= cls.is_mutable();
            if let Some(v) = cls.dict.read().get(name) {
                let status = if !any_mutable {
                    LookupStatus::Final
                } else if has_callback {
                    LookupStatus::Current
                } else {
                    LookupStatus::Once
                };
                return Some(LookupResult {
                    value: v.clone(),
                    where_found: cls.clone(),
                    status,
                });
            }
        }
        None
    }

    fn is_mutable(&self) -> bool {
        !self.has_feature(PublicFlags::IMMUTABLE)
    }

    /// §4.C.1 `is_subtype_of`.
    pub fn is_subtype_of(&self, other: &TypeHandle) -> bool {
        let mro = self.mro_iter();
        if self.mro.read().is_empty() {
            // base-chain walk already includes everything but self;
            // check self too.
            return self.is_same(other) || mro.iter().any(|t| t.is_same(other));
        }
        mro.iter().any(|t| t.is_same(other))
    }

    /// §4.C.1 `check(x)`/`check_exact(x)`, expressed against an already
    /// resolved `obj_type = python_type(x)` (callers go through
    /// `Runtime::python_type` to get one) rather than against `x`
    /// itself, since resolving `python_type(x)` needs registry access
    /// this data-only record does not have.
    pub fn check(&self, obj_type: &TypeHandle) -> bool {
        if obj_type.id == self.id {
            return true;
        }
        obj_type.mro_iter().iter().any(|t| t.id == self.id)
    }

    pub fn check_exact(&self, obj_type: &TypeHandle) -> bool {
        self.id == obj_type.id
    }

    /// Privileged mutator (§4.C.1 `dict_put`). Recomputes kernel flags
    /// immediately; special-method cache invalidation is handled lazily
    /// by the runtime's epoch counter (§9 Open Question #1), bumped by
    /// the caller (`Runtime::type_dict_put`) rather than here, so that a
    /// type record with no runtime handy (tests constructing bare
    /// `PyType`s) still behaves deterministically.
    pub(crate) fn dict_put_raw(&self, name: String, value: PyObjectRef) {
        self.dict.write().insert(name, value);
        self.recompute_kernel_flags();
    }

    pub(crate) fn dict_remove_raw(&self, name: &str) -> Option<PyObjectRef> {
        let removed = self.dict.write().shift_remove(name);
        self.recompute_kernel_flags();
        removed
    }

    pub fn get_own(&self, name: &str) -> Option<PyObjectRef> {
        self.dict.read().get(name).cloned()
    }

    pub fn dict_snapshot(&self) -> AttrDict {
        self.dict.read().clone()
    }
}
