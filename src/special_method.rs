//! The SpecialMethod catalogue (§4.A) — the single source of truth for
//! every dunder the core knows, its signature shape, its optional
//! reverse peer, and its generic (MRO-lookup) fallback. Grounded on the
//! teacher's `types/slot_defs.rs` (`SLOT_DEFS`, a flat table of
//! dunder-name → accessor/signature entries consulted by
//! `class::add_operators` and `PyType::update_slot`).

use std::sync::Arc;

use crate::capabilities::ArgValues;
use crate::object::PyObjectRef;
use crate::runtime::Runtime;
use crate::error::PyCoreResult;

/// Signature categories from §4.A. Purely descriptive metadata here —
/// every handle is actually invoked through the uniform `(self, args,
/// kwnames)` shape already used by `CALL` in the spec, which is also
/// what `FastCall` exposes; `Signature` exists so the exposer and the
/// generic-invocation algorithm can validate arity before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Unary,
    Binary,
    Ternary,
    Call,
    Predicate,
    BinaryPredicate,
    Len,
    SetItem,
    DelItem,
    GetAttr,
    SetAttr,
    DelAttr,
    DescrGet,
    Init,
}

/// One entry per dunder the core knows about. `cacheable = false` is used
/// only for `__new__`, which the spec caches in its own dedicated slot
/// rather than the regular per-Representation cache array (§4.C.3 step
/// 1, §9 Open Question #3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SpecialMethod {
    New = 0,
    Init,
    Call,
    Repr,
    Str,
    Hash,
    Bool,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    RAdd,
    Sub,
    RSub,
    Mul,
    RMul,
    Len,
    GetItem,
    SetItem,
    DelItem,
    Iter,
    Next,
    GetAttr,
    GetAttribute,
    SetAttr,
    DelAttr,
    Get,
    Set,
    Delete,
}

pub const NUM_SPECIAL_METHODS: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct CatalogueEntry {
    pub method: SpecialMethod,
    pub dunder: &'static str,
    pub signature: Signature,
    pub reverse: Option<SpecialMethod>,
    pub cacheable: bool,
}

macro_rules! entry {
    ($m:ident, $name:literal, $sig:ident) => {
        CatalogueEntry {
            method: SpecialMethod::$m,
            dunder: $name,
            signature: Signature::$sig,
            reverse: None,
            cacheable: true,
        }
    };
    ($m:ident, $name:literal, $sig:ident, rev = $rev:ident) => {
        CatalogueEntry {
            method: SpecialMethod::$m,
            dunder: $name,
            signature: Signature::$sig,
            reverse: Some(SpecialMethod::$rev),
            cacheable: true,
        }
    };
}

pub static CATALOGUE: [CatalogueEntry; NUM_SPECIAL_METHODS] = [
    CatalogueEntry {
        method: SpecialMethod::New,
        dunder: "__new__",
        signature: Signature::Call,
        reverse: None,
        cacheable: false,
    },
    entry!(Init, "__init__", Init),
    entry!(Call, "__call__", Call),
    entry!(Repr, "__repr__", Unary),
    entry!(Str, "__str__", Unary),
    entry!(Hash, "__hash__", Unary),
    entry!(Bool, "__bool__", Predicate),
    entry!(Eq, "__eq__", BinaryPredicate, rev = Eq),
    entry!(Ne, "__ne__", BinaryPredicate, rev = Ne),
    entry!(Lt, "__lt__", BinaryPredicate, rev = Gt),
    entry!(Le, "__le__", BinaryPredicate, rev = Ge),
    entry!(Gt, "__gt__", BinaryPredicate, rev = Lt),
    entry!(Ge, "__ge__", BinaryPredicate, rev = Le),
    entry!(Add, "__add__", Binary, rev = RAdd),
    entry!(RAdd, "__radd__", Binary, rev = Add),
    entry!(Sub, "__sub__", Binary, rev = RSub),
    entry!(RSub, "__rsub__", Binary, rev = Sub),
    entry!(Mul, "__mul__", Binary, rev = RMul),
    entry!(RMul, "__rmul__", Binary, rev = Mul),
    entry!(Len, "__len__", Len),
    entry!(GetItem, "__getitem__", Binary),
    entry!(SetItem, "__setitem__", SetItem),
    entry!(DelItem, "__delitem__", DelItem),
    entry!(Iter, "__iter__", Unary),
    entry!(Next, "__next__", Unary),
    entry!(GetAttr, "__getattr__", GetAttr),
    entry!(GetAttribute, "__getattribute__", GetAttr),
    entry!(SetAttr, "__setattr__", SetAttr),
    entry!(DelAttr, "__delattr__", DelAttr),
    entry!(Get, "__get__", DescrGet),
    entry!(Set, "__set__", Ternary),
    entry!(Delete, "__delete__", Binary),
];

impl SpecialMethod {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn entry(self) -> &'static CatalogueEntry {
        &CATALOGUE[self.index()]
    }

    pub fn dunder(self) -> &'static str {
        self.entry().dunder
    }

    pub fn by_dunder(name: &str) -> Option<Self> {
        CATALOGUE.iter().find(|e| e.dunder == name).map(|e| e.method)
    }

    pub fn reverse(self) -> Option<Self> {
        self.entry().reverse
    }

    pub fn is_cacheable(self) -> bool {
        self.entry().cacheable
    }
}

/// "This special method is not defined" (§4.A.1). Internal-only: it must
/// be caught at the innermost dispatch site and never surface to a
/// caller of the public API (§7).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Empty;

pub(crate) type DispatchResult = Result<PyObjectRef, DispatchFailure>;

/// Either "undefined" ([`Empty`]) or a definitive error that must
/// propagate (§7: "AttributeError raised by a descriptor is definitive,
/// no further fallback, no suppression").
#[derive(Debug)]
pub(crate) enum DispatchFailure {
    Empty,
    Raised(crate::error::PyCoreError),
}

impl From<crate::error::PyCoreError> for DispatchFailure {
    fn from(e: crate::error::PyCoreError) -> Self {
        Self::Raised(e)
    }
}

impl From<Empty> for DispatchFailure {
    fn from(_: Empty) -> Self {
        Self::Empty
    }
}

/// A concrete, callable special-method implementation. Stored directly
/// in a `Direct` cache slot (§4.A.3).
pub type SpecialHandle =
    Arc<dyn Fn(&Runtime, &PyObjectRef, &ArgValues) -> PyCoreResult<PyObjectRef> + Send + Sync>;

/// §4.A.3's three cache disciplines.
#[derive(Clone)]
pub enum CachedSlot {
    /// Lookup returned nothing: the method is not defined on this type.
    Empty,
    /// The catalogue's generic handle: re-walks the MRO on every call.
    /// Used when the lookup status was `Once`, or the resolved value was
    /// not a method descriptor.
    Generic,
    /// A stable handle to a concrete implementation, resolved once and
    /// reused until the post-change hook invalidates it.
    Direct(SpecialHandle),
}

impl std::fmt::Debug for CachedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Generic => write!(f, "Generic"),
            Self::Direct(_) => write!(f, "Direct(..)"),
        }
    }
}

/// §4.A.2's generic invocation algorithm, implemented against the
/// `Runtime` so it can perform the MRO lookup and recursive dispatch it
/// needs.
pub(crate) fn generic_invoke(
    rt: &Runtime,
    method: SpecialMethod,
    zelf: &PyObjectRef,
    rest: &ArgValues,
) -> DispatchResult {
    let dunder = method.dunder();
    let typ = rt
        .python_type_handle(zelf)
        .map_err(DispatchFailure::Raised)?;
    let Some(value) = typ.lookup(dunder) else {
        return Err(DispatchFailure::Empty);
    };
    if rt.has_feature(&value, crate::type_obj::PublicFlags::METHOD_DESCR) {
        let args = rest.with_leading(zelf.clone());
        return Ok(rt.call_object(&value, &args)?);
    }
    match rt.descriptor_get(&value, Some(zelf.clone()), Some(typ.clone())) {
        Ok(bound) => Ok(rt.call_object(&bound, rest)?),
        Err(DispatchFailure::Empty) => Ok(rt.call_object(&value, rest)?),
        Err(other) => Err(other),
    }
}
