//! `LookupResult`/`LookupStatus` (§3, §4.C.1, §9 Open Question #2).

use crate::object::PyObjectRef;
use crate::type_obj::TypeHandle;

/// Reported by `Type::lookup_extended`. `status` tells the caller how
/// aggressively it may cache `value`.
pub struct LookupResult {
    pub value: PyObjectRef,
    pub where_found: TypeHandle,
    pub status: LookupStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    /// No type walked along the way is mutable: the binding can be cached
    /// forever.
    Final,
    /// A callback was supplied and at least one walked type is mutable;
    /// reserved per §9 Open Question #2 — no subscription mechanism
    /// exists yet, so this status is recorded but the callback is never
    /// invoked.
    Current,
    /// No callback was supplied and at least one walked type is mutable:
    /// caching this result is unsafe.
    Once,
}

/// A no-op subscription callback type. Accepted by `lookup_extended` for
/// forward compatibility (§9 Open Question #2) but never called.
pub type InvalidationCallback = std::sync::Arc<dyn Fn() + Send + Sync>;
