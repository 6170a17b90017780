//! The object model (§3, §9 "Cyclic references" / "Global mutable state").
//!
//! Every host value the core ever touches is reached through
//! [`PyObjectRef`], a reference-counted, thread-shareable handle to a
//! type-erased payload — the same `Arc<dyn Any>`-flavoured shape the
//! teacher crate gets by hand-rolling a vtable (`object/core.rs`); we take
//! the safe-Rust version of the same idea (downcast through `Any` rather
//! than a custom vtable) since we never profile or build this crate, and
//! an unverified `unsafe` trick is not a trade worth making here.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Capability every Python object's host payload must implement.
///
/// `fmt::Debug` backs `repr`-for-free in test assertions; real `__repr__`
/// dispatch goes through the special-method cache, not this trait.
pub trait PyObjectPayload: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + fmt::Debug + Send + Sync> PyObjectPayload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A reference-counted, type-erased Python object.
pub type PyObjectRef = Arc<dyn PyObjectPayload>;

/// The host class's [`TypeId`] — the registry's key (§4.E).
pub fn host_class_of(obj: &PyObjectRef) -> TypeId {
    (**obj).as_any().type_id()
}

pub fn downcast_ref<T: PyObjectPayload>(obj: &PyObjectRef) -> Option<&T> {
    obj.as_any().downcast_ref::<T>()
}

/// Fallible typed clone-out of a payload, mirroring the teacher's
/// `obj.downcast::<T>()` on `PyObjectRef` (object/core.rs).
pub fn downcast<T: PyObjectPayload>(obj: PyObjectRef) -> Result<Arc<T>, PyObjectRef> {
    let any_arc = obj.clone().as_any_arc();
    match any_arc.downcast::<T>() {
        Ok(typed) => Ok(typed),
        Err(_) => Err(obj),
    }
}

/// Typed handle over a concrete payload, mirroring the teacher's
/// `Py<T>`/`PyRef<T>` distinction (object/core.rs) minus the unsafe
/// erasure trick: `PyRef<T>` keeps both the erased and typed `Arc` so it
/// can be handed back out as a [`PyObjectRef`] without re-allocating.
pub struct PyRef<T: PyObjectPayload> {
    untyped: PyObjectRef,
    typed: Arc<T>,
}

impl<T: PyObjectPayload> Clone for PyRef<T> {
    fn clone(&self) -> Self {
        Self {
            untyped: self.untyped.clone(),
            typed: self.typed.clone(),
        }
    }
}

impl<T: PyObjectPayload> std::ops::Deref for PyRef<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.typed
    }
}

impl<T: PyObjectPayload> PyRef<T> {
    pub fn new(value: T) -> Self
    where
        T: Sized,
    {
        let typed = Arc::new(value);
        let untyped: PyObjectRef = typed.clone();
        Self { untyped, typed }
    }

    pub fn as_object(&self) -> &PyObjectRef {
        &self.untyped
    }

    pub fn into_object(self) -> PyObjectRef {
        self.untyped
    }

    /// Fallible conversion from an untyped handle.
    pub fn try_from_object(obj: &PyObjectRef) -> Option<Self> {
        let typed = obj.clone().as_any_arc().downcast::<T>().ok()?;
        Some(Self {
            untyped: obj.clone(),
            typed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Sample(i64);

    #[test]
    fn downcast_roundtrip() {
        let pyref = PyRef::new(Sample(42));
        let obj: PyObjectRef = pyref.as_object().clone();
        assert_eq!(downcast_ref::<Sample>(&obj).unwrap().0, 42);
        let typed = PyRef::<Sample>::try_from_object(&obj).unwrap();
        assert_eq!(typed.0, 42);
        assert!(PyRef::<String>::try_from_object(&obj).is_none());
    }

    #[test]
    fn host_class_distinguishes_payload_types() {
        let a: PyObjectRef = PyRef::new(Sample(1)).into_object();
        let b: PyObjectRef = PyRef::new(Sample(2)).into_object();
        let c: PyObjectRef = Arc::new(7i64);
        assert_eq!(host_class_of(&a), host_class_of(&b));
        assert_ne!(host_class_of(&a), host_class_of(&c));
    }
}
