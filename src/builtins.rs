//! A handful of concrete host payload types, enough to exercise all
//! three Representation kinds (§3) and to give the protocol/runtime
//! code real singletons (`None`, interned small strings) to hand back.
//! Grounded on the teacher's `builtins::{none,int,bool_,pystr}` modules,
//! trimmed to what this core's dispatch machinery needs to look at
//! rather than to a full numeric tower.

use std::sync::Arc;
use std::sync::OnceLock;

use crate::object::PyObjectRef;
use crate::type_obj::TypeHandle;

/// Canonical representation: the host class backing bare `object()`
/// instances.
#[derive(Debug)]
pub struct PyBaseObject;

/// Canonical representation: `PyNoneType` is both host class and Python
/// type, one singleton instance.
#[derive(Debug)]
pub struct PyNoneType;

/// Canonical representation: a plain boxed `i64`.
#[derive(Debug)]
pub struct PyInt(pub i64);

/// Canonical representation: a plain boxed `bool`, adopted into `PyInt`
/// in real Python (`bool` is an `int` subclass) — kept separate here so
/// §4.C.2's `AdoptiveType` has a realistic second-representation
/// candidate (`PyBool` values are also valid `PyInt` representations
/// via `Adopted`), wired up by whatever `TypeSpec` registers it.
#[derive(Debug)]
pub struct PyBool(pub bool);

/// Canonical representation: an owned, immutable string.
#[derive(Debug)]
pub struct PyStr(pub String);

static NONE_SINGLETON: OnceLock<PyObjectRef> = OnceLock::new();

pub fn none_singleton() -> PyObjectRef {
    NONE_SINGLETON
        .get_or_init(|| Arc::new(PyNoneType) as PyObjectRef)
        .clone()
}

pub fn new_str(value: impl Into<String>) -> PyObjectRef {
    Arc::new(PyStr(value.into())) as PyObjectRef
}

pub fn new_int(value: i64) -> PyObjectRef {
    Arc::new(PyInt(value)) as PyObjectRef
}

pub fn new_bool(value: bool) -> PyObjectRef {
    Arc::new(PyBool(value)) as PyObjectRef
}

/// A `TypeHandle` is itself a `PyObjectRef` (types are first-class
/// objects, §3): this is the unsizing coercion spelled out as a
/// function so call sites read like the rest of the dispatch code
/// rather than sprinkling `as PyObjectRef` everywhere.
pub fn type_as_object(typ: TypeHandle) -> PyObjectRef {
    typ as PyObjectRef
}

/// Stand-ins for a full `PyTuple`/`PyDict` builtin, which this core
/// doesn't implement (out of scope, see DESIGN.md): `type(name, bases,
/// ns)` needs *some* carrier for its second and third arguments, so
/// bases travel as a bare `Vec<TypeHandle>` payload and the namespace as
/// a bare `AttrDict` payload rather than real sequence/mapping objects.
pub fn new_bases_tuple(bases: Vec<TypeHandle>) -> PyObjectRef {
    Arc::new(bases) as PyObjectRef
}

pub fn new_namespace(ns: crate::type_obj::AttrDict) -> PyObjectRef {
    Arc::new(ns) as PyObjectRef
}
