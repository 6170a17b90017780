//! The type exposer (§4.H): turns a "method impls" host class's native
//! methods into `(name, descriptor)` dictionary entries, the way the
//! teacher's `#[pyclass]`/`PyClassImpl::extend_class` machinery expands
//! annotated `impl` blocks into `PyMethodDef`-equivalent entries —
//! except this core has no attribute-macro layer to read, so a
//! `TypeSpec` builder calls these functions directly with plain Rust
//! closures instead of having them discovered by a proc-macro.

use std::sync::Arc;

use crate::capabilities::{ArgValues, FastCall, NativeFunction};
use crate::error::PyCoreResult;
use crate::object::PyObjectRef;

/// Arity/keyword shape of one exposed method (§4.H), chosen once per
/// method and used to pick an optimised call path instead of always
/// paying for the general `(args[], kwnames[])` dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    NoArgs,
    O1,
    O2,
    O3,
    Positional,
    General,
}

impl CallShape {
    pub fn classify(min_positional: usize, max_positional: Option<usize>, accepts_kwargs: bool) -> Self {
        if accepts_kwargs || max_positional.is_none() {
            return Self::General;
        }
        let max = max_positional.unwrap();
        if min_positional == max {
            match max {
                0 => Self::NoArgs,
                1 => Self::O1,
                2 => Self::O2,
                3 => Self::O3,
                _ => Self::Positional,
            }
        } else {
            Self::Positional
        }
    }
}

fn check_arity(args: &ArgValues, shape: CallShape, name: &str) -> PyCoreResult<()> {
    let n = args.args.len();
    let ok = match shape {
        CallShape::NoArgs => n == 1,   // self only
        CallShape::O1 => n == 2,       // self + 1
        CallShape::O2 => n == 3,
        CallShape::O3 => n == 4,
        CallShape::Positional | CallShape::General => true,
    };
    if ok && (shape == CallShape::General || args.kwargs.is_empty()) {
        Ok(())
    } else {
        Err(crate::error::PyCoreError::type_error(format!(
            "{name}() got an unexpected argument shape"
        )))
    }
}

/// A plain instance method: `self` is args[0], the rest are the call's
/// own arguments.
pub fn method_descriptor(
    name: &'static str,
    shape: CallShape,
    func: impl Fn(&ArgValues) -> PyCoreResult<PyObjectRef> + Send + Sync + 'static,
) -> PyObjectRef {
    Arc::new(NativeFunction::new(name, move |args| {
        check_arity(args, shape, name)?;
        func(args)
    })) as PyObjectRef
}

/// A static method: no implicit `self`, called exactly as given.
pub fn static_method_descriptor(
    name: &'static str,
    func: impl Fn(&ArgValues) -> PyCoreResult<PyObjectRef> + Send + Sync + 'static,
) -> PyObjectRef {
    Arc::new(NativeFunction::new(name, func)) as PyObjectRef
}

/// A classmethod: args[0] is the (sub)type the call was made through
/// rather than an instance, supplied by the caller via `bind_class` at
/// the call site the way the generic dispatch algorithm supplies `self`
/// for instance methods.
pub fn classmethod_descriptor(
    name: &'static str,
    func: impl Fn(&ArgValues) -> PyCoreResult<PyObjectRef> + Send + Sync + 'static,
) -> PyObjectRef {
    Arc::new(NativeFunction::new(name, func)) as PyObjectRef
}

/// A `__new__`-method descriptor (§4.C.4/§4.C.5): the defining type is
/// supplied so the wrapped closure can reject a caller passing a type
/// that isn't a subtype of it (`object.__new__` called directly on an
/// unrelated type, for instance).
pub fn new_method_descriptor(
    name: &'static str,
    defining_type: crate::type_obj::TypeHandle,
    func: impl Fn(&ArgValues) -> PyCoreResult<PyObjectRef> + Send + Sync + 'static,
) -> PyObjectRef {
    Arc::new(NativeFunction::new(name, move |args| {
        let Some(first) = args.args.first() else {
            return Err(crate::error::PyCoreError::type_error(format!(
                "{name}() missing type argument"
            )));
        };
        let requested = crate::object::downcast::<crate::type_obj::PyType>(first.clone())
            .map_err(|_| crate::error::PyCoreError::type_error(format!("{name}() argument 1 must be a type")))?;
        if !requested.is_subtype_of(&defining_type) && !requested.is_same(&defining_type) {
            return Err(crate::error::PyCoreError::type_error(format!(
                "{name}() requires a subtype of '{}' as first argument",
                defining_type.name()
            )));
        }
        func(args)
    })) as PyObjectRef
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_fixed_arity() {
        assert_eq!(CallShape::classify(0, Some(0), false), CallShape::NoArgs);
        assert_eq!(CallShape::classify(1, Some(1), false), CallShape::O1);
        assert_eq!(CallShape::classify(0, None, true), CallShape::General);
        assert_eq!(CallShape::classify(2, Some(5), false), CallShape::Positional);
    }
}
