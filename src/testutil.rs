//! Shared scaffolding for unit tests scattered across the crate, so each
//! module's `#[cfg(test)]` block doesn't re-derive its own miniature
//! bootstrap. Mirrors the teacher's `vm::Interpreter::without_stdlib`
//! test helper in spirit — a cheap, fully-isolated runtime per test.

use std::any::TypeId;
use std::sync::{Arc, Once};

use crate::factory::{self, RepresentationSpec, TypeSpec};
use crate::object::PyObjectRef;
use crate::representation::RepresentationKind;
use crate::runtime::Runtime;
use crate::subclass_builder::{Instance, SlotLayout};
use crate::type_obj::{AttrDict, PublicFlags, PyType, TypeHandle, TypeKind};

static LOG_INIT: Once = Once::new();

/// Installs `env_logger` once per test binary, so the `log::debug!`/
/// `log::trace!` calls scattered through `factory.rs`/`registry.rs`
/// actually go somewhere under `RUST_LOG=... cargo test -- --nocapture`,
/// the way the teacher's own `env_logger::init()` call does for its
/// binaries. `try_init` rather than `init` since every test in the
/// binary calls this.
fn init_logging() {
    LOG_INIT.call_once(|| {
        let _ = env_logger::try_init();
    });
}

/// A standalone `object`-like type record with no Runtime, bases, or
/// Representation behind it — enough for MRO-only tests.
pub(crate) fn fresh_object_type() -> TypeHandle {
    init_logging();
    let typ = Arc::new(PyType::new_raw(
        "object".to_owned(),
        TypeKind::Simple,
        Vec::new(),
        AttrDict::default(),
        PublicFlags::BASETYPE,
        Vec::new(),
        Vec::new(),
        Vec::new(),
    ));
    typ.set_mro(vec![typ.clone()]);
    typ
}

/// A freshly bootstrapped Runtime, plus a user-defined `Sample(object)`
/// type (`Shared` representation) and one instance of it.
pub(crate) fn fresh_runtime_with_object_and_type() -> (Runtime, TypeHandle, TypeHandle, PyObjectRef) {
    init_logging();
    let rt = Runtime::new();
    let (object_type, _type_type, _function_type) =
        factory::bootstrap(&rt).expect("bootstrap object/type");

    let spec = TypeSpec {
        name: "Sample".to_owned(),
        kind: TypeKind::Replaceable,
        bases: vec![object_type.clone()],
        public_flags: PublicFlags::BASETYPE | PublicFlags::MUTABLE,
        dict: Vec::new(),
        representations: vec![RepresentationSpec {
            host_class: TypeId::of::<Instance>(),
            host_class_name: "Instance",
            kind: RepresentationKind::Shared,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };
    let typ = rt.factory_from_spec(spec).expect("build Sample type");

    let layout = Arc::new(SlotLayout::new(Vec::new()));
    let instance = Arc::new(Instance::new(typ.clone(), layout)) as PyObjectRef;

    (rt, object_type, typ, instance)
}
