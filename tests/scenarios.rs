//! End-to-end scenarios exercised only through the crate's public API —
//! the same surface an embedder would actually call through, as opposed
//! to the unit tests scattered in `#[cfg(test)]` blocks next to each
//! module that can reach into `pub(crate)` internals.

use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pytype_core::capabilities::ArgValues;
use pytype_core::error::PyCoreError;
use pytype_core::exposer::{self, CallShape};
use pytype_core::factory::{self, RepresentationSpec, TypeSpec};
use pytype_core::object::{downcast_ref, PyObjectRef};
use pytype_core::protocol;
use pytype_core::representation::RepresentationKind;
use pytype_core::runtime::Runtime;
use pytype_core::subclass_builder::{Instance, SlotLayout};
use pytype_core::type_obj::{PublicFlags, TypeKind};
use pytype_core::{builtins, is_subclass};

/// A handful of private, test-local host payloads — enough to give
/// `Canonical` representations something to bind to without touching
/// the built-in ones in `builtins.rs`.
#[derive(Debug)]
struct Descriptor;

#[derive(Debug)]
struct Number(i64);

fn bootstrap() -> (Runtime, pytype_core::TypeHandle, pytype_core::TypeHandle, pytype_core::TypeHandle) {
    let _ = env_logger::try_init();
    let rt = Runtime::new();
    let (object_type, type_type, function_type) = factory::bootstrap(&rt).expect("bootstrap");
    (rt, object_type, type_type, function_type)
}

/// S1: `object`/`type` bootstrap shape.
#[test]
fn s1_bootstrap_shape() {
    let (_rt, object_type, type_type, _function_type) = bootstrap();

    assert_eq!(object_type.mro().len(), 1);
    assert!(object_type.mro()[0].is_same(&object_type));
    assert!(object_type.base().is_none());

    let type_mro = type_type.mro();
    assert_eq!(type_mro.len(), 2);
    assert!(type_mro[0].is_same(&type_type));
    assert!(type_mro[1].is_same(&object_type));
    assert!(type_type.base().unwrap().is_same(&object_type));

    assert!(object_type.metaclass().unwrap().is_same(&type_type));
    assert!(type_type.metaclass().unwrap().is_same(&type_type));
}

/// S2: a simple subclass inherits MRO, the `BASETYPE` flag, and a usable
/// `__init__` resolved along the MRO down to `object`'s own.
#[test]
fn s2_simple_subclass() {
    let (rt, object_type, _type_type, _function_type) = bootstrap();

    let spec = TypeSpec {
        name: "A".to_owned(),
        kind: TypeKind::Simple,
        bases: vec![object_type.clone()],
        public_flags: PublicFlags::BASETYPE,
        dict: Vec::new(),
        representations: vec![RepresentationSpec {
            host_class: TypeId::of::<Number>(),
            host_class_name: "Number",
            kind: RepresentationKind::Canonical,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };
    let a = rt.factory_from_spec(spec).expect("build A");

    assert_eq!(a.mro().len(), 2);
    assert!(a.mro()[0].is_same(&a));
    assert!(a.mro()[1].is_same(&object_type));
    assert!(a.base().unwrap().is_same(&object_type));
    assert!(a.has_feature(PublicFlags::BASETYPE));
    assert!(is_subclass(&a, &object_type));

    let inherited_init = a.lookup("__init__").expect("inherited __init__");
    let objects_own_init = object_type.get_own("__init__").expect("object defines __init__");
    assert!(Arc::ptr_eq(&inherited_init, &objects_own_init));
}

/// S3: multiple inheritance. `D(B, C)` and `E(C, B)` each linearise
/// fine; `F(D, E)` has no consistent C3 order and building it fails.
#[test]
fn s3_multiple_inheritance() {
    let (rt, object_type, _type_type, _function_type) = bootstrap();

    let base_spec = |name: &str, host: TypeId, host_name: &'static str, bases: Vec<pytype_core::TypeHandle>| TypeSpec {
        name: name.to_owned(),
        kind: TypeKind::Simple,
        bases,
        public_flags: PublicFlags::BASETYPE,
        dict: Vec::new(),
        representations: vec![RepresentationSpec {
            host_class: host,
            host_class_name: host_name,
            kind: RepresentationKind::Canonical,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };

    #[derive(Debug)]
    struct B;
    #[derive(Debug)]
    struct C;
    #[derive(Debug)]
    struct D;
    #[derive(Debug)]
    struct E;
    #[derive(Debug)]
    struct F;

    let b = rt
        .factory_from_spec(base_spec("B", TypeId::of::<B>(), "B", vec![object_type.clone()]))
        .unwrap();
    let c = rt
        .factory_from_spec(base_spec("C", TypeId::of::<C>(), "C", vec![object_type.clone()]))
        .unwrap();
    let d = rt
        .factory_from_spec(base_spec("D", TypeId::of::<D>(), "D", vec![b.clone(), c.clone()]))
        .unwrap();
    let e = rt
        .factory_from_spec(base_spec("E", TypeId::of::<E>(), "E", vec![c.clone(), b.clone()]))
        .unwrap();

    assert_eq!(d.mro().iter().map(|t| t.name()).collect::<Vec<_>>(), vec!["D", "B", "C", "object"]);
    assert_eq!(e.mro().iter().map(|t| t.name()).collect::<Vec<_>>(), vec!["E", "C", "B", "object"]);

    let f_result = rt.factory_from_spec(base_spec("F", TypeId::of::<F>(), "F", vec![d, e]));
    assert!(f_result.is_err(), "F(D, E) should have no consistent MRO");
    assert!(matches!(f_result.unwrap_err(), PyCoreError::Interpreter(_)));
}

/// S4: a data descriptor (defines both `__get__` and `__set__`) on the
/// owning type wins over an instance attribute of the same name.
#[test]
fn s4_data_descriptor_precedence() {
    let (rt, object_type, _type_type, _function_type) = bootstrap();

    let set_calls = Arc::new(AtomicUsize::new(0));
    let set_calls_for_closure = set_calls.clone();

    let descr_spec = TypeSpec {
        name: "Descriptor".to_owned(),
        kind: TypeKind::Simple,
        bases: vec![object_type.clone()],
        public_flags: PublicFlags::BASETYPE,
        dict: vec![
            (
                "__get__".to_owned(),
                exposer::method_descriptor("__get__", CallShape::O2, |_args| Ok(builtins::new_int(100))),
            ),
            (
                "__set__".to_owned(),
                exposer::method_descriptor("__set__", CallShape::O2, move |_args| {
                    set_calls_for_closure.fetch_add(1, Ordering::SeqCst);
                    Ok(builtins::none_singleton())
                }),
            ),
        ],
        representations: vec![RepresentationSpec {
            host_class: TypeId::of::<Descriptor>(),
            host_class_name: "Descriptor",
            kind: RepresentationKind::Canonical,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };
    let descriptor_type = rt.factory_from_spec(descr_spec).expect("build Descriptor");
    let descriptor_instance = Arc::new(Descriptor) as PyObjectRef;
    assert!(is_subclass(&descriptor_type, &object_type));

    let layout = Arc::new(SlotLayout::new(Vec::new()));
    let owner_spec = TypeSpec {
        name: "Owner".to_owned(),
        kind: TypeKind::Replaceable,
        bases: vec![object_type.clone()],
        public_flags: PublicFlags::BASETYPE | PublicFlags::MUTABLE,
        dict: vec![("attr".to_owned(), descriptor_instance)],
        representations: vec![RepresentationSpec {
            host_class: TypeId::of::<Instance>(),
            host_class_name: "Instance",
            kind: RepresentationKind::Shared,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };
    let owner_type = rt.factory_from_spec(owner_spec).expect("build Owner");
    let owner_instance = Arc::new(Instance::new(owner_type.clone(), layout)) as PyObjectRef;

    // Shadow the descriptor's name in the instance dict; the descriptor
    // must still win on read.
    if let Some(inst) = downcast_ref::<Instance>(&owner_instance) {
        inst.dict_put("attr".to_owned(), builtins::new_int(999));
    }

    let got = protocol::getattro(&rt, &owner_instance, "attr").expect("getattro");
    assert_eq!(downcast_ref::<pytype_core::builtins::PyInt>(&got).unwrap().0, 100);

    protocol::setattro(&rt, &owner_instance, "attr", builtins::new_int(1)).expect("setattro");
    assert_eq!(set_calls.load(Ordering::SeqCst), 1);

    // The instance dict was never touched by the data-descriptor write.
    let snapshot = downcast_ref::<Instance>(&owner_instance).unwrap().dict_snapshot();
    assert_eq!(downcast_ref::<pytype_core::builtins::PyInt>(snapshot.get("attr").unwrap()).unwrap().0, 999);
}

/// S5: `type(...)` calling convention — `__new__` runs, then `__init__`
/// runs against the freshly built instance, each exactly once.
#[test]
fn s5_type_call_new_then_init() {
    let (rt, object_type, _type_type, _function_type) = bootstrap();

    let spec = TypeSpec {
        name: "Widget".to_owned(),
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
    let widget_type = rt.factory_from_spec(spec).expect("build Widget");

    let new_calls = Arc::new(AtomicUsize::new(0));
    let init_calls = Arc::new(AtomicUsize::new(0));
    let layout = Arc::new(SlotLayout::new(Vec::new()));

    {
        let new_calls = new_calls.clone();
        let layout = layout.clone();
        let ctor = exposer::new_method_descriptor("__new__", widget_type.clone(), move |args| {
            new_calls.fetch_add(1, Ordering::SeqCst);
            let requested = pytype_core::object::downcast::<pytype_core::type_obj::PyType>(args.args[0].clone())
                .map_err(|_| PyCoreError::type_error("__new__ arg 1 must be a type"))?;
            Ok(Arc::new(Instance::new(requested, layout.clone())) as PyObjectRef)
        });
        rt.type_dict_put(&widget_type, "__new__", ctor).unwrap();
    }
    {
        let init_calls = init_calls.clone();
        let init = exposer::method_descriptor("__init__", CallShape::NoArgs, move |_args| {
            init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(builtins::none_singleton())
        });
        rt.type_dict_put(&widget_type, "__init__", init).unwrap();
    }

    let obj = protocol::type_call(&rt, &widget_type, &ArgValues::default()).expect("type_call");
    assert!(downcast_ref::<Instance>(&obj).is_some());
    assert_eq!(new_calls.load(Ordering::SeqCst), 1);
    assert_eq!(init_calls.load(Ordering::SeqCst), 1);
}

/// S6: redefining and then deleting a special method changes what the
/// next lookup sees, with no separate invalidation step required from
/// the caller.
#[test]
fn s6_dict_mutation_changes_lookup_immediately() {
    let (rt, object_type, _type_type, _function_type) = bootstrap();

    let spec = TypeSpec {
        name: "Number".to_owned(),
        kind: TypeKind::Simple,
        bases: vec![object_type.clone()],
        public_flags: PublicFlags::BASETYPE,
        dict: Vec::new(),
        representations: vec![RepresentationSpec {
            host_class: TypeId::of::<Number>(),
            host_class_name: "Number",
            kind: RepresentationKind::Canonical,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };
    let number_type = rt.factory_from_spec(spec).expect("build Number");

    let lhs = Arc::new(Number(7)) as PyObjectRef;
    let rhs = Arc::new(Number(3)) as PyObjectRef;
    let call_add = |rt: &Runtime, typ: &pytype_core::TypeHandle, a: &PyObjectRef, b: &PyObjectRef| -> i64 {
        let add = typ.lookup("__add__").expect("__add__ defined");
        let args = ArgValues::positional(vec![a.clone(), b.clone()]);
        let result = rt.call_object(&add, &args).unwrap();
        downcast_ref::<pytype_core::builtins::PyInt>(&result).unwrap().0
    };

    let sum_impl = exposer::method_descriptor("__add__", CallShape::O1, |args| {
        let a = downcast_ref::<Number>(&args.args[0]).unwrap().0;
        let b = downcast_ref::<Number>(&args.args[1]).unwrap().0;
        Ok(builtins::new_int(a + b))
    });
    rt.type_dict_put(&number_type, "__add__", sum_impl).unwrap();
    assert_eq!(call_add(&rt, &number_type, &lhs, &rhs), 10);

    let product_impl = exposer::method_descriptor("__add__", CallShape::O1, |args| {
        let a = downcast_ref::<Number>(&args.args[0]).unwrap().0;
        let b = downcast_ref::<Number>(&args.args[1]).unwrap().0;
        Ok(builtins::new_int(a * b))
    });
    rt.type_dict_put(&number_type, "__add__", product_impl).unwrap();
    assert_eq!(call_add(&rt, &number_type, &lhs, &rhs), 21);

    rt.type_dict_remove(&number_type, "__add__").unwrap();
    assert!(number_type.lookup("__add__").is_none());
}

/// S7: `__class__` reassignment succeeds within a clique sharing the
/// same host representation, and is rejected across cliques.
#[test]
fn s7_class_assignment_within_and_across_clique() {
    use pytype_core::capabilities::{WithClass, WithClassAssignment};

    let (rt, object_type, _type_type, _function_type) = bootstrap();
    let layout = Arc::new(SlotLayout::new(Vec::new()));

    let sibling_spec = |name: &str| TypeSpec {
        name: name.to_owned(),
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

    let sibling1 = rt.factory_from_spec(sibling_spec("Sibling1")).expect("build Sibling1");
    let sibling2 = rt.factory_from_spec(sibling_spec("Sibling2")).expect("build Sibling2");

    let instance = Instance::new(sibling1.clone(), layout.clone());
    instance.set_class(sibling2.clone()).expect("reassignment within the Instance clique");
    assert!(instance.get_class().is_same(&sibling2));

    #[derive(Debug)]
    struct OtherHost;
    let other_spec = TypeSpec {
        name: "Other".to_owned(),
        kind: TypeKind::Simple,
        bases: vec![object_type.clone()],
        public_flags: PublicFlags::BASETYPE,
        dict: Vec::new(),
        representations: vec![RepresentationSpec {
            host_class: TypeId::of::<OtherHost>(),
            host_class_name: "OtherHost",
            kind: RepresentationKind::Canonical,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };
    let other = rt.factory_from_spec(other_spec).expect("build Other");
    assert!(instance.set_class(other).is_err(), "cross-clique reassignment must be rejected");
}
