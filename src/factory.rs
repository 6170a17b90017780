//! The TypeFactory (§4.F): two-phase, concurrency-safe construction of
//! new Types. Grounded on the teacher's `PyType::new_verbose`/
//! `PyType::new_simple` plus `class::StaticType::init_builtin_type`
//! (the "Java-ready" phase — gather bases/flags/representations/
//! constructors without touching the registry — followed by a
//! "Python-ready" phase that computes MRO/best_base/metaclass and
//! publishes).

use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::capabilities::ArgValues;
use crate::error::{InterpreterFault, PyCoreError, PyCoreResult};
use crate::mro::linearise_mro;
use crate::object::PyObjectRef;
use crate::representation::{Representation, RepresentationKind, RepresentationRef};
use crate::runtime::Runtime;
use crate::special_method::SpecialHandle;
use crate::type_obj::{AttrDict, PublicFlags, PyType, TypeHandle, TypeKind};

/// What a [`Clash`] was detected during (§4.F: "a clash aborts the whole
/// workshop batch, nothing partially publishes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClashMode {
    /// Two representations in the same batch claim the same host class.
    DuplicateHostClass,
    /// No consistent MRO exists for the requested bases.
    InconsistentMro,
    /// The computed metaclass is not a subtype of every base's metaclass.
    MetaclassConflict,
    /// `best_base` could not settle on a single solid base (multiple
    /// incompatible instance layouts among the bases).
    LayoutConflict,
    /// `from_spec` recursed into itself past `MAX_REENTRANCY`, almost
    /// certainly because a spec's base resolution loops back into
    /// building the same spec.
    ReentrancyOverflow,
}

#[derive(Debug, Clone)]
pub struct Clash {
    pub mode: ClashMode,
    pub class_name: String,
    pub spec_name: String,
}

/// One representation to register as part of a [`TypeSpec`] (§4.F
/// "gather all representations named by the spec before publishing
/// any of them").
pub struct RepresentationSpec {
    pub host_class: TypeId,
    pub host_class_name: &'static str,
    pub kind: RepresentationKind,
}

/// Everything the factory needs to build one Type (§6 `TypeSpec`).
pub struct TypeSpec {
    pub name: String,
    pub kind: TypeKind,
    pub bases: Vec<TypeHandle>,
    pub public_flags: PublicFlags,
    pub dict: Vec<(String, PyObjectRef)>,
    pub representations: Vec<RepresentationSpec>,
    pub constructors: Vec<SpecialHandle>,
    pub metaclass: Option<TypeHandle>,
}

impl TypeSpec {
    pub fn simple<T: 'static>(name: impl Into<String>, host_class_name: &'static str) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Simple,
            bases: Vec::new(),
            public_flags: PublicFlags::BASETYPE,
            dict: Vec::new(),
            representations: vec![RepresentationSpec {
                host_class: TypeId::of::<T>(),
                host_class_name,
                kind: RepresentationKind::Canonical,
            }],
            constructors: Vec::new(),
            metaclass: None,
        }
    }
}

/// The "workshop": an in-progress batch of Types under construction.
/// Nothing here is visible to [`crate::registry::Registry`] until
/// [`TypeFactory::from_spec`] returns successfully (§4.F "unpublished
/// until the whole batch settles").
struct Workshop {
    reentrancy: AtomicUsize,
}

/// Guards against runaway recursive construction (a `TypeSpec` whose
/// base resolution loops back into building the same spec) rather than
/// any legitimate nesting depth; trips well before a real type
/// hierarchy (the deepest builtin MRO is a handful of levels) could
/// reach it.
const MAX_REENTRANCY: usize = 64;

pub struct TypeFactory {
    workshop: Workshop,
}

impl Default for TypeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeFactory {
    pub fn new() -> Self {
        Self {
            workshop: Workshop {
                reentrancy: AtomicUsize::new(0),
            },
        }
    }

    /// Builds and publishes one Type from `spec` (§4.F two-phase
    /// construction). `rt` is needed only to reach the Registry for
    /// publication; the Java-ready phase below never touches it.
    pub fn from_spec(&self, rt: &Runtime, spec: TypeSpec) -> PyCoreResult<TypeHandle> {
        let depth = self.workshop.reentrancy.fetch_add(1, Ordering::AcqRel);
        let _guard = scopeguard(&self.workshop.reentrancy);
        if depth >= MAX_REENTRANCY {
            log::debug!("clash building '{}': reentrancy overflow at depth {}", spec.name, depth);
            return Err(PyCoreError::fatal(InterpreterFault::Clash(Clash {
                mode: ClashMode::ReentrancyOverflow,
                class_name: spec.name.clone(),
                spec_name: spec.name,
            })));
        }

        // --- Java-ready phase: gather, without publishing anything. ---
        // A `Shared` representation may legitimately already be published:
        // that's a sibling joining an existing clique (§4.C.2), not a
        // clash. Only a second claim on a `Canonical`/`Adopted` host class
        // is an actual conflict.
        for existing in &spec.representations {
            if matches!(existing.kind, RepresentationKind::Shared) {
                continue;
            }
            if rt.registry.lookup(existing.host_class).is_some() {
                log::debug!(
                    "clash building '{}': host class '{}' already published",
                    spec.name,
                    existing.host_class_name
                );
                return Err(PyCoreError::fatal(InterpreterFault::Clash(Clash {
                    mode: ClashMode::DuplicateHostClass,
                    class_name: existing.host_class_name.to_owned(),
                    spec_name: spec.name,
                })));
            }
        }

        let mut dict = AttrDict::default();
        for (k, v) in spec.dict {
            dict.insert(k, v);
        }

        // A clique sibling reuses the clique's existing `Representation`
        // (same `Arc`, already bound/published) rather than minting its
        // own, so that every sibling's `representations()[0]` names the
        // same host class for `WithClassAssignment`'s default check.
        let mut fresh_representations: Vec<RepresentationRef> = Vec::new();
        let representations: Vec<RepresentationRef> = spec
            .representations
            .iter()
            .enumerate()
            .map(|(i, r)| {
                if let Some(existing) = rt.registry.lookup(r.host_class) {
                    return existing;
                }
                let kind = if i == 0 {
                    r.kind.clone()
                } else {
                    RepresentationKind::Adopted { index: i }
                };
                let fresh = Arc::new(Representation::new_dynamic(r.host_class, r.host_class_name, kind));
                fresh_representations.push(fresh.clone());
                fresh
            })
            .collect();

        let self_classes: Vec<(TypeId, &'static str)> = spec
            .representations
            .iter()
            .map(|r| (r.host_class, r.host_class_name))
            .collect();

        let typ = Arc::new(PyType::new_raw(
            spec.name.clone(),
            spec.kind,
            spec.bases.clone(),
            dict,
            spec.public_flags,
            representations.clone(),
            self_classes,
            spec.constructors,
        ));
        // A `TypeSpec`'s initial dict bypasses `dict_put_raw`, so the
        // kernel-flags snapshot has to be primed here the one time it
        // isn't a reaction to a mutation.
        typ.recompute_kernel_flags();

        // --- Python-ready phase: MRO, best_base, metaclass, publish. ---
        self.settle_mro(&typ, &spec.bases, &spec.name)?;
        self.settle_best_base(&typ, &spec.bases, &spec.name)?;
        let metaclass = spec
            .metaclass
            .or_else(|| rt.registry.type_type())
            .unwrap_or_else(|| typ.clone());
        typ.set_metaclass(metaclass);

        for base in &spec.bases {
            typ.insert_flags(base.flags() & PublicFlags::HERITABLE);
        }

        // Only the representations this call actually minted get bound
        // and published; a reused clique representation keeps pointing at
        // whichever sibling first defined it.
        for repr in &fresh_representations {
            repr.bind(typ.clone());
            rt.registry.publish(repr.host_class(), repr.clone());
        }
        log::debug!(
            "published '{}' ({} representation(s))",
            typ.name(),
            fresh_representations.len()
        );

        Ok(typ)
    }

    fn settle_mro(&self, typ: &TypeHandle, bases: &[TypeHandle], spec_name: &str) -> PyCoreResult<()> {
        if bases.is_empty() {
            typ.set_mro(vec![typ.clone()]);
            return Ok(());
        }
        let mut to_merge: Vec<Vec<TypeHandle>> = bases.iter().map(|b| b.mro()).collect();
        to_merge.push(bases.to_vec());
        let mut mro = linearise_mro(to_merge).map_err(|reason| {
            log::debug!("clash building '{}': inconsistent MRO ({})", spec_name, reason);
            PyCoreError::fatal(InterpreterFault::Clash(Clash {
                mode: ClashMode::InconsistentMro,
                class_name: typ.name(),
                spec_name: spec_name.to_owned(),
            }))
        })?;
        mro.insert(0, typ.clone());
        typ.set_mro(mro);
        Ok(())
    }

    /// `best_base` picks the single base whose instance layout every
    /// other base is compatible with (§4.F "no two unrelated bases may
    /// each demand a concrete, distinct in-memory layout").
    fn settle_best_base(
        &self,
        typ: &TypeHandle,
        bases: &[TypeHandle],
        spec_name: &str,
    ) -> PyCoreResult<()> {
        let Some(first) = bases.first() else {
            return Ok(());
        };
        let mut candidate = first.clone();
        for base in &bases[1..] {
            if base.is_subtype_of(&candidate) {
                candidate = base.clone();
            } else if candidate.is_subtype_of(base) {
                // candidate already dominates.
            } else {
                log::debug!("clash building '{}': incompatible base layouts", spec_name);
                return Err(PyCoreError::fatal(InterpreterFault::Clash(Clash {
                    mode: ClashMode::LayoutConflict,
                    class_name: typ.name(),
                    spec_name: spec_name.to_owned(),
                })));
            }
        }
        typ.set_best_base(Some(candidate));
        Ok(())
    }
}

/// Bootstraps `object` and `type` themselves (§4.F "the factory must be
/// able to construct its own first two types without a pre-existing
/// metaclass to ask for"). Mirrors the teacher's `TypeZoo` two-step
/// dance: build both with a placeholder self-metaclass, then backpatch
/// `type_type` onto both once it exists. Also registers the type behind
/// every native method/function object (`builtin_function_or_method`,
/// flagged `METHOD_DESCR`) since the generic dispatch algorithm
/// consults that flag on every call (§4.A.2).
pub fn bootstrap(rt: &Runtime) -> PyCoreResult<(TypeHandle, TypeHandle, TypeHandle)> {
    let object_spec = TypeSpec::simple::<crate::builtins::PyBaseObject>("object", "PyBaseObject");
    let object_type = rt.factory_from_spec(object_spec)?;
    rt.registry.set_object_type(object_type.clone());

    let type_spec = TypeSpec {
        name: "type".to_owned(),
        kind: TypeKind::Simple,
        bases: vec![object_type.clone()],
        public_flags: PublicFlags::BASETYPE | PublicFlags::TYPE_SUBCLASS,
        dict: Vec::new(),
        representations: vec![RepresentationSpec {
            host_class: TypeId::of::<PyType>(),
            host_class_name: "PyType",
            kind: RepresentationKind::Canonical,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };
    let type_type = rt.factory_from_spec(type_spec)?;
    rt.registry.set_type_type(type_type.clone());

    object_type.set_metaclass(type_type.clone());
    type_type.set_metaclass(type_type.clone());

    let function_spec = TypeSpec {
        name: "builtin_function_or_method".to_owned(),
        kind: TypeKind::Simple,
        bases: vec![object_type.clone()],
        public_flags: PublicFlags::METHOD_DESCR,
        dict: Vec::new(),
        representations: vec![RepresentationSpec {
            host_class: TypeId::of::<crate::capabilities::NativeFunction>(),
            host_class_name: "NativeFunction",
            kind: RepresentationKind::Canonical,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };
    let function_type = rt.factory_from_spec(function_spec)?;

    // `object` needs a real `__new__`/`__init__` pair so every subclass
    // that doesn't define its own still resolves one along the MRO
    // (§8 scenario S2).
    let new_ctor = crate::exposer::new_method_descriptor("__new__", object_type.clone(), |_args| {
        Ok(Arc::new(crate::builtins::PyBaseObject) as PyObjectRef)
    });
    rt.type_dict_put(&object_type, "__new__", new_ctor)?;

    let init_noop = crate::exposer::method_descriptor(
        "__init__",
        crate::exposer::CallShape::Positional,
        |_args| Ok(crate::builtins::none_singleton()),
    );
    rt.type_dict_put(&object_type, "__init__", init_noop)?;

    Ok((object_type, type_type, function_type))
}

struct ReentrancyGuard<'a>(&'a AtomicUsize);

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn scopeguard(counter: &AtomicUsize) -> ReentrancyGuard<'_> {
    ReentrancyGuard(counter)
}

/// User-defined subclass construction via the `type(name, bases, ns)`
/// three-argument call form (§4.C.4, §4.G): each base class listed
/// contributes its Representation host class and the shared `Instance`
/// slot layout is extended with any names in `ns` that aren't already
/// reachable through a base.
pub fn build_user_subclass(rt: &Runtime, args: &ArgValues) -> PyCoreResult<PyObjectRef> {
    let name = crate::object::downcast_ref::<crate::builtins::PyStr>(&args.args[0])
        .ok_or_else(|| PyCoreError::type_error("type() argument 1 must be str"))?
        .0
        .clone();

    let bases = extract_bases(&args.args[1])?;
    let ns = extract_namespace(&args.args[2])?;

    let mut slot_names: Vec<String> = Vec::new();
    for base in &bases {
        for (k, _) in base.dict_snapshot() {
            if !slot_names.contains(&k) {
                slot_names.push(k);
            }
        }
    }
    for (k, _) in &ns {
        if !slot_names.contains(k) {
            slot_names.push(k.clone());
        }
    }
    let layout = Arc::new(crate::subclass_builder::SlotLayout::new(slot_names));
    let instance_host: TypeId = TypeId::of::<crate::subclass_builder::Instance>();

    let has_explicit_new = ns.iter().any(|(k, _)| k == "__new__");

    let spec = TypeSpec {
        name,
        kind: TypeKind::Replaceable,
        bases: bases.clone(),
        public_flags: PublicFlags::BASETYPE | PublicFlags::MUTABLE,
        dict: ns,
        // Always named, even if a sibling already published this host
        // class — `TypeFactory::from_spec` treats a repeat `Shared` claim
        // as joining the clique rather than a clash.
        representations: vec![RepresentationSpec {
            host_class: instance_host,
            host_class_name: "Instance",
            kind: RepresentationKind::Shared,
        }],
        constructors: Vec::new(),
        metaclass: None,
    };

    let typ = rt.factory_from_spec(spec)?;

    if !has_explicit_new {
        let layout = layout.clone();
        let owner = typ.clone();
        let ctor = Arc::new(crate::capabilities::NativeFunction::new("__new__", move |args| {
            let requested = crate::object::downcast::<PyType>(args.args[0].clone())
                .map_err(|_| PyCoreError::type_error("__new__() arg 1 must be a type"))?;
            let instance = crate::subclass_builder::Instance::new(requested.clone(), layout.clone());
            let _ = &owner;
            Ok(Arc::new(instance) as PyObjectRef)
        }));
        rt.type_dict_put(&typ, "__new__", ctor)?;
    }

    Ok(crate::builtins::type_as_object(typ))
}

fn extract_bases(obj: &PyObjectRef) -> PyCoreResult<Vec<TypeHandle>> {
    crate::object::downcast_ref::<Vec<TypeHandle>>(obj)
        .cloned()
        .ok_or_else(|| PyCoreError::type_error("type() argument 2 must be a tuple of bases"))
}

fn extract_namespace(obj: &PyObjectRef) -> PyCoreResult<Vec<(String, PyObjectRef)>> {
    crate::object::downcast_ref::<AttrDict>(obj)
        .map(|d| d.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .ok_or_else(|| PyCoreError::type_error("type() argument 3 must be a dict namespace"))
}
