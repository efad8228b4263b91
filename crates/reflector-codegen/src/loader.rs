// crates/reflector-codegen/src/loader.rs
//
// Links a `CompiledUnit` against a runtime and a base contract, and executes
// its routines on an operand stack.

use reflector_runtime::base::{INIT, INVOKE, NO_SUCH_METHOD};
use reflector_runtime::convert::{box_primitive, check_cast, unbox};
use reflector_runtime::{
    Fault, FaultResult, Instance, MethodSig, Primitive, ReflectorBase, Runtime, Slot, Value,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::rc::Rc;
use thiserror::Error;

use crate::bytecode::{CallSite, CompiledMethod, CompiledUnit, Op, UnitBuilder};
use crate::descriptor::MethodDescriptor;
use crate::emitter::{Access, CallKind};
use crate::errors::CodegenError;
use crate::generator::{GeneratorOptions, ReflectorGenerator};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("unit {unit} extends {found}, but the base contract is {expected}")]
    BaseMismatch {
        unit: String,
        expected: String,
        found: String,
    },

    #[error("unit {unit} has no public routine {name}{descriptor}")]
    MissingRoutine {
        unit: String,
        name: String,
        descriptor: String,
    },

    /// A call on the unit or its base that names no routine either provides.
    #[error("{routine} calls {owner}.{name}{descriptor}, which is not defined")]
    UnresolvedCall {
        routine: String,
        owner: String,
        name: String,
        descriptor: String,
    },

    #[error("initializer failed: {0}")]
    Init(#[from] Fault),
}

/// Where a call on the unit itself or its base lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Routine(usize),
    BaseInit,
    BaseFallback,
}

type Stack = SmallVec<[Slot; 8]>;

/// A dispatcher unit ready to answer `invoke` calls.
pub struct LoadedReflector {
    unit: CompiledUnit,
    runtime: Rc<Runtime>,
    base: Box<dyn ReflectorBase>,
    this: Value,
    entry: usize,
    /// Self-call links keyed by (routine, op index). Calls not listed go to the runtime.
    links: FxHashMap<(usize, usize), Link>,
}

impl std::fmt::Debug for LoadedReflector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedReflector")
            .field("unit", &self.unit.name)
            .field("routines", &self.unit.methods.len())
            .finish_non_exhaustive()
    }
}

impl LoadedReflector {
    /// Generate a unit for `methods` with the bytecode emitter and load it.
    pub fn compile(
        unit_name: &str,
        methods: &mut [MethodDescriptor],
        options: GeneratorOptions,
        runtime: Rc<Runtime>,
        base: Box<dyn ReflectorBase>,
    ) -> Result<Self, LoadError> {
        let generated =
            ReflectorGenerator::with_options(methods, options).generate(UnitBuilder::new(), unit_name)?;
        Self::load(generated.output, runtime, base)
    }

    /// Link `unit` and run its initializer.
    pub fn load(
        unit: CompiledUnit,
        runtime: Rc<Runtime>,
        base: Box<dyn ReflectorBase>,
    ) -> Result<Self, LoadError> {
        let _span = tracing::debug_span!("load_reflector", unit = %unit.name).entered();

        if *unit.base != *base.contract_name() {
            return Err(LoadError::BaseMismatch {
                unit: unit.name.to_string(),
                expected: base.contract_name().to_string(),
                found: unit.base.to_string(),
            });
        }
        let init = required_routine(&unit, INIT, &MethodSig::nullary_void())?;
        let entry = required_routine(&unit, INVOKE, &MethodSig::dispatch())?;
        let links = link(&unit)?;

        let this = Value::object(Instance::new(&*unit.name));
        let loaded = Self {
            unit,
            runtime,
            base,
            this,
            entry,
            links,
        };
        loaded.run(init, &[Slot::Ref(loaded.this.clone())])?;
        tracing::debug!(routines = loaded.unit.methods.len(), "reflector loaded");
        Ok(loaded)
    }

    pub fn unit(&self) -> &CompiledUnit {
        &self.unit
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Run the entry point for `token`.
    pub fn invoke(&self, token: i32, receiver: Value, arguments: Value) -> FaultResult<Value> {
        tracing::trace!(token, receiver = %receiver.describe_class(), "invoke");
        let frame = [
            Slot::Ref(self.this.clone()),
            Slot::int(token),
            Slot::Ref(receiver),
            Slot::Ref(arguments),
        ];
        match self.run(self.entry, &frame)? {
            Some(Slot::Ref(value)) => Ok(value),
            other => Err(Fault::internal(format!(
                "{} produced {:?} instead of a reference",
                INVOKE, other
            ))),
        }
    }

    /// Invoke `method` through the token written into it. A descriptor that
    /// never had a token assigned reaches the fallback with token 0.
    pub fn invoke_method(
        &self,
        method: &MethodDescriptor,
        receiver: Value,
        arguments: Value,
    ) -> FaultResult<Value> {
        self.invoke(method.dispatch_key(), receiver, arguments)
    }

    fn run(&self, routine: usize, frame: &[Slot]) -> FaultResult<Option<Slot>> {
        let method = &self.unit.methods[routine];
        let mut stack = Stack::with_capacity(method.max_stack as usize);
        let mut pc = 0;
        loop {
            let op = method.code.get(pc).ok_or_else(|| {
                Fault::internal(format!("{} runs past its last instruction", method.name))
            })?;
            let at = pc;
            pc += 1;
            match op {
                Op::LoadLocal(slot) => {
                    let local = frame.get(*slot as usize).cloned().ok_or_else(|| {
                        Fault::internal(format!("{}: no local {}", method.name, slot))
                    })?;
                    stack.push(local);
                }
                Op::PushInt(value) => stack.push(Slot::int(*value)),
                Op::PushNull => stack.push(Slot::null()),
                Op::ArrayLoad => {
                    let index = pop_int(&mut stack, method)?;
                    let array = pop_ref(&mut stack, method)?;
                    stack.push(Slot::Ref(element(&array, index)?));
                }
                Op::Unbox(ty) => {
                    let value = pop_ref(&mut stack, method)?;
                    stack.push(Slot::Prim(unbox(&value, *ty)?));
                }
                Op::CheckCast(ty) => {
                    let value = pop_ref(&mut stack, method)?;
                    check_cast(self.runtime.classes(), &value, ty)?;
                    stack.push(Slot::Ref(value));
                }
                Op::Box(ty) => {
                    let p = pop_prim(&mut stack, method)?;
                    if p.ty() != *ty {
                        return Err(Fault::internal(format!(
                            "{}: box {} applied to {}",
                            method.name,
                            ty,
                            p.ty()
                        )));
                    }
                    stack.push(Slot::Ref(box_primitive(p)));
                }
                Op::Return => return pop_ref(&mut stack, method).map(|v| Some(Slot::Ref(v))),
                Op::ReturnVoid => return Ok(None),
                Op::LookupSwitch { default, cases } => {
                    let key = pop_int(&mut stack, method)?;
                    pc = match cases.binary_search_by_key(&key, |(k, _)| *k) {
                        Ok(i) => cases[i].1,
                        Err(_) => *default,
                    };
                }
                Op::TableSwitch {
                    low,
                    default,
                    targets,
                } => {
                    let key = pop_int(&mut stack, method)?;
                    pc = usize::try_from(key as i64 - *low as i64)
                        .ok()
                        .and_then(|offset| targets.get(offset))
                        .copied()
                        .unwrap_or(*default);
                }
                Op::Invoke(site) => {
                    let argc = site.sig.params.len();
                    if stack.len() < argc {
                        return Err(Fault::internal(format!(
                            "{}: {} needs {} argument(s)",
                            method.name, site.name, argc
                        )));
                    }
                    let args: SmallVec<[Slot; 4]> = stack.drain(stack.len() - argc..).collect();
                    let receiver = if site.kind.has_receiver() {
                        Some(pop_ref(&mut stack, method)?)
                    } else {
                        None
                    };
                    let result = match self.links.get(&(routine, at)) {
                        Some(link) => self.call_linked(*link, receiver, &args)?,
                        None => self.call_runtime(site, receiver.as_ref(), &args)?,
                    };
                    match result {
                        _ if site.sig.returns_void() => {}
                        Some(slot) => stack.push(slot),
                        None => {
                            return Err(Fault::internal(format!(
                                "{}.{} returned nothing",
                                site.owner, site.name
                            )));
                        }
                    }
                }
            }
        }
    }

    fn call_linked(
        &self,
        link: Link,
        receiver: Option<Value>,
        args: &[Slot],
    ) -> FaultResult<Option<Slot>> {
        match link {
            Link::Routine(index) => {
                let receiver = receiver
                    .ok_or_else(|| Fault::internal("routine call without a receiver"))?;
                let mut frame: SmallVec<[Slot; 4]> = SmallVec::with_capacity(args.len() + 1);
                frame.push(Slot::Ref(receiver));
                frame.extend(args.iter().cloned());
                self.run(index, &frame)
            }
            Link::BaseInit => self.base.init().map(|()| None),
            Link::BaseFallback => {
                let token = args.first().and_then(Slot::as_int).ok_or_else(|| {
                    Fault::internal(format!("{} without an int token", NO_SUCH_METHOD))
                })?;
                let reference = |i: usize| {
                    args.get(i).and_then(Slot::as_ref_value).ok_or_else(|| {
                        Fault::internal(format!(
                            "{} argument {} is not a reference",
                            NO_SUCH_METHOD, i
                        ))
                    })
                };
                let (receiver, arguments) = (reference(1)?, reference(2)?);
                tracing::trace!(token, "dispatch fallback");
                self.base
                    .no_such_method(token, receiver, arguments)
                    .map(|v| Some(Slot::Ref(v)))
            }
        }
    }

    fn call_runtime(
        &self,
        site: &CallSite,
        receiver: Option<&Value>,
        args: &[Slot],
    ) -> FaultResult<Option<Slot>> {
        let rt = &self.runtime;
        match (site.kind, receiver) {
            (CallKind::Static, _) => rt.invoke_static(&site.owner, &site.name, &site.sig, args),
            (CallKind::Virtual, Some(recv)) => {
                rt.invoke_virtual(&site.owner, &site.name, &site.sig, recv, args)
            }
            (CallKind::Interface, Some(recv)) => {
                rt.invoke_interface(&site.owner, &site.name, &site.sig, recv, args)
            }
            _ => Err(Fault::internal(format!(
                "unlinked {} {}.{}",
                site.kind.mnemonic(),
                site.owner,
                site.name
            ))),
        }
    }
}

fn required_routine(unit: &CompiledUnit, name: &str, sig: &MethodSig) -> Result<usize, LoadError> {
    let descriptor = sig.descriptor();
    unit.method_index(name, &descriptor)
        .filter(|&i| unit.methods[i].access == Access::Public)
        .ok_or_else(|| LoadError::MissingRoutine {
            unit: unit.name.to_string(),
            name: name.to_string(),
            descriptor,
        })
}

/// Resolve the calls a unit makes on itself: special calls to its own
/// routines or its base, and the virtual fallback call on the unit or base.
///
/// Special calls must resolve here; nothing else in the runtime answers them.
/// Every other static, virtual or interface call goes to the runtime, even when
/// its owner shares the unit's name.
fn link(unit: &CompiledUnit) -> Result<FxHashMap<(usize, usize), Link>, LoadError> {
    let init = MethodSig::nullary_void().descriptor();
    let dispatch = MethodSig::dispatch().descriptor();
    let inherited = |site: &CallSite| match (&*site.name, &*site.descriptor) {
        (INIT, d) if d == init && site.kind == CallKind::Special => Some(Link::BaseInit),
        (NO_SUCH_METHOD, d) if d == dispatch => Some(Link::BaseFallback),
        _ => None,
    };
    let mut links = FxHashMap::default();

    for (routine, method) in unit.methods.iter().enumerate() {
        for (at, op) in method.code.iter().enumerate() {
            let Op::Invoke(site) = op else { continue };
            let own = *site.owner == *unit.name;
            let on_base = own || *site.owner == *unit.base;
            let resolved = match site.kind {
                CallKind::Special => {
                    let local = if own {
                        unit.method_index(&site.name, &site.descriptor).map(Link::Routine)
                    } else {
                        None
                    };
                    local
                        .or_else(|| if on_base { inherited(site) } else { None })
                        .ok_or_else(|| unresolved(method, site))?
                }
                CallKind::Virtual if on_base && inherited(site) == Some(Link::BaseFallback) => {
                    Link::BaseFallback
                }
                _ => continue,
            };
            links.insert((routine, at), resolved);
        }
    }
    Ok(links)
}

fn unresolved(method: &CompiledMethod, site: &CallSite) -> LoadError {
    LoadError::UnresolvedCall {
        routine: method.name.to_string(),
        owner: site.owner.to_string(),
        name: site.name.to_string(),
        descriptor: site.descriptor.to_string(),
    }
}

fn element(array: &Value, index: i32) -> FaultResult<Value> {
    if array.is_null() {
        return Err(Fault::null_pointer("cannot load from a null argument array"));
    }
    let items = array
        .as_array()
        .ok_or_else(|| Fault::invalid_cast(array.describe_class(), "Object[]"))?;
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or(Fault::IndexOutOfBounds {
            index,
            length: items.len(),
        })
}

fn pop(stack: &mut Stack, method: &CompiledMethod) -> FaultResult<Slot> {
    stack
        .pop()
        .ok_or_else(|| Fault::internal(format!("{}: operand stack underflow", method.name)))
}

fn pop_ref(stack: &mut Stack, method: &CompiledMethod) -> FaultResult<Value> {
    match pop(stack, method)? {
        Slot::Ref(value) => Ok(value),
        Slot::Prim(p) => Err(Fault::internal(format!(
            "{}: expected a reference, found {}",
            method.name,
            p.ty()
        ))),
    }
}

fn pop_prim(stack: &mut Stack, method: &CompiledMethod) -> FaultResult<Primitive> {
    match pop(stack, method)? {
        Slot::Prim(p) => Ok(p),
        Slot::Ref(value) => Err(Fault::internal(format!(
            "{}: expected a primitive, found {}",
            method.name,
            value.describe_class()
        ))),
    }
}

fn pop_int(stack: &mut Stack, method: &CompiledMethod) -> FaultResult<i32> {
    match pop_prim(stack, method)? {
        Primitive::Int(v) => Ok(v),
        other => Err(Fault::internal(format!(
            "{}: expected int, found {}",
            method.name,
            other.ty()
        ))),
    }
}
