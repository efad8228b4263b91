// crates/reflector-runtime/src/runtime.rs
//
// Method resolution and invocation for the three call shapes generated code
// uses: static, virtual (on a class) and interface.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::class_registry::ClassRegistry;
use crate::fault::{Fault, FaultResult};
use crate::native_registry::{NativeMethod, NativeRegistry, describe_slot};
use crate::types::{MethodSig, TypeRef};
use crate::value::{Slot, Value};

/// The class hierarchy plus the host methods defined on it.
#[derive(Debug, Default)]
pub struct Runtime {
    classes: ClassRegistry,
    natives: NativeRegistry,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn classes_mut(&mut self) -> &mut ClassRegistry {
        &mut self.classes
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn natives_mut(&mut self) -> &mut NativeRegistry {
        &mut self.natives
    }

    /// Call a static method declared on `owner` (or inherited from a superclass).
    pub fn invoke_static(
        &self,
        owner: &str,
        name: &str,
        sig: &MethodSig,
        args: &[Slot],
    ) -> FaultResult<Option<Slot>> {
        let descriptor = sig.descriptor();
        let method = self
            .classes
            .superclass_chain(owner)
            .find_map(|class| self.natives.get(class, name, &descriptor))
            .ok_or_else(|| Fault::no_such_method_error(owner, name, &descriptor))?;
        if !method.is_static {
            return Err(Fault::IncompatibleClassChange {
                message: format!("expected static method {}.{}{}", owner, name, descriptor),
            });
        }
        self.call(method, None, args)
    }

    /// Call an instance method through a class-typed reference. The method must
    /// be resolvable from `owner`; the receiver's most specific override runs.
    pub fn invoke_virtual(
        &self,
        owner: &str,
        name: &str,
        sig: &MethodSig,
        receiver: &Value,
        args: &[Slot],
    ) -> FaultResult<Option<Slot>> {
        let descriptor = sig.descriptor();
        let receiver_class = receiver_class(receiver, owner, name)?;
        let declared = self
            .classes
            .superclass_chain(owner)
            .find_map(|class| self.natives.instance_method(class, name, &descriptor))
            .or_else(|| self.find_in_interfaces(owner, name, &descriptor))
            .ok_or_else(|| Fault::no_such_method_error(owner, name, &descriptor))?;
        let method = self.select(receiver_class, name, &descriptor).unwrap_or(declared);
        self.call(method, Some(receiver), args)
    }

    /// Call an instance method through an interface-typed reference.
    pub fn invoke_interface(
        &self,
        interface: &str,
        name: &str,
        sig: &MethodSig,
        receiver: &Value,
        args: &[Slot],
    ) -> FaultResult<Option<Slot>> {
        let descriptor = sig.descriptor();
        let receiver_class = receiver_class(receiver, interface, name)?;
        if !self.classes.is_subtype(receiver_class, interface) {
            return Err(Fault::IncompatibleClassChange {
                message: format!(
                    "class {} does not implement interface {}",
                    receiver_class, interface
                ),
            });
        }
        let declared = self
            .find_in_interfaces(interface, name, &descriptor)
            .ok_or_else(|| Fault::no_such_method_error(interface, name, &descriptor))?;
        let method = self.select(receiver_class, name, &descriptor).unwrap_or(declared);
        self.call(method, Some(receiver), args)
    }

    /// The receiver class's own implementation, walking up its superclasses.
    fn select(&self, receiver_class: &str, name: &str, descriptor: &str) -> Option<&NativeMethod> {
        self.classes
            .superclass_chain(receiver_class)
            .find_map(|class| self.natives.instance_method(class, name, descriptor))
    }

    /// Breadth-first search of `start` and every interface reachable from it.
    fn find_in_interfaces(&self, start: &str, name: &str, descriptor: &str) -> Option<&NativeMethod> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut queue: SmallVec<[&str; 8]> = SmallVec::new();
        queue.push(start);
        let mut next = 0;
        while next < queue.len() {
            let current = queue[next];
            next += 1;
            if !seen.insert(current) {
                continue;
            }
            if self.classes.is_interface(current) {
                if let Some(method) = self.natives.instance_method(current, name, descriptor) {
                    return Some(method);
                }
            }
            if let Some(info) = self.classes.get(current) {
                if let Some(parent) = info.superclass.as_deref() {
                    queue.push(parent);
                }
                queue.extend(info.interfaces.iter().map(|i| &**i));
            }
        }
        None
    }

    fn call(
        &self,
        method: &NativeMethod,
        receiver: Option<&Value>,
        args: &[Slot],
    ) -> FaultResult<Option<Slot>> {
        check_arguments(method, args)?;
        let result = method.call(receiver, args)?;
        if let Some(Slot::Ref(value)) = &result {
            if !self.classes.is_instance(value, &method.sig.ret) {
                return Err(Fault::ReturnMismatch {
                    method: format!("{}.{}", method.owner, method.name),
                    expected: method.sig.ret.to_string(),
                    found: value.describe_class(),
                });
            }
        }
        Ok(result)
    }
}

fn receiver_class<'v>(receiver: &'v Value, owner: &str, name: &str) -> FaultResult<&'v str> {
    receiver
        .runtime_class()
        .ok_or_else(|| Fault::null_pointer(format!("cannot invoke {}.{} on null", owner, name)))
}

/// Generated code coerces every argument before the call; a mismatch here
/// means the emitted sequence is wrong, not that the caller passed bad data.
fn check_arguments(method: &NativeMethod, args: &[Slot]) -> FaultResult<()> {
    if args.len() != method.sig.params.len() {
        return Err(Fault::internal(format!(
            "{}.{} takes {} argument(s), got {}",
            method.owner,
            method.name,
            method.sig.params.len(),
            args.len()
        )));
    }
    for (i, (slot, param)) in args.iter().zip(&method.sig.params).enumerate() {
        let ok = match (slot, param) {
            (Slot::Prim(p), TypeRef::Primitive(expected)) => p.ty() == *expected,
            (Slot::Ref(_), TypeRef::Class(_) | TypeRef::Array(_)) => true,
            _ => false,
        };
        if !ok {
            return Err(Fault::internal(format!(
                "argument {} of {}.{}: expected {}, found {}",
                i,
                method.owner,
                method.name,
                param,
                describe_slot(slot)
            )));
        }
    }
    Ok(())
}
