// crates/reflector-runtime/src/native_registry.rs
//! Registry for host methods callable from generated dispatch code.

use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::fault::{Fault, FaultResult};
use crate::types::MethodSig;
use crate::value::{Primitive, Slot, Value};

/// Arguments of one native call, already coerced to the declared parameter types.
pub struct NativeCall<'a> {
    pub receiver: Option<&'a Value>,
    pub args: &'a [Slot],
}

impl<'a> NativeCall<'a> {
    pub fn arg(&self, index: usize) -> FaultResult<&'a Slot> {
        self.args.get(index).ok_or_else(|| Fault::IndexOutOfBounds {
            index: index as i32,
            length: self.args.len(),
        })
    }

    pub fn primitive(&self, index: usize) -> FaultResult<Primitive> {
        self.arg(index)?
            .as_primitive()
            .ok_or_else(|| Fault::host(format!("argument {} is not a primitive", index)))
    }

    pub fn int(&self, index: usize) -> FaultResult<i32> {
        match self.primitive(index)? {
            Primitive::Int(v) => Ok(v),
            other => Err(Fault::host(format!(
                "argument {} is {}, not int",
                index,
                other.ty()
            ))),
        }
    }

    pub fn long(&self, index: usize) -> FaultResult<i64> {
        match self.primitive(index)? {
            Primitive::Long(v) => Ok(v),
            other => Err(Fault::host(format!(
                "argument {} is {}, not long",
                index,
                other.ty()
            ))),
        }
    }

    pub fn value(&self, index: usize) -> FaultResult<&'a Value> {
        self.arg(index)?
            .as_ref_value()
            .ok_or_else(|| Fault::host(format!("argument {} is not a reference", index)))
    }

    pub fn str(&self, index: usize) -> FaultResult<&'a str> {
        let value = self.value(index)?;
        value
            .as_str()
            .ok_or_else(|| Fault::invalid_cast(value.describe_class(), "String"))
    }

    pub fn receiver(&self) -> FaultResult<&'a Value> {
        self.receiver
            .ok_or_else(|| Fault::host("native method called without a receiver"))
    }

    pub fn receiver_str(&self) -> FaultResult<&'a str> {
        let receiver = self.receiver()?;
        receiver
            .as_str()
            .ok_or_else(|| Fault::invalid_cast(receiver.describe_class(), "String"))
    }
}

pub type NativeFn = Rc<dyn Fn(&NativeCall<'_>) -> FaultResult<Slot>>;

/// A registered host method.
#[derive(Clone)]
pub struct NativeMethod {
    pub owner: Arc<str>,
    pub name: Arc<str>,
    pub sig: MethodSig,
    pub is_static: bool,
    body: NativeFn,
}

impl NativeMethod {
    /// Run the body. Void methods yield `None` whatever the body returned;
    /// primitive returns must match the declared primitive kind.
    pub fn call(&self, receiver: Option<&Value>, args: &[Slot]) -> FaultResult<Option<Slot>> {
        tracing::trace!(owner = %self.owner, name = %self.name, "native call");
        let result = (self.body)(&NativeCall { receiver, args })?;
        if self.sig.returns_void() {
            return Ok(None);
        }
        let matches = match (&result, self.sig.ret.as_primitive()) {
            (Slot::Prim(p), Some(expected)) => p.ty() == expected,
            (Slot::Ref(_), None) => true,
            _ => false,
        };
        if !matches {
            return Err(Fault::ReturnMismatch {
                method: format!("{}.{}", self.owner, self.name),
                expected: self.sig.ret.to_string(),
                found: describe_slot(&result),
            });
        }
        Ok(Some(result))
    }
}

impl fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMethod")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("sig", &self.sig)
            .field("is_static", &self.is_static)
            .finish()
    }
}

pub(crate) fn describe_slot(slot: &Slot) -> String {
    match slot {
        Slot::Prim(p) => p.ty().to_string(),
        Slot::Ref(v) => v.describe_class(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodKey {
    owner: String,
    name: String,
    descriptor: String,
}

impl MethodKey {
    fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

/// Host methods keyed by owner class, name and descriptor.
#[derive(Debug, Default)]
pub struct NativeRegistry {
    methods: FxHashMap<MethodKey, NativeMethod>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_static<F>(&mut self, owner: &str, name: &str, sig: MethodSig, body: F)
    where
        F: Fn(&NativeCall<'_>) -> FaultResult<Slot> + 'static,
    {
        self.register(owner, name, sig, true, Rc::new(body));
    }

    pub fn register_instance<F>(&mut self, owner: &str, name: &str, sig: MethodSig, body: F)
    where
        F: Fn(&NativeCall<'_>) -> FaultResult<Slot> + 'static,
    {
        self.register(owner, name, sig, false, Rc::new(body));
    }

    fn register(&mut self, owner: &str, name: &str, sig: MethodSig, is_static: bool, body: NativeFn) {
        let key = MethodKey::new(owner, name, &sig.descriptor());
        let method = NativeMethod {
            owner: Arc::from(owner),
            name: Arc::from(name),
            sig,
            is_static,
            body,
        };
        self.methods.insert(key, method);
    }

    pub fn get(&self, owner: &str, name: &str, descriptor: &str) -> Option<&NativeMethod> {
        self.methods.get(&MethodKey::new(owner, name, descriptor))
    }

    /// An instance (non-static) method declared directly on `owner`.
    pub fn instance_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<&NativeMethod> {
        self.get(owner, name, descriptor).filter(|m| !m.is_static)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRef;

    #[test]
    fn register_and_lookup() {
        let mut registry = NativeRegistry::new();
        registry.register_static("Math", "answer", MethodSig::new([], TypeRef::int()), |_| {
            Ok(Slot::int(42))
        });

        let method = registry.get("Math", "answer", "()I").unwrap();
        assert!(method.is_static);
        assert_eq!(method.call(None, &[]), Ok(Some(Slot::int(42))));
        assert!(registry.instance_method("Math", "answer", "()I").is_none());
        assert!(registry.get("Math", "answer", "()J").is_none());
    }

    #[test]
    fn void_methods_discard_results() {
        let mut registry = NativeRegistry::new();
        registry.register_static("Log", "emit", MethodSig::nullary_void(), |_| {
            Ok(Slot::int(7))
        });
        let method = registry.get("Log", "emit", "()V").unwrap();
        assert_eq!(method.call(None, &[]), Ok(None));
    }

    #[test]
    fn primitive_return_kind_is_checked() {
        let mut registry = NativeRegistry::new();
        registry.register_static("Bad", "count", MethodSig::new([], TypeRef::int()), |_| {
            Ok(Slot::Ref(Value::Int(1)))
        });
        let method = registry.get("Bad", "count", "()I").unwrap();
        assert!(matches!(
            method.call(None, &[]),
            Err(Fault::ReturnMismatch { .. })
        ));
    }

    #[test]
    fn call_accessors() {
        let receiver = Value::str("abc");
        let args = [Slot::int(3), Slot::Ref(Value::str("x"))];
        let call = NativeCall {
            receiver: Some(&receiver),
            args: &args,
        };
        assert_eq!(call.receiver_str(), Ok("abc"));
        assert_eq!(call.int(0), Ok(3));
        assert_eq!(call.str(1), Ok("x"));
        assert!(call.long(0).is_err());
        assert!(matches!(
            call.arg(5),
            Err(Fault::IndexOutOfBounds { index: 5, .. })
        ));
    }
}
