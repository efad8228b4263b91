// crates/reflector-codegen/src/descriptor.rs
//
// Method descriptors: what the generator knows about each method it routes
// to, plus the dispatch token it assigns.

use reflector_runtime::{MethodSig, ParamTypes, TypeRef};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Integer identity of a method within one generated dispatcher.
///
/// Tokens start at 1; 0 is never assigned and means "no token".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchToken(NonZeroU32);

impl DispatchToken {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(DispatchToken)
    }

    /// The token for the method at `position` in its list, if representable
    /// as a switch key.
    pub fn for_position(position: usize) -> Option<Self> {
        let value = u32::try_from(position.checked_add(1)?).ok()?;
        if value > i32::MAX as u32 {
            return None;
        }
        Self::new(value)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// The token as a switch key. Construction keeps tokens within `i32`.
    pub fn key(self) -> i32 {
        self.0.get() as i32
    }
}

impl fmt::Display for DispatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a thunk calls its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// No receiver, call on the declaring type.
    Static,
    /// Receiver call dispatched through the declaring class.
    Virtual,
    /// Receiver call dispatched through the declared interface.
    Interface,
}

/// One invocable method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: Arc<str>,
    pub declaring_type: TypeRef,
    /// When present, the call goes through this interface instead of `declaring_type`.
    pub interface_type: Option<TypeRef>,
    pub return_type: TypeRef,
    pub parameter_types: ParamTypes,
    pub is_static: bool,
    dispatch_token: Option<DispatchToken>,
}

impl MethodDescriptor {
    pub fn new(
        declaring_type: TypeRef,
        name: impl AsRef<str>,
        parameter_types: impl IntoIterator<Item = TypeRef>,
        return_type: TypeRef,
        is_static: bool,
    ) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            declaring_type,
            interface_type: None,
            return_type,
            parameter_types: parameter_types.into_iter().collect(),
            is_static,
            dispatch_token: None,
        }
    }

    /// An instance method declared on `declaring_class`.
    pub fn instance(
        declaring_class: &str,
        name: impl AsRef<str>,
        parameter_types: impl IntoIterator<Item = TypeRef>,
        return_type: TypeRef,
    ) -> Self {
        Self::new(
            TypeRef::class(declaring_class),
            name,
            parameter_types,
            return_type,
            false,
        )
    }

    /// A static method declared on `declaring_class`.
    pub fn static_method(
        declaring_class: &str,
        name: impl AsRef<str>,
        parameter_types: impl IntoIterator<Item = TypeRef>,
        return_type: TypeRef,
    ) -> Self {
        Self::new(
            TypeRef::class(declaring_class),
            name,
            parameter_types,
            return_type,
            true,
        )
    }

    /// Route calls through `interface` instead of the declaring class.
    pub fn via_interface(mut self, interface: &str) -> Self {
        self.interface_type = Some(TypeRef::class(interface));
        self
    }

    pub fn dispatch_token(&self) -> Option<DispatchToken> {
        self.dispatch_token
    }

    pub(crate) fn set_dispatch_token(&mut self, token: DispatchToken) {
        self.dispatch_token = Some(token);
    }

    /// The switch key callers pass for this method; 0 when no token was assigned.
    pub fn dispatch_key(&self) -> i32 {
        self.dispatch_token.map_or(0, DispatchToken::key)
    }

    /// An interface type wins over the static flag.
    pub fn call_shape(&self) -> CallShape {
        if self.interface_type.is_some() {
            CallShape::Interface
        } else if self.is_static {
            CallShape::Static
        } else {
            CallShape::Virtual
        }
    }

    /// The type the call is made on: the interface when present, else the declaring type.
    pub fn call_target(&self) -> &TypeRef {
        self.interface_type.as_ref().unwrap_or(&self.declaring_type)
    }

    pub fn signature(&self) -> MethodSig {
        MethodSig {
            params: self.parameter_types.clone(),
            ret: self.return_type.clone(),
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            f.write_str("static ")?;
        }
        write!(f, "{}.{}{}", self.declaring_type, self.name, self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_one_based() {
        assert_eq!(DispatchToken::for_position(0).map(DispatchToken::get), Some(1));
        assert_eq!(DispatchToken::for_position(41).map(DispatchToken::key), Some(42));
        assert_eq!(DispatchToken::new(0), None);
        assert_eq!(DispatchToken::for_position(i32::MAX as usize), None);
    }

    #[test]
    fn call_shapes() {
        let virt = MethodDescriptor::instance("String", "len", [], TypeRef::int());
        let stat = MethodDescriptor::static_method("Integer", "parse", [TypeRef::string()], TypeRef::int());
        let iface = MethodDescriptor::instance("ArrayList", "size", [], TypeRef::int()).via_interface("List");

        assert_eq!(virt.call_shape(), CallShape::Virtual);
        assert_eq!(stat.call_shape(), CallShape::Static);
        assert_eq!(iface.call_shape(), CallShape::Interface);
        assert_eq!(iface.call_target(), &TypeRef::class("List"));
        assert_eq!(virt.call_target(), &TypeRef::class("String"));
    }

    #[test]
    fn interface_wins_over_static_flag() {
        let odd = MethodDescriptor::static_method("Impl", "run", [], TypeRef::Void).via_interface("Task");
        assert_eq!(odd.call_shape(), CallShape::Interface);
    }

    #[test]
    fn unassigned_key_is_zero() {
        let mut m = MethodDescriptor::instance("String", "len", [], TypeRef::int());
        assert_eq!(m.dispatch_key(), 0);
        m.set_dispatch_token(DispatchToken::new(3).unwrap());
        assert_eq!(m.dispatch_key(), 3);
    }

    #[test]
    fn display() {
        let m = MethodDescriptor::static_method("Integer", "parse", [TypeRef::string()], TypeRef::int());
        assert_eq!(m.to_string(), "static Integer.parse(String) -> int");
    }
}
