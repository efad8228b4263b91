// crates/reflector-codegen/src/emitter.rs
//
// The code emission capability the generator drives. The generator only
// sequences these operations; encoding them is the emitter's business.

use reflector_runtime::{MethodSig, PrimitiveType, TypeRef};

use crate::errors::CodegenResult;

/// Local slots shared by the entry point and every per-method routine,
/// all of which have the `(token, receiver, arguments)` dispatch signature.
pub mod locals {
    /// The dispatcher unit itself.
    pub const THIS: u16 = 0;
    pub const TOKEN: u16 = 1;
    pub const RECEIVER: u16 = 2;
    pub const ARGUMENTS: u16 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Public,
    Private,
}

impl Access {
    pub fn keyword(self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// No receiver.
    Static,
    /// Receiver call selected by the receiver's class.
    Virtual,
    /// Receiver call through an interface type.
    Interface,
    /// Receiver call bound to exactly the named owner (own routines, base initializer).
    Special,
}

impl CallKind {
    pub fn has_receiver(self) -> bool {
        !matches!(self, CallKind::Static)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            CallKind::Static => "invokestatic",
            CallKind::Virtual => "invokevirtual",
            CallKind::Interface => "invokeinterface",
            CallKind::Special => "invokespecial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Void,
    Reference,
}

/// Sink for one generated compilation unit.
///
/// Calls must nest: `begin_unit`, then any number of
/// `begin_method ... end_method` groups, then `finish_unit`.
pub trait CodeEmitter {
    type Label: Copy + Eq + std::fmt::Debug;
    type Output;

    /// Start the unit `name`, extending the base contract `base`.
    fn begin_unit(&mut self, name: &str, base: &str) -> CodegenResult<()>;

    fn begin_method(&mut self, access: Access, name: &str, sig: &MethodSig) -> CodegenResult<()>;

    fn new_label(&mut self) -> Self::Label;

    /// Bind `label` to the next emitted instruction.
    fn place_label(&mut self, label: Self::Label) -> CodegenResult<()>;

    /// Push the local in `slot` (see [`locals`]).
    fn load_local(&mut self, slot: u16) -> CodegenResult<()>;

    fn push_int(&mut self, value: i32) -> CodegenResult<()>;

    fn push_null(&mut self) -> CodegenResult<()>;

    /// Pop an index and an array, push the element.
    fn array_load(&mut self) -> CodegenResult<()>;

    /// Convert the boxed value on top of the stack to the primitive `ty`.
    fn unbox(&mut self, ty: PrimitiveType) -> CodegenResult<()>;

    /// Narrow the reference on top of the stack to `ty`.
    fn check_cast(&mut self, ty: &TypeRef) -> CodegenResult<()>;

    /// Pop the receiver (unless static) and the arguments, call, and push the
    /// result unless `sig` returns void.
    fn invoke(&mut self, kind: CallKind, owner: &str, name: &str, sig: &MethodSig) -> CodegenResult<()>;

    /// Convert the primitive `ty` on top of the stack to its boxed form.
    fn box_value(&mut self, ty: PrimitiveType) -> CodegenResult<()>;

    fn ret(&mut self, kind: ReturnKind) -> CodegenResult<()>;

    /// Pop an int key and jump to the case whose key equals it, else to `default`.
    fn lookup_switch(&mut self, default: Self::Label, cases: &[(i32, Self::Label)]) -> CodegenResult<()>;

    /// Pop an int key and jump to `targets[key - low]`, or `default` when out of range.
    fn table_switch(&mut self, low: i32, default: Self::Label, targets: &[Self::Label]) -> CodegenResult<()>;

    fn end_method(&mut self) -> CodegenResult<()>;

    fn finish_unit(self) -> CodegenResult<Self::Output>;
}

/// Emit the narrowing a declared type needs: unbox for primitives, a cast for
/// references other than the root class. Casting to the root class cannot
/// fail, so nothing is emitted for it.
pub fn emit_coercion<E: CodeEmitter>(emitter: &mut E, ty: &TypeRef) -> CodegenResult<()> {
    match ty {
        TypeRef::Primitive(p) => emitter.unbox(*p),
        _ if ty.is_object() => Ok(()),
        TypeRef::Class(_) | TypeRef::Array(_) => emitter.check_cast(ty),
        TypeRef::Void => Err(crate::errors::CodegenError::type_mismatch(
            "coercion target",
            "a value type",
            "void",
        )),
    }
}
