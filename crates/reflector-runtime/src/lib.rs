//! Reflector runtime: the values, types and method resolution that generated
//! dispatch units execute against.

pub mod base;
pub mod class_registry;
pub mod convert;
pub mod fault;
pub mod native_registry;
pub mod runtime;
pub mod types;
pub mod value;

pub use base::{DefaultReflectorBase, FallbackFn, ReflectorBase};
pub use class_registry::{ClassInfo, ClassRegistry};
pub use fault::{Fault, FaultResult};
pub use native_registry::{NativeCall, NativeFn, NativeMethod, NativeRegistry};
pub use runtime::Runtime;
pub use types::{MethodSig, ParamTypes, PrimitiveType, TypeRef, well_known};
pub use value::{Instance, ObjectRef, Primitive, Slot, Value};
