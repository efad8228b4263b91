//! Dispatch-table compiler.
//!
//! Given an ordered list of [`MethodDescriptor`]s, [`ReflectorGenerator`]
//! emits a dispatcher unit whose `invoke(token, receiver, arguments)` entry
//! point routes each token to a private routine that unpacks the arguments,
//! calls the described method and boxes its result. Unmatched tokens go to the
//! base contract's `noSuchMethod`.
//!
//! Emission goes through the [`CodeEmitter`] trait. [`UnitBuilder`] is the
//! bundled emitter, and [`LoadedReflector`] executes what it builds.

pub mod bytecode;
pub mod descriptor;
pub mod dispatch_table;
pub mod emitter;
pub mod errors;
pub mod generator;
pub mod index;
pub mod loader;
pub mod thunk;

pub use bytecode::{CompiledMethod, CompiledUnit, Op, UnitBuilder};
pub use descriptor::{CallShape, DispatchToken, MethodDescriptor};
pub use dispatch_table::SwitchStrategy;
pub use emitter::{Access, CallKind, CodeEmitter, ReturnKind, locals};
pub use errors::{CodegenError, CodegenErrorKind, CodegenResult};
pub use generator::{GeneratedUnit, GeneratorOptions, ReflectorGenerator};
pub use index::{DispatchEntry, DispatchIndex, assign_tokens};
pub use loader::{LoadError, LoadedReflector};
