// crates/reflector-runtime/src/base.rs
//
// The base dispatcher contract every generated reflector unit extends: a
// no-argument initializer and the fallback for unmatched dispatch tokens.

use crate::fault::{Fault, FaultResult};
use crate::value::Value;

/// Class name of the base contract.
pub const REFLECTOR_CLASS: &str = "Reflector";
/// Name of initializer routines.
pub const INIT: &str = "<init>";
/// Name of the dispatch entry point.
pub const INVOKE: &str = "invoke";
/// Name of the base contract's fallback routine.
pub const NO_SUCH_METHOD: &str = "noSuchMethod";

/// Host side of the base contract.
pub trait ReflectorBase {
    /// Class name generated units must extend to link against this base.
    fn contract_name(&self) -> &str {
        REFLECTOR_CLASS
    }

    /// Runs once when a generated unit is constructed.
    fn init(&self) -> FaultResult<()> {
        Ok(())
    }

    /// Answers a call whose token matched no generated branch.
    fn no_such_method(&self, token: i32, receiver: &Value, arguments: &Value) -> FaultResult<Value>;
}

/// Rejects every unmatched token with [`Fault::NoSuchMethod`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultReflectorBase;

impl ReflectorBase for DefaultReflectorBase {
    fn no_such_method(&self, token: i32, receiver: &Value, _arguments: &Value) -> FaultResult<Value> {
        Err(Fault::NoSuchMethod {
            token,
            receiver_class: receiver.describe_class(),
        })
    }
}

/// Adapts a closure into a base whose fallback calls it.
pub struct FallbackFn<F>(pub F);

impl<F> ReflectorBase for FallbackFn<F>
where
    F: Fn(i32, &Value, &Value) -> FaultResult<Value>,
{
    fn no_such_method(&self, token: i32, receiver: &Value, arguments: &Value) -> FaultResult<Value> {
        (self.0)(token, receiver, arguments)
    }
}
