// crates/reflector-runtime/src/fault.rs
//
// Faults raised while executing generated dispatch code. None of these are
// caught by the dispatcher; they leave `invoke` exactly as raised.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    /// An argument position beyond the end of the argument array.
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i32, length: usize },

    /// A value whose runtime class cannot be coerced to the required type.
    #[error("cannot cast {from} to {to}")]
    InvalidCast { from: String, to: String },

    #[error("null pointer: {context}")]
    NullPointer { context: String },

    /// A call target that no registered method satisfies.
    #[error("no such method: {owner}.{name}{descriptor}")]
    NoSuchMethodError {
        owner: String,
        name: String,
        descriptor: String,
    },

    #[error("incompatible class change: {message}")]
    IncompatibleClassChange { message: String },

    /// Raised by the default fallback handler for an unmatched dispatch token.
    #[error("no method for dispatch token {token} on receiver of class {receiver_class}")]
    NoSuchMethod { token: i32, receiver_class: String },

    /// A native body returned a value that does not match its declared return type.
    #[error("{method} declared to return {expected}, but returned {found}")]
    ReturnMismatch {
        method: String,
        expected: String,
        found: String,
    },

    /// Raised by a native method body.
    #[error("{0}")]
    Host(String),

    /// Malformed generated code (stack underflow, primitive where a reference belongs, ...).
    #[error("internal fault: {0}")]
    Internal(String),
}

impl Fault {
    pub fn invalid_cast(from: impl Into<String>, to: impl Into<String>) -> Self {
        Fault::InvalidCast {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn null_pointer(context: impl Into<String>) -> Self {
        Fault::NullPointer {
            context: context.into(),
        }
    }

    pub fn no_such_method_error(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Fault::NoSuchMethodError {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    pub fn host(message: impl Into<String>) -> Self {
        Fault::Host(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Fault::Internal(message.into())
    }
}

pub type FaultResult<T> = Result<T, Fault>;
