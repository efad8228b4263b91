// crates/reflector-codegen/src/errors/mod.rs
//! Code generation errors.
//!
//! Generating a reflector from a well-formed descriptor list does not fail.
//! These errors report malformed descriptors (a caller contract violation)
//! or misuse of an emitter, with structured context for debugging.
//!
//! Error codes: E3xxx.

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

/// The kind of code generation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// A descriptor or emitter input of the wrong shape
    TypeMismatch {
        context: &'static str,
        expected: String,
        found: String,
    },

    /// Method, label or routine not found
    NotFound { kind: &'static str, name: String },

    /// Emitter used out of order or left in an inconsistent state
    InvalidState {
        message: &'static str,
        context: Option<String>,
    },

    /// The method list cannot be keyed by a 32-bit dispatch token
    TooManyMethods { count: usize },
}

/// Code generation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct CodegenError {
    pub kind: CodegenErrorKind,
}

impl CodegenError {
    /// Create a type mismatch error
    pub fn type_mismatch(
        context: &'static str,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        CodegenErrorKind::TypeMismatch {
            context,
            expected: expected.into(),
            found: found.into(),
        }
        .into()
    }

    /// Create a not found error
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        CodegenErrorKind::NotFound {
            kind,
            name: name.into(),
        }
        .into()
    }

    /// Create an invalid state error
    pub fn invalid_state(message: &'static str) -> Self {
        CodegenErrorKind::InvalidState {
            message,
            context: None,
        }
        .into()
    }

    /// Create an invalid state error with context
    pub fn invalid_state_with_context(message: &'static str, context: impl Into<String>) -> Self {
        CodegenErrorKind::InvalidState {
            message,
            context: Some(context.into()),
        }
        .into()
    }

    pub fn too_many_methods(count: usize) -> Self {
        CodegenErrorKind::TooManyMethods { count }.into()
    }
}

impl From<CodegenErrorKind> for CodegenError {
    fn from(kind: CodegenErrorKind) -> Self {
        CodegenError { kind }
    }
}

impl Diagnostic for CodegenError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code: &'static str = match &self.kind {
            CodegenErrorKind::TypeMismatch { .. } => "E3003",
            CodegenErrorKind::NotFound { .. } => "E3004",
            CodegenErrorKind::InvalidState { .. } => "E3005",
            CodegenErrorKind::TooManyMethods { .. } => "E3007",
        };
        Some(Box::new(code))
    }
}

impl fmt::Display for CodegenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenErrorKind::TypeMismatch {
                context,
                expected,
                found,
            } => {
                write!(f, "{}: expected {}, found {}", context, expected, found)
            }
            CodegenErrorKind::NotFound { kind, name } => {
                write!(f, "{} not found: {}", kind, name)
            }
            CodegenErrorKind::InvalidState { message, context } => {
                write!(f, "invalid emitter state: {}", message)?;
                if let Some(ctx) = context {
                    write!(f, " ({})", ctx)?;
                }
                Ok(())
            }
            CodegenErrorKind::TooManyMethods { count } => {
                write!(f, "{} methods exceed the dispatch token range", count)
            }
        }
    }
}

/// Result type alias for codegen operations.
pub type CodegenResult<T> = Result<T, CodegenError>;
