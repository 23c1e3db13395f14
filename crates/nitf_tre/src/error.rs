//! Error types that can be emitted from this library

use derive_more::Display;
use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
///
/// Every structured variant carries a message and a `context` describing where the failure
/// happened, usually the TRE tag plus the resolved field name or schema position.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    #[diagnostic(code(nitf_tre::io))]
    Io(#[from] std::io::Error),

    /// A caller supplied an argument the operation cannot use
    #[error("{message} ({context})")]
    #[diagnostic(code(nitf_tre::invalid_parameter))]
    InvalidParameter { message: String, context: String },

    /// An object is not in a usable state
    #[error("{message} ({context})")]
    #[diagnostic(code(nitf_tre::invalid_object))]
    InvalidObject { message: String, context: String },

    /// A schema reference did not match any field at any loop depth
    #[error("unable to resolve {name} ({context})")]
    #[diagnostic(
        code(nitf_tre::unresolved_reference),
        help("fields referenced by loops, conditions and lengths must be decoded before they are used")
    )]
    UnresolvedReference { name: String, context: String },

    /// The schema itself cannot be walked
    #[error("{message} ({context})")]
    #[diagnostic(code(nitf_tre::malformed_schema))]
    MalformedSchema { message: String, context: String },

    /// Division or modulo by zero, or an overflowing adjustment
    #[error("{message} ({context})")]
    #[diagnostic(code(nitf_tre::arithmetic_fault))]
    ArithmeticFault { message: String, context: String },

    /// A field was used in a way its encoding does not allow
    #[error("{message} ({context})")]
    #[diagnostic(code(nitf_tre::type_mismatch))]
    TypeMismatch { message: String, context: String },

    /// Stored data and the schema disagree on a length
    #[error("{name} holds {actual} bytes, expected {expected} ({context})")]
    #[diagnostic(code(nitf_tre::length_mismatch))]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
        context: String,
    },

    /// No layout of a schema set applies
    #[error("no schema matches {tag}: {message} ({context})")]
    #[diagnostic(code(nitf_tre::no_matching_schema))]
    NoMatchingSchema {
        tag: String,
        message: String,
        context: String,
    },

    /// Loops are nested deeper than the cursor supports
    #[error("loops nested deeper than {limit} ({context})")]
    #[diagnostic(code(nitf_tre::nesting_too_deep))]
    NestingTooDeep { limit: usize, context: String },

    /// A buffer could not be reserved
    #[error("unable to allocate {size} bytes: {message} ({context})")]
    #[diagnostic(code(nitf_tre::allocation_failure))]
    AllocationFailure {
        size: usize,
        message: String,
        context: String,
    },
}

/// The coarse classification of an [`Error`]
#[derive(Display, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    InvalidParameter,
    InvalidObject,
    UnresolvedReference,
    MalformedSchema,
    ArithmeticFault,
    TypeMismatch,
    LengthMismatch,
    NoMatchingSchema,
    NestingTooDeep,
    AllocationFailure,
}

impl Error {
    /// Returns the category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Io(_) => ErrorCategory::Io,
            Error::InvalidParameter { .. } => ErrorCategory::InvalidParameter,
            Error::InvalidObject { .. } => ErrorCategory::InvalidObject,
            Error::UnresolvedReference { .. } => ErrorCategory::UnresolvedReference,
            Error::MalformedSchema { .. } => ErrorCategory::MalformedSchema,
            Error::ArithmeticFault { .. } => ErrorCategory::ArithmeticFault,
            Error::TypeMismatch { .. } => ErrorCategory::TypeMismatch,
            Error::LengthMismatch { .. } => ErrorCategory::LengthMismatch,
            Error::NoMatchingSchema { .. } => ErrorCategory::NoMatchingSchema,
            Error::NestingTooDeep { .. } => ErrorCategory::NestingTooDeep,
            Error::AllocationFailure { .. } => ErrorCategory::AllocationFailure,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>, context: impl Into<String>) -> Self {
        Error::MalformedSchema {
            message: message.into(),
            context: context.into(),
        }
    }

    pub(crate) fn unresolved(name: impl Into<String>, context: impl Into<String>) -> Self {
        Error::UnresolvedReference {
            name: name.into(),
            context: context.into(),
        }
    }

    pub(crate) fn arithmetic(message: impl Into<String>, context: impl Into<String>) -> Self {
        Error::ArithmeticFault {
            message: message.into(),
            context: context.into(),
        }
    }

    pub(crate) fn type_mismatch(message: impl Into<String>, context: impl Into<String>) -> Self {
        Error::TypeMismatch {
            message: message.into(),
            context: context.into(),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
