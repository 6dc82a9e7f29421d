//! Error types with fix suggestions
//!
//! Error code ranges:
//! - BINDERY-001-009: Missing data (required fields, discriminators)
//! - BINDERY-010-019: Shape errors (wrong node kind for a target)
//! - BINDERY-020-029: Scalar coercion errors
//! - BINDERY-030-039: Registry errors
//! - BINDERY-040-049: Schema / construction errors
//! - BINDERY-050-059: Validation errors (see `errors.rs`)

use thiserror::Error;

use crate::errors::ValidationError;

pub type Result<T> = std::result::Result<T, Error>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Binding errors: anything that stops a document from becoming a typed value.
#[derive(Error, Debug)]
pub enum BindError {
    // ═══════════════════════════════════════════
    // MISSING DATA (001-009)
    // ═══════════════════════════════════════════
    #[error("[BINDERY-001] Missing required field '{path}'")]
    MissingRequiredField { path: String },

    #[error("[BINDERY-002] Missing discriminator key '{key}' for {capability} at '{path}'")]
    MissingDiscriminatorKey {
        key: String,
        capability: String,
        path: String,
    },

    #[error("[BINDERY-003] Unknown discriminator '{name}' for {capability} at '{path}' (available: {})", available.join(", "))]
    UnknownDiscriminator {
        name: String,
        capability: String,
        available: Vec<String>,
        path: String,
    },

    // ═══════════════════════════════════════════
    // SHAPE ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[BINDERY-010] Expected {expected} at '{path}', found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
        path: String,
    },

    #[error("[BINDERY-011] Map type {target} at '{path}' declares {arity} type parameters (expected 2)")]
    InvalidMapArity {
        target: String,
        arity: usize,
        path: String,
    },

    #[error("[BINDERY-012] Invalid value '{value}' at '{path}' (legal values: {})", legal.join(", "))]
    InvalidEnumerationValue {
        value: String,
        legal: Vec<String>,
        path: String,
    },

    #[error("[BINDERY-013] Expected {expected} elements at '{path}', found {found}")]
    ArrayLengthMismatch {
        expected: usize,
        found: usize,
        path: String,
    },

    // ═══════════════════════════════════════════
    // SCALAR COERCION (020-029)
    // ═══════════════════════════════════════════
    #[error("[BINDERY-020] Cannot convert {found} to {target} at '{path}'")]
    UnsupportedConversion {
        found: String,
        target: String,
        path: String,
    },

    #[error("[BINDERY-021] '{value}' is not a valid {target} at '{path}'")]
    InvalidNumber {
        value: String,
        target: String,
        path: String,
    },

    #[error("[BINDERY-022] {value} is out of range for {target} at '{path}'")]
    NumberOutOfRange {
        value: String,
        target: String,
        path: String,
    },

    #[error("[BINDERY-023] Expected a single character at '{path}', got '{value}'")]
    InvalidCharLength { value: String, path: String },

    #[error("[BINDERY-024] '{value}' does not match date format '{format}' at '{path}'")]
    InvalidDate {
        value: String,
        format: &'static str,
        path: String,
    },

    #[error("[BINDERY-025] Custom reader for {target} failed on '{value}' at '{path}': {cause}")]
    CustomReaderFailed {
        value: String,
        target: String,
        path: String,
        #[source]
        cause: anyhow::Error,
    },

    // ═══════════════════════════════════════════
    // REGISTRY ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[BINDERY-030] Duplicate {registry} registration for '{key}'")]
    DuplicateRegistration { registry: &'static str, key: String },

    #[error("[BINDERY-031] No polymorphic registry for {capability}")]
    NoRegistryForCapability { capability: String },

    #[error("[BINDERY-032] Implementation name for {capability} cannot be empty")]
    InvalidImplementationName { capability: String },

    // ═══════════════════════════════════════════
    // SCHEMA / CONSTRUCTION (040-049)
    // ═══════════════════════════════════════════
    #[error("[BINDERY-040] {target} is not a compound type")]
    NotACompoundType { target: String },

    #[error("[BINDERY-041] {record} declares more than one key component: {}", fields.join(", "))]
    MultipleKeyComponents { record: String, fields: Vec<String> },

    #[error("[BINDERY-042] Internal binding error in {record}: {reason}")]
    InternalBinding { record: String, reason: String },
}

impl BindError {
    /// Shorthand for a schema/constructor bug (never caused by document content).
    pub fn internal(record: impl Into<String>, reason: impl Into<String>) -> Self {
        BindError::InternalBinding {
            record: record.into(),
            reason: reason.into(),
        }
    }

    /// Dotted document path the error refers to, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            BindError::MissingRequiredField { path }
            | BindError::MissingDiscriminatorKey { path, .. }
            | BindError::UnknownDiscriminator { path, .. }
            | BindError::TypeMismatch { path, .. }
            | BindError::InvalidMapArity { path, .. }
            | BindError::InvalidEnumerationValue { path, .. }
            | BindError::ArrayLengthMismatch { path, .. }
            | BindError::UnsupportedConversion { path, .. }
            | BindError::InvalidNumber { path, .. }
            | BindError::NumberOutOfRange { path, .. }
            | BindError::InvalidCharLength { path, .. }
            | BindError::InvalidDate { path, .. }
            | BindError::CustomReaderFailed { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl FixSuggestion for BindError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BindError::MissingRequiredField { .. } => {
                Some("Add the field to the document or declare a default for it")
            }
            BindError::MissingDiscriminatorKey { .. } => {
                Some("Add the discriminator key naming the implementation to use")
            }
            BindError::UnknownDiscriminator { .. } => {
                Some("Use one of the available implementation names (case-insensitive)")
            }
            BindError::TypeMismatch { .. } => Some("Check the nesting of this value in the document"),
            BindError::InvalidMapArity { .. } => Some("Map types take exactly a key and a value type"),
            BindError::InvalidEnumerationValue { .. } => Some("Use one of the legal values"),
            BindError::ArrayLengthMismatch { .. } => {
                Some("Provide exactly as many elements as the array declares")
            }
            BindError::UnsupportedConversion { .. } => {
                Some("Register a custom reader for the target type")
            }
            BindError::InvalidNumber { .. } | BindError::NumberOutOfRange { .. } => {
                Some("Check the number fits the declared numeric type")
            }
            BindError::InvalidCharLength { .. } => Some("Provide exactly one character"),
            BindError::InvalidDate { .. } => {
                Some("Use ISO-8601: 2024-01-31 or 2024-01-31T12:30:00")
            }
            BindError::CustomReaderFailed { .. } => Some("Check the value format expected by the reader"),
            BindError::DuplicateRegistration { .. } => {
                Some("Register each type, marker or name only once")
            }
            BindError::NoRegistryForCapability { .. } => {
                Some("Call BinderBuilder::polymorphic for this capability type")
            }
            BindError::InvalidImplementationName { .. } => Some("Use a non-empty implementation name"),
            BindError::NotACompoundType { .. } => Some("Bind compound types only through create_instance"),
            BindError::MultipleKeyComponents { .. } => Some("Mark at most one field with .key()"),
            BindError::InternalBinding { .. } => {
                Some("Make Record::construct consume arguments in schema order with matching types")
            }
        }
    }
}

/// Top-level error returned by the `Binder` entry points
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("[BINDERY-090] YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("[BINDERY-091] JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FixSuggestion for Error {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            Error::Bind(e) => e.fix_suggestion(),
            Error::Validation(e) => e.fix_suggestion(),
            Error::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
            Error::Json(_) => Some("Check JSON syntax"),
        }
    }
}
