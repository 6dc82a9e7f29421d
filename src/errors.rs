//! Validation error types
//!
//! Raised only by the validator, after a value has been fully bound.
//! Binding problems live in `error.rs`.

use thiserror::Error;

use crate::error::FixSuggestion;

/// Constraint kinds, in the order the validator applies them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Min,
    Max,
    Pattern,
    NonEmpty,
    Size,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::Min => write!(f, "min"),
            ConstraintKind::Max => write!(f, "max"),
            ConstraintKind::Pattern => write!(f, "pattern"),
            ConstraintKind::NonEmpty => write!(f, "non-empty"),
            ConstraintKind::Size => write!(f, "size"),
        }
    }
}

/// A single validation failure with context
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("[BINDERY-050] Validation failed at '{path}': {message}")]
    ValidationFailed { message: String, path: String },

    #[error("[BINDERY-051] {constraint} constraint at '{path}' needs a numeric value, found {found}")]
    NonNumericConstraintTarget {
        constraint: ConstraintKind,
        found: &'static str,
        path: String,
    },

    #[error("[BINDERY-052] {constraint} constraint at '{path}' needs a string, collection or map, found {found}")]
    UnsizedConstraintTarget {
        constraint: ConstraintKind,
        found: &'static str,
        path: String,
    },

    #[error("[BINDERY-053] Capability {capability} at '{path}' cannot be both inline and keyed by discriminator")]
    InvalidPolymorphicDeclaration { capability: String, path: String },
}

impl ValidationError {
    pub fn path(&self) -> &str {
        match self {
            ValidationError::ValidationFailed { path, .. }
            | ValidationError::NonNumericConstraintTarget { path, .. }
            | ValidationError::UnsizedConstraintTarget { path, .. }
            | ValidationError::InvalidPolymorphicDeclaration { path, .. } => path,
        }
    }
}

impl FixSuggestion for ValidationError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ValidationError::ValidationFailed { .. } => Some("Change the value to satisfy the constraint"),
            ValidationError::NonNumericConstraintTarget { .. } => {
                Some("Only attach min/max to numeric fields")
            }
            ValidationError::UnsizedConstraintTarget { .. } => {
                Some("Only attach size/non_empty to strings, collections or maps")
            }
            ValidationError::InvalidPolymorphicDeclaration { .. } => {
                Some("Declare the capability either inline or key_as_discriminator, not both")
            }
        }
    }
}
