//! Local error types shared by the converter and the controller

use thiserror::Error;

use crate::schema::TypeError;

/// Configuration rejected before any remote call is made
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{kind}: exactly one of [{}] must be configured, none was", expected.join(", "))]
    MissingVariant { kind: String, expected: Vec<String> },

    #[error("{kind}: only one of [{}] may be configured, found {}", expected.join(", "), found.join(", "))]
    ConflictingVariants {
        kind: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("{kind}: '{block}' is not a known variant")]
    UnknownVariant { kind: String, block: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Invalid configuration: {}", join_type_errors(.0))]
    Schema(Vec<TypeError>),

    #[error("{kind}: cannot update a record that has no identifier")]
    MissingIdentifier { kind: String },
}

fn join_type_errors(errors: &[TypeError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A remote record could not be mapped back onto its model
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: cannot convert remote record: {message}")]
pub struct ConversionError {
    pub kind: String,
    pub message: String,
}

impl ConversionError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn unknown_discriminator(kind: impl Into<String>, discriminator: &str) -> Self {
        Self::new(kind, format!("unknown variant '{}'", discriminator))
    }
}
