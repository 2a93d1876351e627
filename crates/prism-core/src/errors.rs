//! Cross-cutting error types for Prism.
//!
//! Domain-specific errors (e.g., `LakeError`, `LlmError`) are defined in
//! their respective crates; the binary converges them with `anyhow`.

use thiserror::Error;

/// Errors that can be raised by any Prism crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A string could not be parsed into one of the core enums.
    #[error("Invalid {kind}: '{value}'")]
    InvalidEnum { kind: &'static str, value: String },

    /// A frame column was requested that the frame does not carry.
    #[error("Missing column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    /// Data failed validation (schema, format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),
}
