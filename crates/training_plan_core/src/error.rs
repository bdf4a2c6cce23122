//! crates/training_plan_core/src/error.rs
//!
//! Error taxonomy for a plan generation cycle.

use crate::ports::PortError;
use std::fmt;

/// The category of a schedule decoding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The text is not a JSON document.
    Malformed,
    /// A required key is absent.
    MissingField,
    /// A value has the wrong JSON type.
    TypeMismatch,
    /// A value is `null` where one is required, or lies outside its allowed set.
    InvalidValue,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DecodeErrorKind::Malformed => "malformed document",
            DecodeErrorKind::MissingField => "missing field",
            DecodeErrorKind::TypeMismatch => "type mismatch",
            DecodeErrorKind::InvalidValue => "invalid value",
        };
        f.write_str(label)
    }
}

/// A classified schedule decoding failure, pointing at the offending path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at `{path}`: {message}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    /// e.g. `weeks[1].days[3].workouts[0].intensity`; empty for the document root.
    pub path: String,
    pub message: String,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The primary error type for a generation cycle.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The workout history could not be fetched.
    #[error("Failed to fetch workout history: {0}")]
    DataAcquisition(PortError),

    /// The model weights are unavailable or failed to load.
    #[error("Failed to load model: {0}")]
    ModelLoad(PortError),

    /// Inference failed mid-way (tokenizer, backend, out of memory, ...).
    #[error("Generation failed: {0}")]
    Generation(PortError),

    /// The model output is not a valid schedule.
    #[error("Failed to decode schedule: {0}")]
    Decoding(#[from] DecodeError),
}
