//! Error types for netvis

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Rank mismatch for {what}: expected {expected} dimensions, got shape {got:?}")]
    RankMismatch {
        what: &'static str,
        expected: usize,
        got: Vec<usize>,
    },

    #[error("Label {label} out of range for {num_classes} classes")]
    LabelOutOfRange { label: usize, num_classes: usize },

    #[error("Length mismatch for {what}: expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Layer index {layer} out of range ({available} feature maps available)")]
    LayerOutOfRange { layer: usize, available: usize },

    #[error("Backward operation failed: {0}")]
    BackwardFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] crate::config::ValidationError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, Error>;
