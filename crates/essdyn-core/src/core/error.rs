use thiserror::Error;

#[derive(Debug, Error)]
pub enum DynamicsError {
    #[error("Dimension mismatch: expected {expected} elements, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Frame index {index} out of range ({len} frames stored)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{0} requires at least one frame")]
    EmptyInput(&'static str),

    #[error(
        "Estimated memory requirement of {required_bytes} bytes exceeds the {available_bytes} bytes available"
    )]
    InsufficientMemory {
        required_bytes: u64,
        available_bytes: u64,
    },

    #[error("{resource} has been released and can no longer be used")]
    UseAfterFree { resource: &'static str },

    #[error("Spill storage failure: {source}")]
    StorageIo {
        #[from]
        source: std::io::Error,
    },

    #[error("Total mass must be positive, got {total}")]
    NonPositiveMass { total: f64 },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
