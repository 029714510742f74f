//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum A3cError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// Invalid configuration, detected before any worker starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input of a model does not have the expected shape.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Description of the expected shape.
        expected: String,
        /// Description of the given shape.
        actual: String,
    },

    /// Loss requested for an empty batch.
    #[error("Empty batch")]
    EmptyBatch,

    /// A parameter has no gradient.
    #[error("Missing gradient of parameter {0}")]
    MissingGradient(String),

    /// Optimizer step requested without gradients in the slots.
    #[error("Optimizer step without gradients")]
    EmptyGradientSlot,

    /// A shared lock was poisoned by a panicking thread.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// Workers ended without sending a shutdown message.
    #[error("Workers crashed: {0:?}")]
    WorkerCrashed(Vec<usize>),
}
