use thiserror::Error;

/// Failures surfaced by the analysis and composition core.
///
/// Everything but `Backend` is a precondition violation detected at the offending call.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The image-composition collaborator failed (device loss, readback failure, ...).
    #[error("composition backend failed: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SweepError>;

impl SweepError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SweepError::Configuration(msg.into())
    }
}
