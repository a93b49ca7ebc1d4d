//! Error types for Tabula.

use tabula_core::{CoreError, QueueError};

use crate::config::ConfigError;
use crate::live_list::ApplyError;

/// Result type alias for Tabula operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the list pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transition did not fit the live list.
    #[error("Failed to apply transition: {0}")]
    Apply(#[from] ApplyError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A core queue or cancellation error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<QueueError> for Error {
    fn from(err: QueueError) -> Self {
        Self::Core(err.into())
    }
}
