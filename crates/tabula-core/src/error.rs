//! Error types for Tabula core.

use std::fmt;

/// The main error type for Tabula core operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A queue refused a task.
    Queue(QueueError),
    /// The operation observed a cancelled token and stopped early.
    Cancelled,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue(err) => write!(f, "Queue error: {err}"),
            Self::Cancelled => write!(f, "Operation was cancelled"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Queue(err) => Some(err),
            Self::Cancelled => None,
        }
    }
}

/// Queue-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue has been stopped and no longer accepts tasks.
    Stopped,
    /// The queue's bounded capacity is exhausted.
    Full,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Queue has been stopped"),
            Self::Full => write!(f, "Queue is full"),
        }
    }
}

impl std::error::Error for QueueError {}

impl From<QueueError> for CoreError {
    fn from(err: QueueError) -> Self {
        Self::Queue(err)
    }
}

/// A specialized Result type for Tabula core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
