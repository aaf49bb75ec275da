use thiserror::Error;

/// Errors that can occur in the repository layer.
///
/// Lock conflicts are not errors: lock-gated operations report them through
/// [`crate::OperationResult`] so the host can show the message to the user.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Not implemented: {0}")]
    Unimplemented(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Map an I/O error with context, keeping `NotFound` distinguishable.
    pub fn from_io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(format!("{}: {}", context, err))
        } else {
            StoreError::Io(format!("{}: {}", context, err))
        }
    }

    /// Whether this error means the target file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
