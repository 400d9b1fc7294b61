use thiserror::Error;

/// Errors returned by a [`Storage`](crate::Storage) backend.
///
/// [`StoreError::NotFound`] is kept apart from every other failure so callers can tell a
/// missing object from a broken disk.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object {folder}/{name} not found")]
    NotFound { folder: String, name: String },

    #[error("invalid object name: {0:?}")]
    InvalidName(String),

    #[error("storage closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
