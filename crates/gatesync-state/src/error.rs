//! Error types for the gatesync state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot open state store: {0}")]
    Open(String),

    /// Transaction, table or I/O failure inside redb.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("cannot encode record: {0}")]
    Encode(String),

    /// A stored value no longer parses as its record type.
    #[error("corrupt record {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("command {0} already exists")]
    DuplicateCommand(String),
}
