//! Storage error types.

use thiserror::Error;

use crate::CategoryId;

/// Errors raised by a [`Backend`](crate::Backend) or by the stores on top of it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite rejected a statement or the connection failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be decoded back into a model.
    #[error("corrupt value in {table}.{column}: {value}")]
    Corrupt {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    /// The backend refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The category still owns items and the delete policy is `Restrict`.
    #[error("category {id} still owns {items} item(s)")]
    CategoryInUse { id: CategoryId, items: usize },

    /// Store configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StorageError {
    pub(crate) fn corrupt(
        table: &'static str,
        column: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::Corrupt {
            table,
            column,
            value: value.into(),
        }
    }
}

/// Result type for store and backend operations.
pub type StoreResult<T> = Result<T, StorageError>;
