//! Storage errors

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for archivefever_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => archivefever_core::Error::NotFound(what),
            other => archivefever_core::Error::Storage(other.to_string()),
        }
    }
}
