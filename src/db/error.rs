//! Storage error taxonomy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection, schema, write or I/O failure. Callers on the hit path log
    /// and drop it.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] sqlx::Error),

    /// A fixed query no longer matches what the database returns.
    #[error("malformed query: {0}")]
    MalformedQuery(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::TypeNotFound { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::Encode(_)
            | sqlx::Error::RowNotFound => StoreError::MalformedQuery(err),
            other => StoreError::StorageUnavailable(other),
        }
    }
}
