//! Model-layer error type.

/// Errors from the store adapter and the search composer.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;
