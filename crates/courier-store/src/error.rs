use thiserror::Error;

use courier_core::PathError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("path error: {0}")]
    Path(#[from] PathError),

    #[error("change references missing document: {0}")]
    ReferenceMissing(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("store error: {0}")]
    Internal(String),
}
