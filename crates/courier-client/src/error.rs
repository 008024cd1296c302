use thiserror::Error;

use courier_core::{CryptoError, IdError, InviteError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server's wire error, message verbatim.
    #[error("{message}")]
    Status { code: u16, message: String },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Invite(#[from] InviteError),

    #[error("no expire specified")]
    NoExpire,

    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether this is a wire error with the given status and message.
    pub fn is_status(&self, code: u16, message: &str) -> bool {
        matches!(self, ClientError::Status { code: c, message: m } if *c == code && m == message)
    }
}
