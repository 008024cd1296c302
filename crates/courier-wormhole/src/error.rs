use thiserror::Error;

use courier_client::ClientError;
use courier_core::Id;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum WormholeError {
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("closed")]
    Closed,

    #[error("would block")]
    WouldBlock,

    #[error("not connected")]
    NotConnected,

    #[error("not found {0}")]
    NotFound(Id),

    #[error("no identity in keystore")]
    NoIdentity,

    #[error("invite not found")]
    InviteNotFound,

    #[error("codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
