use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_core::rand_id::frame_id;
use courier_core::Id;

use crate::error::WormholeError;

/// New wormhole message id (16 chars base62).
pub fn new_id() -> String {
    frame_id()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Utf8,
    Binary,
}

/// What a call to `read_message`/`write_message` yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Local record of a sent message awaiting the peer's ack.
    Pending,
    /// The peer observed delivery of the identified message.
    Ack,
    Utf8,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub typ: MessageType,
    pub content: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// What actually travels on the datagram channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Frame {
    Raw(Vec<u8>),
    Msg {
        id: String,
        from: Id,
        content_type: ContentType,
        content: Vec<u8>,
        ts: i64,
    },
    Ack {
        id: String,
    },
    Close,
}

impl Frame {
    pub fn to_bytes(&self) -> Result<Vec<u8>, WormholeError> {
        bincode::serialize(self).map_err(|e| WormholeError::Codec(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, WormholeError> {
        bincode::deserialize(data).map_err(|e| WormholeError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Identity;

    #[test]
    fn test_frame_roundtrip() {
        let alice = Identity::from_seed(&[1u8; 32]);
        let frames = vec![
            Frame::Raw(b"ping".to_vec()),
            Frame::Msg {
                id: new_id(),
                from: alice.id(),
                content_type: ContentType::Utf8,
                content: b"hello".to_vec(),
                ts: 1_234_567_890_000,
            },
            Frame::Ack { id: new_id() },
            Frame::Close,
        ];

        for frame in frames {
            let bytes = frame.to_bytes().unwrap();
            let restored = Frame::from_bytes(&bytes).unwrap();
            assert_eq!(bytes, restored.to_bytes().unwrap());
        }
    }

    #[test]
    fn test_frame_rejects_garbage() {
        assert!(Frame::from_bytes(&[0xFF; 3]).is_err());
    }

    #[test]
    fn test_new_id_len() {
        assert_eq!(new_id().len(), 16);
    }
}
