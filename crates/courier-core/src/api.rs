use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::Id;

// Wire types spoken between the exchange server and its clients. Binary
// fields travel base64 inside JSON.

pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    #[serde(with = "b64")]
    pub data: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Document timestamps in milliseconds since epoch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub kid: Id,
    pub messages: Vec<Message>,
    /// Cursor for the next listing, a numeric string.
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Metadata>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigchainResponse {
    pub kid: Id,
    pub statements: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteResponse {
    pub sender: Id,
    pub recipient: Id,
}

/// Listing direction for change-feed cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub error: WireErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireErrorDetail {
    pub code: u16,
    pub message: String,
}

impl WireError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            error: WireErrorDetail {
                code,
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn test_message_json_shape() {
        let msg = Message {
            id: "abc".to_string(),
            data: b"hi".to_vec(),
            path: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"id":"abc","data":"aGk="}"#);

        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.data, b"hi");
    }

    #[test]
    fn test_wire_error_shape() {
        let err = WireError::new(401, "missing Authorization header");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(
            json,
            r#"{"error":{"code":401,"message":"missing Authorization header"}}"#
        );
    }

    #[test]
    fn test_messages_response_omits_empty_metadata() {
        let resp = MessagesResponse {
            kid: Identity::from_seed(&[1u8; 32]).id(),
            messages: vec![],
            version: "0".to_string(),
            metadata: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn test_direction_param() {
        assert_eq!(Direction::from_param("asc"), Some(Direction::Asc));
        assert_eq!(Direction::from_param("desc"), Some(Direction::Desc));
        assert_eq!(Direction::from_param("up"), None);
    }
}
