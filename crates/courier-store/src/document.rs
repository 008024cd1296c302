use chrono::{DateTime, Utc};

// A stored document. Bytes are opaque to the store; `created_at` is set on
// first write and `updated_at` advances on every write, so
// created_at <= updated_at always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn created_at_millis(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    pub fn updated_at_millis(&self) -> i64 {
        self.updated_at.timestamp_millis()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub path: String,
}
