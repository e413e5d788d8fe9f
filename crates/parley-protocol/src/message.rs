use chrono::{DateTime, Utc};
use parley_core::Result;
use serde::{Deserialize, Serialize};

/// Broadcast payload.
/// Wire: `{ "id": 42, "type": "text", "content": "hi", "contentType": "text/plain", "creator": "u1", "createdAt": 1718000000000 }`
///
/// Absent optional fields are omitted. Sent to clients as a binary frame
/// holding the UTF-8 JSON text.
///
/// `id` is a snowflake and goes out as a bare JSON number. Values exceed
/// 2^53, so JavaScript's `JSON.parse` rounds them and ids minted in the same
/// millisecond can compare equal on the client. Browser clients that need
/// the exact id should parse with a BigInt-aware reviver, e.g.
/// `JSON.parse(text, (k, v, ctx) => k === "id" ? BigInt(ctx.source) : v)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// New message stamped with the current time.
    pub fn new(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            kind: None,
            content: content.into(),
            content_type: None,
            creator: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// UTF-8 JSON bytes for the outbound binary frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
