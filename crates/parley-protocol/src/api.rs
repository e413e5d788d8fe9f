//! HTTP request bodies for server-initiated delivery.

use parley_core::types::Identity;
use serde::{Deserialize, Serialize};

/// `POST /api/identities/{identity}/messages`
/// Wire: `{ "payload": "hello" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnicastRequest {
    pub payload: String,
}

/// `POST /api/messages`
/// Wire: `{ "identities": ["u1", "u2"], "payload": "hello" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MulticastRequest {
    pub identities: Vec<Identity>,
    pub payload: String,
}

/// `POST /api/broadcast`. The server assigns `id` and `createdAt`.
/// Wire: `{ "content": "hi", "type": "notice", "contentType": "text/plain", "creator": "ops" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
}
