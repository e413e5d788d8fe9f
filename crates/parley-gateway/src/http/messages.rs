//! Server-initiated delivery: unicast, multicast and broadcast over HTTP.
//!
//! Every route answers 200 with the delivery counters. Per-connection
//! failures show up in the counters, never as an HTTP error.

use axum::{
    extract::{Path, State},
    Json,
};
use parley_protocol::api::{BroadcastRequest, MulticastRequest, UnicastRequest};
use parley_protocol::DeliveryReport;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;

/// POST /api/identities/{identity}/messages
pub async fn unicast(
    State(state): State<Arc<AppState>>,
    Path(identity): Path<String>,
    Json(req): Json<UnicastRequest>,
) -> Json<DeliveryReport> {
    let report = state.hub.dispatcher().send_to_identity(&identity, &req.payload);
    info!(
        identity = %identity,
        attempted = report.attempted,
        failed = report.failed,
        "unicast"
    );
    Json(report)
}

/// POST /api/messages
pub async fn multicast(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MulticastRequest>,
) -> Json<DeliveryReport> {
    let report = state
        .hub
        .dispatcher()
        .send_to_identities(&req.identities, &req.payload);
    info!(
        identities = req.identities.len(),
        attempted = report.attempted,
        failed = report.failed,
        "multicast"
    );
    Json(report)
}

/// POST /api/broadcast. The server assigns the id and timestamp.
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BroadcastRequest>,
) -> Json<Value> {
    let mut message = state.hub.message(req.content);
    message.kind = req.kind;
    message.content_type = req.content_type;
    message.creator = req.creator;

    let report = state.hub.dispatcher().broadcast(&message);
    info!(
        message_id = message.id,
        attempted = report.attempted,
        failed = report.failed,
        "broadcast"
    );
    Json(json!({ "id": message.id, "delivery": report }))
}
