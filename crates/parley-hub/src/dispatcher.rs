use bytes::Bytes;
use parley_protocol::{ChatMessage, DeliveryReport};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::connection::{Connection, Frame};
use crate::registry::ConnectionRegistry;

/// Fans messages out over registry snapshots.
///
/// Holds no state of its own beyond the registry handle. A failed send on
/// one connection is logged and counted, never propagated, and never evicts
/// the connection; eviction belongs to the transport's close path.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Serialize once, then send a binary frame to every open connection.
    pub fn broadcast(&self, message: &ChatMessage) -> DeliveryReport {
        let bytes = match message.encode() {
            Ok(b) => Bytes::from(b),
            Err(e) => {
                error!(message_id = message.id, error = %e, "chat message serialization failed");
                return DeliveryReport::default();
            }
        };

        let report = deliver(self.registry.all(), &Frame::Binary(bytes));
        debug!(
            message_id = message.id,
            attempted = report.attempted,
            failed = report.failed,
            skipped = report.skipped,
            "broadcast"
        );
        report
    }

    /// Raw text frame to every connection of one identity; no-op if it has none.
    pub fn send_to_identity(&self, identity: &str, payload: &str) -> DeliveryReport {
        let connections = self.registry.for_identity(identity);
        if connections.is_empty() {
            debug!(identity, "no connections for identity");
            return DeliveryReport::default();
        }

        let report = deliver(connections, &Frame::Text(payload.to_string()));
        debug!(
            identity,
            attempted = report.attempted,
            failed = report.failed,
            "unicast"
        );
        report
    }

    /// [`send_to_identity`](Self::send_to_identity) for each distinct
    /// identity; repeats in the list are sent once.
    pub fn send_to_identities<I, S>(&self, identities: I, payload: &str) -> DeliveryReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut total = DeliveryReport::default();
        for identity in identities {
            let identity = identity.as_ref();
            if !seen.insert(identity.to_string()) {
                continue;
            }
            total += self.send_to_identity(identity, payload);
        }
        total
    }
}

fn deliver(connections: Vec<Connection>, frame: &Frame) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for conn in connections {
        if !conn.is_open() {
            report.skipped += 1;
            continue;
        }
        report.attempted += 1;
        match conn.send(frame.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    token = %conn.token(),
                    conn_id = %conn.conn_id(),
                    error = %e,
                    "delivery failed"
                );
            }
        }
    }
    report
}
