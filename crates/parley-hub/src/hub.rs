use parley_core::config::ParleyConfig;
use parley_core::sequence::SequenceGenerator;
use parley_core::types::{Identity, SessionToken};
use parley_protocol::{ChatMessage, DeliveryReport};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::connection::{Connection, Outbound};
use crate::dispatcher::Dispatcher;
use crate::registry::ConnectionRegistry;

/// Entry point for transport lifecycle events.
///
/// The transport calls `open` / `receive` / `close` / `error` from each
/// connection's own task and keeps only the returned [`Connection`] handle;
/// all shared bookkeeping goes through the registry.
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Dispatcher,
    ids: SequenceGenerator,
}

impl Hub {
    pub fn new(ids: SequenceGenerator) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&registry)),
            registry,
            ids,
        }
    }

    pub fn from_config(config: &ParleyConfig) -> parley_core::Result<Self> {
        Ok(Self::new(SequenceGenerator::new(config.sequence.worker_id)?))
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Register a freshly accepted connection under its resolved identity.
    pub fn open(
        &self,
        token: SessionToken,
        identity: Identity,
        outbound: Arc<dyn Outbound>,
    ) -> Connection {
        let connection = Connection::new(token, identity, outbound);
        self.registry.register(connection.clone());
        connection
    }

    /// Inbound text: wrap it in a chat message and broadcast to everyone,
    /// the sender included. Content is not inspected.
    pub fn receive(&self, connection: &Connection, text: &str) -> DeliveryReport {
        let message = self.message(text);
        info!(
            token = %connection.token(),
            message_id = message.id,
            len = text.len(),
            "message received"
        );
        debug!(content = %text, "message content");
        self.dispatcher.broadcast(&message)
    }

    /// Transport close: drop this connection's registration.
    pub fn close(&self, connection: &Connection) -> bool {
        self.registry.release(connection)
    }

    /// Transport error. Logged only; the close that follows evicts.
    pub fn error(&self, connection: &Connection, err: &dyn fmt::Display) {
        error!(
            token = %connection.token(),
            identity = %connection.identity(),
            conn_id = %connection.conn_id(),
            error = %err,
            "connection error"
        );
    }

    /// New chat message with the next id and the current time.
    pub fn message(&self, content: impl Into<String>) -> ChatMessage {
        ChatMessage::new(self.ids.next_id(), content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ChannelOutbound, Frame};

    fn hub() -> Hub {
        Hub::new(SequenceGenerator::new(1).unwrap())
    }

    fn decode(frame: Frame) -> ChatMessage {
        match frame {
            Frame::Binary(bytes) => serde_json::from_slice(&bytes).unwrap(),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inbound_text_is_broadcast_to_all() {
        let hub = hub();
        let (out_a, mut rx_a) = ChannelOutbound::channel();
        let (out_b, mut rx_b) = ChannelOutbound::channel();
        let a = hub.open("a".into(), "u1".into(), Arc::new(out_a));
        hub.open("b".into(), "u2".into(), Arc::new(out_b));

        let report = hub.receive(&a, "hello there");
        assert_eq!(report.delivered, 2);

        let to_a = decode(rx_a.recv().await.unwrap());
        let to_b = decode(rx_b.recv().await.unwrap());
        assert_eq!(to_a.content, "hello there");
        assert_eq!(to_a, to_b);
        assert!(to_a.kind.is_none());
        assert!(to_a.creator.is_none());
    }

    #[tokio::test]
    async fn message_ids_increase() {
        let hub = hub();
        let (out, mut rx) = ChannelOutbound::channel();
        let conn = hub.open("a".into(), "u1".into(), Arc::new(out));

        hub.receive(&conn, "one");
        hub.receive(&conn, "two");
        let first = decode(rx.recv().await.unwrap());
        let second = decode(rx.recv().await.unwrap());
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn closed_receiver_skips_and_close_evicts() {
        let hub = hub();
        let (out_a, rx_a) = ChannelOutbound::channel();
        let (out_b, mut rx_b) = ChannelOutbound::channel();
        let a = hub.open("a".into(), "u1".into(), Arc::new(out_a));
        let b = hub.open("b".into(), "u1".into(), Arc::new(out_b));

        // writer task for `a` has gone away but close has not arrived yet
        drop(rx_a);
        let report = hub.dispatcher().send_to_identity("u1", "hi");
        assert_eq!(report.skipped, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(rx_b.recv().await, Some(Frame::Text("hi".into())));

        hub.error(&a, &"broken pipe");
        assert_eq!(hub.registry().len(), 2);

        assert!(hub.close(&a));
        assert!(!hub.close(&a));
        assert_eq!(hub.registry().for_identity("u1").len(), 1);
        assert!(hub.close(&b));
        assert!(hub.registry().is_empty());
    }

    #[test]
    fn from_config_rejects_bad_worker_id() {
        let mut config = ParleyConfig::default();
        config.sequence.worker_id = 4096;
        assert!(Hub::from_config(&config).is_err());
    }
}
