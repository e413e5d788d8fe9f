use bytes::Bytes;
use parley_core::types::{ConnId, Identity, SessionToken};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::DeliveryError;

/// One outbound WebSocket frame, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Targeted payloads, sent raw with no envelope.
    Text(String),
    /// Broadcast payloads: UTF-8 JSON of a chat message.
    Binary(Bytes),
    /// Close handshake. The writer sends it last and stops draining.
    Close { code: u16, reason: String },
}

/// Write side of one live channel.
///
/// Both methods must return immediately: the dispatcher checks `is_open`
/// right before `send` and never waits for a transport acknowledgement.
pub trait Outbound: Send + Sync {
    fn is_open(&self) -> bool;

    fn send(&self, frame: Frame) -> Result<(), DeliveryError>;
}

/// Production [`Outbound`]: an unbounded queue drained by the connection's
/// writer task, which owns the socket sink. Frames for one connection are
/// written in the order they were queued.
#[derive(Debug, Clone)]
pub struct ChannelOutbound {
    tx: mpsc::UnboundedSender<Frame>,
}

impl ChannelOutbound {
    /// New outbound queue plus the receiver the writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Outbound for ChannelOutbound {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.tx.send(frame).map_err(|_| DeliveryError::Closed)
    }
}

/// Routing record for one physical connection. Cheap to clone; the registry
/// and any in-flight fan-out snapshot share the same outbound handle.
#[derive(Clone)]
pub struct Connection {
    conn_id: ConnId,
    token: SessionToken,
    identity: Identity,
    outbound: Arc<dyn Outbound>,
}

impl Connection {
    pub fn new(token: SessionToken, identity: Identity, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            conn_id: ConnId::new(),
            token,
            identity,
            outbound,
        }
    }

    pub fn conn_id(&self) -> &ConnId {
        &self.conn_id
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_open(&self) -> bool {
        self.outbound.is_open()
    }

    pub fn send(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.outbound.send(frame)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("conn_id", &self.conn_id)
            .field("token", &self.token)
            .field("identity", &self.identity)
            .field("open", &self.is_open())
            .finish()
    }
}
