use thiserror::Error;

/// Per-connection send failure. Absorbed by the dispatcher, never returned
/// to the transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The connection's outbound queue is gone (writer task exited).
    #[error("connection closed")]
    Closed,

    /// The underlying channel rejected the frame.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Token → identity resolution failure, surfaced to the transport layer
/// which decides whether to reject the connection.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown session token: {token}")]
    UnknownToken { token: String },

    #[error("resolver backend error: {0}")]
    Backend(String),
}
