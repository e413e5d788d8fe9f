use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::StreamExt;
use parley_core::types::{Identity, SessionToken};
use parley_hub::{ChannelOutbound, Frame, ResolveError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::send;

/// Close code sent when the token cannot be resolved and the gateway is
/// configured to reject unresolved tokens.
const CLOSE_UNRESOLVED: u16 = 4001;

/// RFC 6455 "message too big", sent when an inbound text frame exceeds
/// `server.max_payload_bytes`.
const CLOSE_TOO_LARGE: u16 = 1009;

/// How long the writer gets to flush a queued close frame before it is
/// aborted.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// GET /ws/{token} (also /websocket/{token})
///
/// Resolves the token before upgrading. A rejected token still upgrades,
/// then closes immediately with [`CLOSE_UNRESOLVED`] so browser clients see
/// a close code instead of a bare HTTP error.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(token): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let token = SessionToken::from(token);

    match admit(&state, &token).await {
        Ok(identity) => ws.on_upgrade(move |socket| run_connection(socket, state, token, identity)),
        Err(e) => {
            warn!(%token, error = %e, close_code = CLOSE_UNRESOLVED, "connection rejected");
            ws.on_upgrade(|mut socket| async move {
                let frame = CloseFrame {
                    code: CLOSE_UNRESOLVED,
                    reason: "unresolved token".into(),
                };
                let _ = socket.send(Message::Close(Some(frame))).await;
            })
        }
    }
}

/// Resolve a token, falling back to the unresolved placeholder unless the
/// config says to reject.
pub async fn admit(state: &AppState, token: &SessionToken) -> Result<Identity, ResolveError> {
    match state.resolver.resolve(token).await {
        Ok(identity) => Ok(identity),
        Err(e) if !state.config.resolver.reject_unresolved => {
            warn!(%token, error = %e, "token unresolved, admitting as placeholder identity");
            Ok(Identity::unresolved())
        }
        Err(e) => Err(e),
    }
}

/// Per-connection task. Lives for the entire WS session.
async fn run_connection(
    socket: WebSocket,
    state: Arc<AppState>,
    token: SessionToken,
    identity: Identity,
) {
    let (sink, mut stream) = socket.split();
    let (outbound, rx) = ChannelOutbound::channel();
    let mut writer = tokio::spawn(send::writer_task(sink, rx));

    let conn = state.hub.open(token, identity, Arc::new(outbound));
    info!(
        token = %conn.token(),
        identity = %conn.identity(),
        conn_id = %conn.conn_id(),
        "WS connection opened"
    );

    let max_payload = state.config.server.max_payload_bytes;
    let mut close_queued = false;
    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str();
                    if text.len() > max_payload {
                        warn!(
                            conn_id = %conn.conn_id(),
                            size = text.len(),
                            max = max_payload,
                            "payload too large"
                        );
                        close_queued = conn
                            .send(Frame::Close {
                                code: CLOSE_TOO_LARGE,
                                reason: "payload too large".into(),
                            })
                            .is_ok();
                        break;
                    }
                    state.hub.receive(&conn, text);
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(
                        conn_id = %conn.conn_id(),
                        size = data.len(),
                        "inbound binary frame ignored"
                    );
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(conn_id = %conn.conn_id(), reason = ?frame, "client initiated close");
                    break;
                }
                // ping/pong are answered by the websocket layer
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    state.hub.error(&conn, &e);
                    break;
                }
                None => break,
            },

            _ = &mut writer => {
                debug!(conn_id = %conn.conn_id(), "writer task ended");
                break;
            }
        }
    }

    state.hub.close(&conn);
    // the writer exits by itself once it has sent a queued close frame
    if !close_queued || tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
    info!(conn_id = %conn.conn_id(), token = %conn.token(), "WS connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use parley_core::config::{ParleyConfig, ResolverMode};
    use parley_hub::{resolver::resolver_from_config, Hub};
    use parley_protocol::ChatMessage;
    use std::net::SocketAddr;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message as ClientMessage;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const WAIT: Duration = Duration::from_secs(5);

    fn static_config(reject_unresolved: bool) -> ParleyConfig {
        let mut config = ParleyConfig::default();
        config.resolver.mode = ResolverMode::Static;
        config.resolver.reject_unresolved = reject_unresolved;
        config
            .resolver
            .tokens
            .insert("tab-1".to_string(), "alice".to_string());
        config
    }

    fn state(reject_unresolved: bool) -> AppState {
        let config = static_config(reject_unresolved);
        let hub = Hub::from_config(&config).unwrap();
        let resolver = resolver_from_config(&config.resolver);
        AppState::new(config, hub, resolver)
    }

    #[tokio::test]
    async fn known_token_resolves() {
        let state = state(true);
        let identity = admit(&state, &"tab-1".into()).await.unwrap();
        assert_eq!(identity.as_str(), "alice");
    }

    #[tokio::test]
    async fn unknown_token_admitted_as_placeholder() {
        let state = state(false);
        let identity = admit(&state, &"stranger".into()).await.unwrap();
        assert!(identity.is_unresolved());
    }

    #[tokio::test]
    async fn unknown_token_rejected_when_configured() {
        let state = state(true);
        assert!(matches!(
            admit(&state, &"stranger".into()).await,
            Err(ResolveError::UnknownToken { .. })
        ));
    }

    /// Serve the full router on an ephemeral port.
    async fn serve(config: ParleyConfig) -> (SocketAddr, Arc<AppState>) {
        let hub = Hub::from_config(&config).unwrap();
        let resolver = resolver_from_config(&config.resolver);
        let state = Arc::new(AppState::new(config, hub, resolver));
        let app = crate::app::build_router(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    async fn connect(addr: SocketAddr, path: &str) -> Client {
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
            .await
            .expect("websocket handshake failed");
        client
    }

    async fn next_message(client: &mut Client) -> ClientMessage {
        timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error")
    }

    fn decode(msg: ClientMessage) -> ChatMessage {
        match msg {
            ClientMessage::Binary(bytes) => serde_json::from_slice(&bytes).unwrap(),
            other => panic!("expected binary chat message, got {other:?}"),
        }
    }

    fn close_code(msg: ClientMessage) -> u16 {
        match msg {
            ClientMessage::Close(Some(frame)) => frame.code.into(),
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    /// Registration happens on the server after the handshake returns.
    async fn wait_for_connections(state: &AppState, expected: usize) {
        timeout(WAIT, async {
            while state.hub.registry().len() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "registry stuck at {} connections, expected {expected}",
                state.hub.registry().len()
            )
        });
    }

    #[tokio::test]
    async fn inbound_text_reaches_both_routes() {
        let (addr, state) = serve(ParleyConfig::default()).await;
        let mut a = connect(addr, "/ws/a").await;
        let mut b = connect(addr, "/websocket/b").await;
        wait_for_connections(&state, 2).await;

        a.send(ClientMessage::Text("hello".into())).await.unwrap();

        let to_a = decode(next_message(&mut a).await);
        let to_b = decode(next_message(&mut b).await);
        assert_eq!(to_a.content, "hello");
        assert_eq!(to_a, to_b);
    }

    #[tokio::test]
    async fn oversize_text_closes_with_1009() {
        let mut config = ParleyConfig::default();
        config.server.max_payload_bytes = 16;
        let (addr, state) = serve(config).await;
        let mut a = connect(addr, "/ws/a").await;
        let _b = connect(addr, "/ws/b").await;
        wait_for_connections(&state, 2).await;

        a.send(ClientMessage::Text("x".repeat(32).into())).await.unwrap();

        assert_eq!(close_code(next_message(&mut a).await), CLOSE_TOO_LARGE);
        wait_for_connections(&state, 1).await;
        assert!(state.hub.registry().get("a").is_none());
        assert!(state.hub.registry().get("b").is_some());
    }

    #[tokio::test]
    async fn inbound_binary_is_ignored() {
        let (addr, state) = serve(ParleyConfig::default()).await;
        let mut a = connect(addr, "/ws/a").await;
        wait_for_connections(&state, 1).await;

        a.send(ClientMessage::Binary(vec![1, 2, 3].into())).await.unwrap();
        a.send(ClientMessage::Text("after".into())).await.unwrap();

        // the first frame back is the broadcast of the text, not of the bytes
        assert_eq!(decode(next_message(&mut a).await).content, "after");
        assert_eq!(state.hub.registry().len(), 1);
    }

    #[tokio::test]
    async fn client_close_unregisters() {
        let (addr, state) = serve(ParleyConfig::default()).await;
        let mut a = connect(addr, "/ws/a").await;
        let b = connect(addr, "/ws/b").await;
        wait_for_connections(&state, 2).await;

        a.close(None).await.unwrap();
        wait_for_connections(&state, 1).await;
        assert!(state.hub.registry().get("b").is_some());

        drop(b);
        wait_for_connections(&state, 0).await;
        assert_eq!(state.hub.registry().identity_count(), 0);
    }

    #[tokio::test]
    async fn rejected_token_is_upgraded_then_closed_with_4001() {
        let (addr, state) = serve(static_config(true)).await;
        let mut stranger = connect(addr, "/ws/stranger").await;

        assert_eq!(close_code(next_message(&mut stranger).await), CLOSE_UNRESOLVED);
        assert!(state.hub.registry().is_empty());
    }
}
