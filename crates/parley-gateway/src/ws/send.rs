use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{stream::SplitSink, SinkExt};
use parley_hub::Frame;
use tokio::sync::mpsc;

pub type WsSink = SplitSink<WebSocket, Message>;

/// Sole owner of the socket's write half: drains the connection's outbound
/// queue in order. Exits on the first failed write or after a close frame,
/// either of which drops the queue receiver and flips the connection to
/// not-open.
pub async fn writer_task(mut sink: WsSink, mut rx: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        let closing = matches!(frame, Frame::Close { .. });
        if sink.send(to_message(frame)).await.is_err() || closing {
            break;
        }
    }
    let _ = sink.close().await;
}

pub fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes),
        Frame::Close { code, reason } => Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })),
    }
}
