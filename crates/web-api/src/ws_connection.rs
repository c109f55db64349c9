use std::sync::Arc;

use application::{ChatService, LiveView, Subscription};
use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket};
use domain::SharedMessage;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Serialize;

/// 推送给客户端的帧，按 `type` 区分
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum LiveFrame<'a> {
    Snapshot { messages: &'a [SharedMessage] },
    Message { message: &'a SharedMessage },
    Overrun,
}

/// 连接结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    ClientClosed,
    SocketError,
    Overrun,
    SubscriptionClosed,
}

type WsSender = SplitSink<WebSocket, WsMessage>;

/// 单个实时视图连接
///
/// 先推送快照，再逐条推送新消息；任何一端断开都会注销订阅。
pub struct LiveViewConnection {
    socket: WebSocket,
    room: Arc<ChatService>,
    view: LiveView,
}

impl LiveViewConnection {
    pub fn new(socket: WebSocket, room: Arc<ChatService>, view: LiveView) -> Self {
        Self { socket, room, view }
    }

    pub async fn run(self) {
        let Self { socket, room, view } = self;
        let LiveView {
            snapshot,
            mut subscription,
        } = view;
        let (mut sender, mut incoming) = socket.split();

        tracing::info!(
            room_id = %room.room_id(),
            subscription_id = %subscription.id(),
            snapshot_len = snapshot.len(),
            "live view connected"
        );

        let reason = if send_frame(&mut sender, &LiveFrame::Snapshot { messages: &snapshot })
            .await
            .is_err()
        {
            Disconnect::SocketError
        } else {
            Self::pump(&mut sender, &mut incoming, &mut subscription).await
        };

        room.close_live_view(&mut subscription);
        tracing::info!(
            room_id = %room.room_id(),
            subscription_id = %subscription.id(),
            ?reason,
            "live view disconnected"
        );
    }

    async fn pump(
        sender: &mut WsSender,
        incoming: &mut futures_util::stream::SplitStream<WebSocket>,
        subscription: &mut Subscription,
    ) -> Disconnect {
        loop {
            tokio::select! {
                delivery = subscription.recv() => match delivery {
                    Ok(Some(message)) => {
                        if send_frame(sender, &LiveFrame::Message { message: &message }).await.is_err() {
                            return Disconnect::SocketError;
                        }
                    }
                    Ok(None) => return Disconnect::SubscriptionClosed,
                    Err(err) => {
                        tracing::warn!(subscription_id = %subscription.id(), error = %err, "live view overrun");
                        let _ = send_frame(sender, &LiveFrame::Overrun).await;
                        let _ = sender
                            .send(WsMessage::Close(Some(CloseFrame {
                                code: close_code::AGAIN,
                                reason: Utf8Bytes::from_static("subscriber overrun"),
                            })))
                            .await;
                        return Disconnect::Overrun;
                    }
                },
                frame = incoming.next() => match frame {
                    Some(Ok(WsMessage::Ping(data))) => {
                        if sender.send(WsMessage::Pong(data)).await.is_err() {
                            return Disconnect::SocketError;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return Disconnect::ClientClosed,
                    Some(Ok(_)) => {
                        // 实时视图是只读的，客户端发消息走 HTTP
                        tracing::debug!(subscription_id = %subscription.id(), "ignoring client frame");
                    }
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "websocket receive failed");
                        return Disconnect::SocketError;
                    }
                },
            }
        }
    }
}

async fn send_frame(sender: &mut WsSender, frame: &LiveFrame<'_>) -> Result<(), axum::Error> {
    let payload = encode_frame(frame)?;
    sender.send(payload).await
}

/// 编码失败视同连接错误，客户端不会静默丢帧
fn encode_frame<T: Serialize>(frame: &T) -> Result<WsMessage, axum::Error> {
    let json = serde_json::to_string(frame).map_err(|err| {
        tracing::warn!(error = %err, "failed to serialize live view frame");
        axum::Error::new(err)
    })?;
    Ok(WsMessage::Text(json.into()))
}
