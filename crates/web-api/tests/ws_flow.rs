mod support;

use std::time::Duration;

use config::ChatConfig;
use domain::RoomId;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};

use support::spawn_app;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn next_frame(ws: &mut WsStream) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame timeout")
            .expect("stream open")
            .expect("ws frame");
        if let TungsteniteMessage::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

async fn post_message(client: &Client, url: &str, token: &str, content: &str) -> Value {
    let response = client
        .post(url)
        .bearer_auth(token)
        .json(&json!({ "content": content }))
        .send()
        .await
        .expect("send message");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.expect("message json")
}

#[tokio::test]
async fn websocket_live_view_flow() {
    let app = spawn_app(ChatConfig::default()).await;
    let client = Client::new();
    let messages_url = app.http("/api/v1/rooms/lobby/messages");

    let alice = app.token_for("uid-a", "Alice");
    let bob = app.token_for("uid-b", "Bob");
    let carol = app.token_for("uid-c", "Carol");

    post_message(&client, &messages_url, &alice, "hello").await;
    post_message(&client, &messages_url, &bob, "world").await;

    let (mut ws, _) = connect_async(app.ws(&format!("/api/v1/rooms/lobby/live?token={carol}")))
        .await
        .expect("ws connect");

    let snapshot = next_frame(&mut ws).await;
    assert_eq!(snapshot["type"], "snapshot");
    let contents: Vec<&str> = snapshot["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["hello", "world"]);
    assert_eq!(snapshot["messages"][1]["senderName"], "Bob");

    let sent = post_message(&client, &messages_url, &alice, "third").await;
    let live = next_frame(&mut ws).await;
    assert_eq!(live["type"], "message");
    assert_eq!(live["message"]["sequence"], 3);
    assert_eq!(live["message"]["id"], sent["id"]);

    ws.close(None).await.expect("close");
}

#[tokio::test]
async fn websocket_rejects_missing_or_invalid_session() {
    let app = spawn_app(ChatConfig::default()).await;

    for url in [
        app.ws("/api/v1/rooms/lobby/live"),
        app.ws("/api/v1/rooms/lobby/live?token=not-a-jwt"),
    ] {
        match connect_async(url).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                assert_eq!(response.status().as_u16(), 401);
            }
            other => panic!("expected http 401, got {:?}", other.map(|_| ())),
        }
    }
}

#[tokio::test]
async fn websocket_answers_ping_and_releases_subscription_on_close() {
    let app = spawn_app(ChatConfig::default()).await;
    let carol = app.token_for("uid-c", "Carol");

    let (mut ws, _) = connect_async(app.ws(&format!("/api/v1/rooms/lobby/live?token={carol}")))
        .await
        .expect("ws connect");
    assert_eq!(next_frame(&mut ws).await["type"], "snapshot");

    let room = app
        .rooms
        .room(&RoomId::parse("lobby").unwrap())
        .await
        .expect("room");
    assert_eq!(room.hub().active_count(), 1);

    ws.send(TungsteniteMessage::Ping(vec![7u8, 7, 7].into()))
        .await
        .expect("ping");
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("pong timeout")
            .expect("stream open")
            .expect("ws frame");
        if let TungsteniteMessage::Pong(data) = message {
            assert_eq!(&data[..], &[7u8, 7, 7]);
            break;
        }
    }

    ws.close(None).await.expect("close");
    drop(ws);

    timeout(Duration::from_secs(5), async {
        while room.hub().active_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscription released");
}
