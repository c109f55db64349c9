use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use application::{MessageRepository, RoomRegistry, StaticAuthGateway, SystemClock};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use config::ChatConfig;
use domain::{Identity, Message, RepositoryError, RoomId};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower::ServiceExt;

use web_api::{router, AppState};

/// 可以随时切换为不可用的内存仓储
#[derive(Default)]
struct FlakyRepository {
    down: AtomicBool,
    data: RwLock<Vec<Message>>,
}

#[async_trait]
impl MessageRepository for FlakyRepository {
    async fn append(&self, _room_id: &RoomId, message: &Message) -> Result<(), RepositoryError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RepositoryError::storage("connection reset by peer"));
        }
        self.data.write().await.push(message.clone());
        Ok(())
    }

    async fn load_room(&self, _room_id: &RoomId) -> Result<Vec<Message>, RepositoryError> {
        Ok(self.data.read().await.clone())
    }
}

fn build_app(repository: Arc<FlakyRepository>) -> Router {
    let gateway = StaticAuthGateway::new()
        .with_session("token-alice", Identity::new("uid-a", "Alice").expect("identity"));
    let rooms = RoomRegistry::new(
        repository,
        Arc::new(gateway),
        Arc::new(SystemClock),
        ChatConfig::default(),
    );
    router(AppState::new(Arc::new(rooms)))
}

async fn send(app: &Router, content: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/rooms/lobby/messages")
        .header("content-type", "application/json")
        .header("authorization", "Bearer token-alice")
        .body(Body::from(json!({ "content": content }).to_string()))
        .expect("request");

    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));
    (status, body)
}

#[tokio::test]
async fn storage_outage_is_surfaced_and_consumes_no_sequence() {
    let repository = Arc::new(FlakyRepository::default());
    let app = build_app(Arc::clone(&repository));

    let (status, body) = send(&app, "hello").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sequence"], 1);

    repository.down.store(true, Ordering::SeqCst);
    let (status, body) = send(&app, "lost").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "STORAGE_UNAVAILABLE");

    repository.down.store(false, Ordering::SeqCst);
    let (status, body) = send(&app, "world").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sequence"], 2);
    assert_eq!(repository.data.read().await.len(), 2);
}
