#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{InMemoryMessageRepository, RoomRegistry, SystemClock};
use axum::Router;
use config::{AuthConfig, ChatConfig};
use domain::Identity;
use infrastructure::JwtAuthGateway;
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use web_api::{router, AppState};

pub const TEST_SECRET: &str = "test-secret-key-with-at-least-32-characters";

pub struct TestApp {
    pub addr: SocketAddr,
    pub rooms: Arc<RoomRegistry>,
    gateway: JwtAuthGateway,
    _shutdown: oneshot::Sender<()>,
}

impl TestApp {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn token_for(&self, user_id: &str, display_name: &str) -> String {
        let identity = Identity::new(user_id, display_name).expect("identity");
        self.gateway.issue_token(&identity).expect("issue token")
    }
}

pub fn build_router(settings: ChatConfig) -> (Router, JwtAuthGateway, Arc<RoomRegistry>) {
    let gateway = JwtAuthGateway::new(&AuthConfig {
        jwt_secret: TEST_SECRET.to_string(),
        token_ttl_hours: 1,
    });

    let rooms = Arc::new(RoomRegistry::new(
        Arc::new(InMemoryMessageRepository::new()),
        Arc::new(gateway.clone()),
        Arc::new(SystemClock),
        settings,
    ));

    (router(AppState::new(Arc::clone(&rooms))), gateway, rooms)
}

pub async fn spawn_app(settings: ChatConfig) -> TestApp {
    let (router, gateway, rooms) = build_router(settings);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    // allow server to start
    sleep(Duration::from_millis(50)).await;

    TestApp {
        addr,
        rooms,
        gateway,
        _shutdown: shutdown_tx,
    }
}
