//! 主应用程序入口
//!
//! 加载配置，装配房间注册表并启动 Axum Web API 服务。

use std::sync::Arc;

use application::{InMemoryMessageRepository, MessageRepository, RoomRegistry, SystemClock};
use config::AppConfig;
use infrastructure::{create_pg_pool, JwtAuthGateway, PgMessageRepository, MIGRATOR};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    if config.auth.uses_dev_secret() {
        tracing::warn!("using the built-in development JWT secret, set ROOMCAST_AUTH__JWT_SECRET");
    }

    let message_repository = message_repository(&config).await?;
    let auth_gateway = Arc::new(JwtAuthGateway::new(&config.auth));
    let rooms = RoomRegistry::new(
        message_repository,
        auth_gateway,
        Arc::new(SystemClock),
        config.chat.clone(),
    );

    let app = router(AppState::new(Arc::new(rooms)));
    let listen_addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;

    tracing::info!("roomcast 服务启动在 http://{}", listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("roomcast 服务已停止");
    Ok(())
}

/// 配置了数据库时使用 PostgreSQL，否则消息只保存在进程内
async fn message_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn MessageRepository>> {
    match &config.database.url {
        Some(database_url) => {
            tracing::info!(
                "连接数据库: {}",
                database_url.rsplit('@').next().unwrap_or("unknown")
            );
            let pg_pool = create_pg_pool(database_url, config.database.max_connections).await?;
            MIGRATOR.run(&pg_pool).await?;
            Ok(Arc::new(PgMessageRepository::new(pg_pool)))
        }
        None => {
            tracing::warn!("database.url not set, messages are kept in memory only");
            Ok(Arc::new(InMemoryMessageRepository::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
