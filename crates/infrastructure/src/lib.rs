//! 基础设施层实现。
//!
//! 提供 PostgreSQL 消息仓储、数据库迁移和 JWT 身份网关，
//! 实现应用层定义的端口。

pub mod auth;
pub mod migrations;
pub mod repository;

pub use auth::{Claims, JwtAuthGateway};
pub use migrations::MIGRATOR;
pub use repository::{create_pg_pool, PgMessageRepository};
