//! 应用层实现。
//!
//! 围绕领域模型提供聊天室用例：有序追加消息、实时扇出、有界历史查询，
//! 以及对外部适配器（身份网关、消息持久化、时钟）的抽象。

pub mod auth;
pub mod clock;
pub mod error;
pub mod hub;
pub mod repository;
pub mod rooms;
pub mod services;
pub mod store;

pub use auth::{AuthGateway, SessionToken, StaticAuthGateway};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ApplicationError, ErrorKind};
pub use hub::{LiveView, Subscription, SubscriptionHub, SubscriptionState};
pub use repository::{memory::InMemoryMessageRepository, MessageRepository};
pub use rooms::RoomRegistry;
pub use services::{ChatService, ChatServiceDependencies, MAX_SNAPSHOT_LEN};
pub use store::MessageStore;
