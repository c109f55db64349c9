mod chat_service;

pub use chat_service::{ChatService, ChatServiceDependencies, MAX_SNAPSHOT_LEN};
