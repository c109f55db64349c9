use async_trait::async_trait;
use domain::{Message, RepositoryError, RoomId};

/// 消息持久化端口
///
/// 每个房间一条追加日志。实现必须拒绝同一房间内重复的序列号。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    // 持久化一条消息，返回前必须已写入存储
    async fn append(&self, room_id: &RoomId, message: &Message) -> Result<(), RepositoryError>;

    // 按序列号升序读出房间的全部历史，用于启动时恢复
    async fn load_room(&self, room_id: &RoomId) -> Result<Vec<Message>, RepositoryError>;
}

pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    /// 进程内存储，未配置数据库时使用
    #[derive(Debug, Default)]
    pub struct InMemoryMessageRepository {
        rooms: RwLock<HashMap<RoomId, Vec<Message>>>,
    }

    impl InMemoryMessageRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl MessageRepository for InMemoryMessageRepository {
        async fn append(&self, room_id: &RoomId, message: &Message) -> Result<(), RepositoryError> {
            let mut rooms = self.rooms.write().await;
            let log = rooms.entry(room_id.clone()).or_default();

            if let Some(last) = log.last() {
                if message.sequence <= last.sequence {
                    return Err(RepositoryError::Conflict(format!(
                        "room {} already has sequence {}",
                        room_id, message.sequence
                    )));
                }
            }
            log.push(message.clone());
            Ok(())
        }

        async fn load_room(&self, room_id: &RoomId) -> Result<Vec<Message>, RepositoryError> {
            let rooms = self.rooms.read().await;
            Ok(rooms.get(room_id).cloned().unwrap_or_default())
        }
    }

}
