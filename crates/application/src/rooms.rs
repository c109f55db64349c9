//! 房间注册表
//!
//! 每个房间是一对独立的存储和订阅中心，首次访问时从持久化存储恢复。

use std::collections::HashMap;
use std::sync::Arc;

use config::ChatConfig;
use domain::RoomId;
use tokio::sync::{Mutex, OnceCell};

use crate::{
    auth::{AuthGateway, SessionToken},
    clock::Clock,
    error::ApplicationError,
    repository::MessageRepository,
    services::{ChatService, ChatServiceDependencies},
};

type RoomSlot = Arc<OnceCell<Arc<ChatService>>>;

pub struct RoomRegistry {
    message_repository: Arc<dyn MessageRepository>,
    auth_gateway: Arc<dyn AuthGateway>,
    clock: Arc<dyn Clock>,
    settings: ChatConfig,
    rooms: Mutex<HashMap<RoomId, RoomSlot>>,
}

impl RoomRegistry {
    pub fn new(
        message_repository: Arc<dyn MessageRepository>,
        auth_gateway: Arc<dyn AuthGateway>,
        clock: Arc<dyn Clock>,
        settings: ChatConfig,
    ) -> Self {
        Self {
            message_repository,
            auth_gateway,
            clock,
            settings,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// 先校验会话再取得房间，被拒绝的请求不会打开或恢复任何房间
    pub async fn room_for(
        &self,
        session: &SessionToken,
        room_id: &RoomId,
    ) -> Result<Arc<ChatService>, ApplicationError> {
        self.auth_gateway
            .resolve_session(session)
            .await
            .inspect_err(|err| {
                tracing::debug!(room_id = %room_id, error = %err, "session rejected before opening room");
            })?;
        self.room(room_id).await
    }

    /// 取得房间服务，必要时打开它
    ///
    /// 同一房间的并发首次访问只会恢复一次；打开失败不会缓存，下次访问重试。
    pub async fn room(&self, room_id: &RoomId) -> Result<Arc<ChatService>, ApplicationError> {
        let slot = {
            let mut rooms = self.rooms.lock().await;
            Arc::clone(rooms.entry(room_id.clone()).or_default())
        };

        let service = slot
            .get_or_try_init(|| async {
                let service = ChatService::open(
                    room_id.clone(),
                    ChatServiceDependencies {
                        message_repository: Arc::clone(&self.message_repository),
                        auth_gateway: Arc::clone(&self.auth_gateway),
                        clock: Arc::clone(&self.clock),
                        settings: self.settings.clone(),
                    },
                )
                .await?;
                Ok::<_, ApplicationError>(Arc::new(service))
            })
            .await?;

        Ok(Arc::clone(service))
    }

    pub async fn open_rooms(&self) -> usize {
        self.rooms
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }
}
