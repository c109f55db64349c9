use std::sync::Arc;

use config::ChatConfig;
use domain::{Identity, MessageContent, RoomId, SharedMessage};

use crate::{
    auth::{AuthGateway, SessionToken},
    clock::Clock,
    error::ApplicationError,
    hub::{LiveView, Subscription, SubscriptionHub},
    repository::MessageRepository,
    store::MessageStore,
};

/// 实时视图快照的条数上限
pub const MAX_SNAPSHOT_LEN: usize = 25;

pub struct ChatServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub auth_gateway: Arc<dyn AuthGateway>,
    pub clock: Arc<dyn Clock>,
    pub settings: ChatConfig,
}

/// 单个房间的聊天门面
///
/// 外部协作方只调用这里：校验会话与内容，然后委托给存储和订阅中心。
pub struct ChatService {
    auth_gateway: Arc<dyn AuthGateway>,
    settings: ChatConfig,
    store: MessageStore,
    hub: Arc<SubscriptionHub>,
}

impl ChatService {
    /// 打开房间：恢复历史并创建独立的订阅中心
    pub async fn open(room_id: RoomId, deps: ChatServiceDependencies) -> Result<Self, ApplicationError> {
        let hub = Arc::new(SubscriptionHub::new(
            room_id.clone(),
            deps.settings.subscriber_buffer,
        ));
        let store = MessageStore::open(
            room_id,
            deps.message_repository,
            deps.clock,
            Arc::clone(&hub),
        )
        .await?;

        Ok(Self {
            auth_gateway: deps.auth_gateway,
            settings: deps.settings,
            store,
            hub,
        })
    }

    pub fn room_id(&self) -> &RoomId {
        self.store.room_id()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn hub(&self) -> &Arc<SubscriptionHub> {
        &self.hub
    }

    pub async fn send_message(
        &self,
        session: &SessionToken,
        content: &str,
    ) -> Result<SharedMessage, ApplicationError> {
        let sender = self.resolve(session).await?;
        MessageContent::check_length(content, self.settings.max_content_length)?;
        self.store.append(&sender, content).await
    }

    /// 打开实时视图：最近 `history_limit` 条（至多 25 条）快照 + 之后的每条新消息
    pub async fn open_live_view(&self, session: &SessionToken) -> Result<LiveView, ApplicationError> {
        let viewer = self.resolve(session).await?;
        let snapshot_len = self.settings.history_limit.min(MAX_SNAPSHOT_LEN);
        Ok(self
            .hub
            .subscribe(&viewer.user_id, &self.store, snapshot_len))
    }

    pub fn close_live_view(&self, subscription: &mut Subscription) {
        self.hub.unsubscribe(subscription);
    }

    /// 有界历史查询，`limit` 缺省为 `history_limit`，上限 `max_history_limit`
    pub async fn history(
        &self,
        session: &SessionToken,
        limit: Option<usize>,
    ) -> Result<Vec<SharedMessage>, ApplicationError> {
        self.resolve(session).await?;
        let limit = limit
            .unwrap_or(self.settings.history_limit)
            .min(self.settings.max_history_limit);
        self.store.tail(limit)
    }

    async fn resolve(&self, session: &SessionToken) -> Result<Identity, ApplicationError> {
        self.auth_gateway
            .resolve_session(session)
            .await
            .inspect_err(|err| {
                tracing::debug!(room_id = %self.room_id(), error = %err, "session rejected");
            })
    }
}
