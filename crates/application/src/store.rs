//! 单个房间的有序消息日志
//!
//! 追加由异步写锁串行化：序列号分配、持久化、发布三步在同一把写锁内完成，
//! 持久化失败时不消耗序列号。内存日志由读写锁保护，发布（入日志 + 扇出）
//! 在写锁内进行，`tail` 与订阅快照在读锁内进行，因此两者总能看到一致的视图。

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use domain::{
    DomainError, Identity, Message, MessageContent, RepositoryError, RoomId, SharedMessage,
};
use tokio::sync::Mutex;

use crate::{
    clock::Clock, error::ApplicationError, hub::SubscriptionHub, repository::MessageRepository,
};

pub struct MessageStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    room_id: RoomId,
    repository: Arc<dyn MessageRepository>,
    clock: Arc<dyn Clock>,
    hub: Arc<SubscriptionHub>,
    writer: Mutex<()>,
    log: RwLock<Vec<SharedMessage>>,
}

impl MessageStore {
    /// 从持久化存储恢复房间日志
    ///
    /// 恢复出的序列号必须从 1 开始连续，否则视为存储损坏。
    pub async fn open(
        room_id: RoomId,
        repository: Arc<dyn MessageRepository>,
        clock: Arc<dyn Clock>,
        hub: Arc<SubscriptionHub>,
    ) -> Result<Self, ApplicationError> {
        let history = repository.load_room(&room_id).await?;

        for (index, message) in history.iter().enumerate() {
            let expected = index as u64 + 1;
            if message.sequence != expected {
                tracing::error!(
                    room_id = %room_id,
                    expected,
                    found = message.sequence,
                    "restored history has a sequence gap"
                );
                return Err(RepositoryError::Corrupt(format!(
                    "room {}: expected sequence {}, found {}",
                    room_id, expected, message.sequence
                ))
                .into());
            }
        }

        tracing::info!(room_id = %room_id, restored = history.len(), "message store opened");

        Ok(Self {
            inner: Arc::new(StoreInner {
                room_id,
                repository,
                clock,
                hub,
                writer: Mutex::new(()),
                log: RwLock::new(history.into_iter().map(Arc::new).collect()),
            }),
        })
    }

    pub fn room_id(&self) -> &RoomId {
        &self.inner.room_id
    }

    pub fn hub(&self) -> &Arc<SubscriptionHub> {
        &self.inner.hub
    }

    /// 追加一条消息并扇出给所有订阅者
    ///
    /// 序列号和时间戳都由服务端分配；`created_at` 不早于上一条消息，
    /// 即使系统时钟回拨。持久化与发布在独立任务中完成，调用方中途
    /// 放弃等待时消息仍会进入日志并扇出。
    pub async fn append(
        &self,
        sender: &Identity,
        content: &str,
    ) -> Result<SharedMessage, ApplicationError> {
        let content = MessageContent::new(content)?;
        let inner = Arc::clone(&self.inner);
        let sender = sender.clone();

        tokio::spawn(async move { inner.append(&sender, content).await })
            .await
            .map_err(|err| {
                tracing::error!(room_id = %self.inner.room_id, error = %err, "append task failed");
                ApplicationError::from(RepositoryError::storage(format!(
                    "append task failed: {err}"
                )))
            })?
    }

    /// 最近 `n` 条消息，按序列号升序
    pub fn tail(&self, n: usize) -> Result<Vec<SharedMessage>, ApplicationError> {
        if n == 0 {
            return Err(DomainError::invalid_input("limit", "must be positive").into());
        }
        Ok(tail_of(&self.inner.read_log(), n))
    }

    /// 全部消息的快照迭代器，供导出等管理用途
    pub fn all(&self) -> impl Iterator<Item = SharedMessage> {
        self.inner.read_log().clone().into_iter()
    }

    pub fn len(&self) -> usize {
        self.inner.read_log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read_log().is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.inner.read_log().last().map_or(0, |m| m.sequence)
    }

    /// 在读锁内取最近 `n` 条并执行 `f`，期间不会有新消息发布
    pub(crate) fn with_snapshot<R>(&self, n: usize, f: impl FnOnce(Vec<SharedMessage>) -> R) -> R {
        let log = self.inner.read_log();
        f(tail_of(&log, n))
    }
}

impl StoreInner {
    async fn append(
        &self,
        sender: &Identity,
        content: MessageContent,
    ) -> Result<SharedMessage, ApplicationError> {
        let _writer = self.writer.lock().await;

        let (sequence, floor) = {
            let log = self.read_log();
            let last = log.last();
            (
                last.map_or(0, |m| m.sequence) + 1,
                last.map(|m| m.created_at),
            )
        };
        let now = self.clock.now();
        let created_at = match floor {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        let message = Message::new(sequence, sender, content, created_at);

        if let Err(err) = self.repository.append(&self.room_id, &message).await {
            tracing::warn!(
                room_id = %self.room_id,
                sequence,
                error = %err,
                "failed to persist message"
            );
            return Err(err.into());
        }

        let message = Arc::new(message);
        {
            let mut log = self.write_log();
            log.push(Arc::clone(&message));
            self.hub.notify(&message);
        }

        tracing::debug!(
            room_id = %self.room_id,
            sequence,
            message_id = %message.id,
            sender_id = %message.sender_id,
            "message appended"
        );
        Ok(message)
    }

    fn read_log(&self) -> RwLockReadGuard<'_, Vec<SharedMessage>> {
        self.log.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_log(&self) -> RwLockWriteGuard<'_, Vec<SharedMessage>> {
        self.log.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn tail_of(log: &[SharedMessage], n: usize) -> Vec<SharedMessage> {
    log[log.len().saturating_sub(n)..].to_vec()
}
