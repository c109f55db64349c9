//! 实时订阅中心
//!
//! 每个订阅者一条有界 `mpsc` 通道。扇出使用 `try_send`，从不等待慢消费者：
//! 缓冲写满时直接移除该订阅者，已缓冲的消息仍按序交付，随后该订阅以
//! `SubscriberOverrun` 结束。其他订阅者和写入方不受影响。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use domain::{RoomId, SharedMessage, SubscriptionId, UserId};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{error::ApplicationError, store::MessageStore};

/// 订阅状态：`Active -> Closed`，关闭后不可恢复
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Closed,
}

struct Subscriber {
    user_id: UserId,
    sender: mpsc::Sender<SharedMessage>,
    overrun: Arc<AtomicBool>,
}

pub struct SubscriptionHub {
    room_id: RoomId,
    buffer: usize,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
}

/// 打开实时视图的结果：历史快照 + 之后的实时订阅
pub struct LiveView {
    pub snapshot: Vec<SharedMessage>,
    pub subscription: Subscription,
}

impl SubscriptionHub {
    /// `buffer` 为每个订阅者最多积压的消息数
    pub fn new(room_id: RoomId, buffer: usize) -> Self {
        Self {
            room_id,
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// 读取快照并注册订阅
    ///
    /// 两步在存储的读锁内完成，新消息只能在注册之后发布，
    /// 因此快照之后的消息不会丢失也不会重复。
    pub fn subscribe(
        self: &Arc<Self>,
        user_id: &UserId,
        store: &MessageStore,
        snapshot_len: usize,
    ) -> LiveView {
        debug_assert!(Arc::ptr_eq(store.hub(), self));

        let (snapshot, subscription) = store.with_snapshot(snapshot_len, |snapshot| {
            (snapshot, self.register(user_id))
        });

        tracing::info!(
            room_id = %self.room_id,
            subscription_id = %subscription.id,
            user_id = %user_id,
            snapshot = snapshot.len(),
            "live view opened"
        );
        LiveView {
            snapshot,
            subscription,
        }
    }

    /// 关闭订阅，可重复调用
    pub fn unsubscribe(&self, subscription: &mut Subscription) {
        subscription.close();
    }

    /// 按全局顺序把消息推给每个活跃订阅者
    ///
    /// 由存储在发布临界区内调用，保证所有订阅者看到相同的相对顺序。
    pub fn notify(&self, message: &SharedMessage) {
        let mut subscribers = self.lock();
        subscribers.retain(|id, subscriber| {
            match subscriber.sender.try_send(Arc::clone(message)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    subscriber.overrun.store(true, Ordering::Release);
                    tracing::warn!(
                        room_id = %self.room_id,
                        subscription_id = %id,
                        user_id = %subscriber.user_id,
                        buffer = self.buffer,
                        sequence = message.sequence,
                        "subscriber overrun, dropping subscription"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        room_id = %self.room_id,
                        subscription_id = %id,
                        "subscriber gone, pruning"
                    );
                    false
                }
            }
        });
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn register(self: &Arc<Self>, user_id: &UserId) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.buffer);
        let overrun = Arc::new(AtomicBool::new(false));

        self.lock().insert(
            id,
            Subscriber {
                user_id: user_id.clone(),
                sender,
                overrun: Arc::clone(&overrun),
            },
        );

        Subscription {
            id,
            hub: Arc::clone(self),
            receiver,
            overrun,
            state: SubscriptionState::Active,
        }
    }

    fn deregister(&self, id: SubscriptionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 调用方持有的订阅句柄
///
/// 丢弃句柄等同于会话断开，会自动注销。
pub struct Subscription {
    id: SubscriptionId,
    hub: Arc<SubscriptionHub>,
    receiver: mpsc::Receiver<SharedMessage>,
    overrun: Arc<AtomicBool>,
    state: SubscriptionState,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// 等待下一条消息
    ///
    /// 订阅关闭后返回 `Ok(None)`；因积压被断开时，先交付已缓冲的消息，
    /// 再返回一次 `SubscriberOverrun`。
    pub async fn recv(&mut self) -> Result<Option<SharedMessage>, ApplicationError> {
        if self.state == SubscriptionState::Closed {
            return Ok(None);
        }

        match self.receiver.recv().await {
            Some(message) => Ok(Some(message)),
            None => {
                self.state = SubscriptionState::Closed;
                if self.overrun.load(Ordering::Acquire) {
                    Err(ApplicationError::SubscriberOverrun(self.id))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// 注销并释放缓冲；返回后不会再有任何交付
    pub fn close(&mut self) {
        if self.state == SubscriptionState::Closed {
            return;
        }

        let was_registered = self.hub.deregister(self.id);
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
        self.state = SubscriptionState::Closed;

        tracing::info!(
            room_id = %self.hub.room_id,
            subscription_id = %self.id,
            was_registered,
            "live view closed"
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
