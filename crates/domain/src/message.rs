use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::identity::Identity;
use crate::value_objects::{MessageContent, MessageId, Timestamp, UserId};

/// 在存储与多个订阅者之间共享的只读消息
pub type SharedMessage = Arc<Message>;

/// 聊天消息。
///
/// 追加后不可变：没有编辑或删除操作。`sequence` 是真正的排序键，
/// `created_at` 可能相同。序列化字段名与客户端线上格式一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: MessageContent,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
    pub sequence: u64,
}

impl Message {
    /// 以服务端分配的序列号和时间戳创建新消息
    ///
    /// 时间戳截断到微秒，与 PostgreSQL `TIMESTAMPTZ` 的精度一致。
    pub fn new(
        sequence: u64,
        sender: &Identity,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            sender_id: sender.user_id.clone(),
            sender_name: sender.display_name.clone(),
            content,
            created_at: truncate_to_micros(created_at),
            sequence,
        }
    }
}

fn truncate_to_micros(at: Timestamp) -> Timestamp {
    at - Duration::nanoseconds(i64::from(at.nanosecond() % 1_000))
}
