use domain::{DomainError, RepositoryError, SubscriptionId};
use thiserror::Error;

/// 对外暴露的错误分类
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 输入校验失败（包括超长内容）
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    /// 会话无法解析为身份
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// 底层存储不可用，调用方可自行重试（重试可能产生重复消息）
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] RepositoryError),
    /// 订阅者消费过慢，订阅已被断开
    #[error("subscriber {0} overrun, subscription dropped")]
    SubscriberOverrun(SubscriptionId),
}

/// 错误种类，传输层据此映射状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    ContentTooLong,
    Unauthenticated,
    StorageUnavailable,
    SubscriberOverrun,
}

impl ApplicationError {
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(DomainError::InvalidInput { .. }) => ErrorKind::InvalidInput,
            Self::Domain(DomainError::ContentTooLong { .. }) => ErrorKind::ContentTooLong,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::SubscriberOverrun(_) => ErrorKind::SubscriberOverrun,
        }
    }
}
