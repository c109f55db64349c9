//! 领域模型错误定义
//!
//! 领域层只产生两类错误：输入校验失败（`DomainError`）和持久化失败（`RepositoryError`）。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 输入不合法（空内容、非法标识等）
    #[error("invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// 消息内容超过允许的最大长度（按字符计）
    #[error("content too long: {length} characters (max {max})")]
    ContentTooLong { length: usize, max: usize },
}

impl DomainError {
    /// 创建输入校验错误
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 持久化层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// 同一房间内的序列号已被占用
    #[error("conflict: {0}")]
    Conflict(String),

    /// 存储不可写或不可读
    #[error("storage error: {message}")]
    Storage { message: String },

    /// 读出的历史不满足不变量（例如序列号不连续）
    #[error("corrupt history: {0}")]
    Corrupt(String),
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
