use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::UserId;

/// 会话解析出的发送者身份（用户 ID + 显示名称）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

impl Identity {
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(DomainError::invalid_input("sender_name", "cannot be empty"));
        }
        Ok(Self {
            user_id: UserId::parse(user_id)?,
            display_name,
        })
    }
}
