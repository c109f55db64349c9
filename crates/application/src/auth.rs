//! 身份网关端口
//!
//! 会话令牌由外部身份提供方签发，这里只负责把它解析成发送者身份。

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use domain::Identity;

use crate::error::ApplicationError;

/// 客户端出示的不透明会话凭证
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// 令牌不进日志
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// 解析会话；无法解析时返回 `ApplicationError::Unauthenticated`
    async fn resolve_session(&self, session: &SessionToken) -> Result<Identity, ApplicationError>;
}

/// 预先登记令牌的网关，用于本地调试和测试
#[derive(Debug, Default)]
pub struct StaticAuthGateway {
    sessions: HashMap<SessionToken, Identity>,
}

impl StaticAuthGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.sessions.insert(SessionToken::new(token), identity);
        self
    }
}

#[async_trait]
impl AuthGateway for StaticAuthGateway {
    async fn resolve_session(&self, session: &SessionToken) -> Result<Identity, ApplicationError> {
        self.sessions
            .get(session)
            .cloned()
            .ok_or_else(|| ApplicationError::unauthenticated("unknown session"))
    }
}
