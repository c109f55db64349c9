//! 会话凭证提取
//!
//! 令牌的校验交给应用层的 `AuthGateway`，这里只负责从请求里取出它。

use application::SessionToken;
use axum::http::{header, HeaderMap};

use crate::error::ApiError;

/// 从 `Authorization: Bearer <token>` 中取出会话
pub fn session_from_headers(headers: &HeaderMap) -> Result<SessionToken, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthenticated("missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthenticated("invalid authorization header format"))?;

    Ok(SessionToken::new(token))
}

/// 浏览器的 WebSocket 无法设置请求头，允许改用 `?token=`
pub fn session_from_headers_or_query(
    headers: &HeaderMap,
    query_token: Option<String>,
) -> Result<SessionToken, ApiError> {
    if headers.contains_key(header::AUTHORIZATION) {
        return session_from_headers(headers);
    }
    query_token
        .filter(|token| !token.is_empty())
        .map(SessionToken::new)
        .ok_or_else(|| ApiError::unauthenticated("missing session token"))
}
