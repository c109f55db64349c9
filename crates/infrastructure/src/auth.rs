//! JWT 身份网关
//!
//! 会话令牌是 HS256 签名的 JWT：`sub` 为用户 ID，`name` 为显示名称。

use application::{ApplicationError, AuthGateway, SessionToken};
use async_trait::async_trait;
use config::AuthConfig;
use domain::Identity;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

#[derive(Clone)]
pub struct JwtAuthGateway {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtAuthGateway {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::hours(config.token_ttl_hours),
        }
    }

    /// 为身份签发会话令牌
    pub fn issue_token(&self, identity: &Identity) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: identity.user_id.to_string(),
            name: identity.display_name.clone(),
            exp: (OffsetDateTime::now_utc() + self.ttl).unix_timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::default(), claims, &self.encoding_key)
    }
}

#[async_trait]
impl AuthGateway for JwtAuthGateway {
    async fn resolve_session(&self, session: &SessionToken) -> Result<Identity, ApplicationError> {
        let claims = decode::<Claims>(session.as_str(), &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| ApplicationError::unauthenticated(format!("invalid token: {err}")))?;

        Identity::new(claims.sub, claims.name)
            .map_err(|err| ApplicationError::unauthenticated(format!("invalid claims: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(secret: &str) -> JwtAuthGateway {
        JwtAuthGateway::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            token_ttl_hours: 1,
        })
    }

    const SECRET: &str = "test-secret-key-with-at-least-32-characters";

    #[tokio::test]
    async fn test_issued_token_resolves_to_identity() {
        let gateway = gateway(SECRET);
        let alice = Identity::new("uid-a", "Alice").unwrap();

        let token = gateway.issue_token(&alice).unwrap();
        let resolved = gateway
            .resolve_session(&SessionToken::new(token))
            .await
            .unwrap();
        assert_eq!(resolved, alice);
    }

    #[tokio::test]
    async fn test_rejects_foreign_signature() {
        let alice = Identity::new("uid-a", "Alice").unwrap();
        let token = gateway("another-secret-key-with-at-least-32-chars")
            .issue_token(&alice)
            .unwrap();

        let err = gateway(SECRET)
            .resolve_session(&SessionToken::new(token))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_rejects_expired_token() {
        let gateway = gateway(SECRET);
        let token = gateway
            .sign(&Claims {
                sub: "uid-a".to_string(),
                name: "Alice".to_string(),
                exp: (OffsetDateTime::now_utc() - Duration::hours(2)).unix_timestamp(),
            })
            .unwrap();

        let err = gateway
            .resolve_session(&SessionToken::new(token))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_rejects_blank_display_name_and_garbage() {
        let gateway = gateway(SECRET);
        let token = gateway
            .sign(&Claims {
                sub: "uid-a".to_string(),
                name: " ".to_string(),
                exp: (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp(),
            })
            .unwrap();

        for session in [token.as_str(), "not-a-jwt", ""] {
            let err = gateway
                .resolve_session(&SessionToken::new(session))
                .await
                .unwrap_err();
            assert!(matches!(err, ApplicationError::Unauthenticated(_)));
        }
    }
}
