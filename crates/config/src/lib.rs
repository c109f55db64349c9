//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 数据库连接（可选，不配置时使用内存存储）
//! - JWT 会话校验
//! - 聊天参数（内容长度、历史条数、订阅缓冲）
//!
//! 加载顺序：内置默认值 → YAML 文件 → `ROOMCAST_` 前缀的环境变量。
//! 环境变量用 `__` 分隔层级，例如 `ROOMCAST_SERVER__PORT=9000`。

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "ROOMCAST_CONFIG";
/// 默认配置文件
pub const DEFAULT_CONFIG_PATH: &str = "roomcast.yaml";
/// 环境变量前缀
pub const ENV_PREFIX: &str = "ROOMCAST_";
/// 开发环境 JWT 密钥，仅用于本地调试和测试
pub const DEV_JWT_SECRET: &str = "dev-secret-key-not-for-production-use-minimum-32-chars";

/// 全局应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 会话认证配置
    pub auth: AuthConfig,
    /// 聊天参数
    pub chat: ChatConfig,
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// 数据库配置
///
/// `url` 为空时消息只保存在进程内存中。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// JWT 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl AuthConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
        }
    }
}

/// 聊天参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// 单条消息最大字符数
    pub max_content_length: usize,
    /// 订阅快照和默认历史查询的条数
    pub history_limit: usize,
    /// 历史查询允许的最大条数
    pub max_history_limit: usize,
    /// 每个订阅者的缓冲消息数，写满即断开该订阅
    pub subscriber_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_content_length: 2000,
            history_limit: 25,
            max_history_limit: 100,
            subscriber_buffer: 64,
        }
    }
}

impl AppConfig {
    /// 组合所有配置来源
    pub fn figment() -> Figment {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// 加载并验证配置
    pub fn load() -> Result<Self, ConfigError> {
        let config: AppConfig = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::InvalidServerConfig(
                "host cannot be empty".to_string(),
            ));
        }

        if let Some(url) = &self.database.url {
            if url.is_empty() {
                return Err(ConfigError::InvalidDatabaseConfig(
                    "database url cannot be empty when set".to_string(),
                ));
            }
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidDatabaseConfig(
                "max connections must be greater than 0".to_string(),
            ));
        }

        // 至少 256 位
        if self.auth.jwt_secret.len() < 32 {
            return Err(ConfigError::InvalidJwtSecret(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidJwtSecret(
                "token ttl must be positive".to_string(),
            ));
        }

        let chat = &self.chat;
        if chat.max_content_length == 0 {
            return Err(ConfigError::InvalidChatConfig(
                "max_content_length must be greater than 0".to_string(),
            ));
        }
        if chat.history_limit == 0 || chat.max_history_limit == 0 {
            return Err(ConfigError::InvalidChatConfig(
                "history limits must be greater than 0".to_string(),
            ));
        }
        if chat.history_limit > chat.max_history_limit {
            return Err(ConfigError::InvalidChatConfig(format!(
                "history_limit {} exceeds max_history_limit {}",
                chat.history_limit, chat.max_history_limit
            )));
        }
        if chat.subscriber_buffer == 0 {
            return Err(ConfigError::InvalidChatConfig(
                "subscriber_buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("Invalid server configuration: {0}")]
    InvalidServerConfig(String),
    #[error("Invalid database configuration: {0}")]
    InvalidDatabaseConfig(String),
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
    #[error("Invalid chat configuration: {0}")]
    InvalidChatConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chat.history_limit, 25);
        assert_eq!(config.database.url, None);
        assert!(config.auth.uses_dev_secret());
        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_load_without_sources_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config, AppConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_PATH,
                r#"
server:
  port: 9000
chat:
  max_content_length: 140
  subscriber_buffer: 8
"#,
            )?;
            jail.set_env("ROOMCAST_SERVER__PORT", "9100");
            jail.set_env("ROOMCAST_DATABASE__URL", "postgres://chat@db:5432/roomcast");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.server.host, "127.0.0.1");
            assert_eq!(config.chat.max_content_length, 140);
            assert_eq!(config.chat.subscriber_buffer, 8);
            assert_eq!(config.chat.history_limit, 25);
            assert_eq!(
                config.database.url.as_deref(),
                Some("postgres://chat@db:5432/roomcast")
            );
            Ok(())
        });
    }

    #[test]
    fn test_custom_config_path() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "auth:\n  token_ttl_hours: 2\n")?;
            jail.set_env(CONFIG_PATH_ENV, "custom.yaml");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.auth.token_ttl_hours, 2);
            Ok(())
        });
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "short".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidJwtSecret(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_chat_limits() {
        let mut config = AppConfig::default();
        config.chat.subscriber_buffer = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChatConfig(_))
        ));

        let mut config = AppConfig::default();
        config.chat.history_limit = 200;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidChatConfig(_))
        ));
    }

    #[test]
    fn test_load_reports_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("ROOMCAST_CHAT__HISTORY_LIMIT", "0");
            assert!(matches!(
                AppConfig::load(),
                Err(ConfigError::InvalidChatConfig(_))
            ));
            Ok(())
        });
    }
}
