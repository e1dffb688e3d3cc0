//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// 令牌有效期上限（秒），十年
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
    /// 请求体大小上限（字节）
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 访问令牌签名密钥
    pub jwt_secret: Secret<String>,
    /// 刷新令牌签名密钥，未设置时与访问令牌共用
    pub jwt_refresh_secret: Option<Secret<String>>,
    /// 令牌签发者（iss）
    pub issuer: String,
    /// 访问令牌过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 刷新令牌过期时间（秒），未设置时为访问令牌的 7 倍
    pub refresh_token_exp_secs: Option<u64>,
    /// 密码最小长度
    pub password_min_length: usize,
    /// 登录时写入令牌的默认角色
    pub default_role: String,
}

impl SecurityConfig {
    /// 实际生效的刷新令牌过期时间
    pub fn effective_refresh_token_exp_secs(&self) -> u64 {
        self.refresh_token_exp_secs
            .unwrap_or_else(|| self.access_token_exp_secs.saturating_mul(7))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
}

impl AppConfig {
    /// 从环境变量加载配置（前缀 CATALOG_，层级分隔符 __）
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("server.body_limit_bytes", 1024 * 1024)?
            .set_default("database.url", "postgresql://localhost/lending_catalog")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_secret", "change-this-secret-in-production-min-32-chars!")?
            .set_default("security.issuer", "lending-catalog")?
            .set_default("security.access_token_exp_secs", 72 * 3600)?
            .set_default("security.password_min_length", 8)?
            .set_default("security.default_role", "member")?;

        settings = settings.add_source(
            Environment::with_prefix("CATALOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // HS256 密钥至少 32 字符
        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        if let Some(refresh_secret) = &self.security.jwt_refresh_secret {
            if refresh_secret.expose_secret().len() < 32 {
                return Err(ConfigError::Message(
                    "JWT refresh secret must be at least 32 characters long".to_string(),
                ));
            }
        }

        if self.security.issuer.trim().is_empty() {
            return Err(ConfigError::Message("issuer must not be empty".to_string()));
        }

        if self.security.access_token_exp_secs == 0 {
            return Err(ConfigError::Message(
                "access_token_exp_secs must be greater than 0".to_string(),
            ));
        }

        if self.security.effective_refresh_token_exp_secs() > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Message(format!(
                "token lifetimes must not exceed {} seconds",
                MAX_TOKEN_TTL_SECS
            )));
        }

        if self.security.effective_refresh_token_exp_secs() <= self.security.access_token_exp_secs
        {
            return Err(ConfigError::Message(
                "refresh token lifetime must be longer than access token lifetime".to_string(),
            ));
        }

        if self.security.password_min_length < 6 || self.security.password_min_length > 128 {
            return Err(ConfigError::Message(
                "password_min_length must be between 6 and 128".to_string(),
            ));
        }

        Ok(())
    }
}
