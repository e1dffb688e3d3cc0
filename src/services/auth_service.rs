//! 认证服务：登录、注册、令牌刷新、登出

use crate::{
    auth::{
        claims::PrincipalId,
        jwt::{TokenIssuer, TokenPair, TokenValidator},
        password::PasswordHasher,
        refresh_store::{RefreshRecord, RefreshTokenStore},
    },
    config::SecurityConfig,
    error::AppError,
    models::{
        auth::{LoginRequest, LoginResponse, RefreshTokenRequest, SignupRequest, SignupResponse},
        user::NewUser,
    },
    repository::UserStore,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use validator::Validate;

/// 未知用户登录时参与校验的占位密码，使两条失败路径耗时一致
const DUMMY_PASSWORD: &str = "lending-catalog-dummy-password";

pub struct AuthService {
    users: Arc<dyn UserStore>,
    issuer: Arc<TokenIssuer>,
    validator: Arc<TokenValidator>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    hasher: PasswordHasher,
    password_min_length: usize,
    default_role: String,
    dummy_hash: String,
}

impl AuthService {
    /// 构建服务并预先计算占位哈希，首次未知用户登录不额外付出哈希开销
    pub fn new(
        users: Arc<dyn UserStore>,
        issuer: Arc<TokenIssuer>,
        validator: Arc<TokenValidator>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        hasher: PasswordHasher,
        security: &SecurityConfig,
    ) -> Result<Self, AppError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;

        Ok(Self {
            users,
            issuer,
            validator,
            refresh_tokens,
            hasher,
            password_min_length: security.password_min_length,
            default_role: security.default_role.clone(),
            dummy_hash,
        })
    }

    /// 用户登录
    ///
    /// 用户不存在与密码错误返回同一个 `InvalidCredential`。
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let principal = PrincipalId(req.id);

        let user = match self.users.find_by_id(principal).await? {
            Some(user) => user,
            None => {
                self.verify_password(req.pass, self.dummy_hash.clone()).await?;
                record_login(principal, "unknown_principal");
                return Err(AppError::InvalidCredential);
            }
        };

        if !self.verify_password(req.pass, user.password_hash.clone()).await? {
            record_login(principal, "password_mismatch");
            return Err(AppError::InvalidCredential);
        }

        let pair = self.issue_pair(user.principal_id(), role_claim(&user.role)).await?;
        record_login(principal, "success");

        Ok(LoginResponse::from(pair))
    }

    /// 用户注册
    pub async fn signup(&self, req: SignupRequest) -> Result<SignupResponse, AppError> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, self.password_min_length)?;

        let password_hash = self.hash_password(req.password).await?;

        let user = self
            .users
            .create(NewUser {
                first_name: req.first_name,
                last_name: req.last_name,
                email: req.email,
                password_hash,
                role: self.default_role.clone(),
            })
            .await?;

        let pair = self.issue_pair(user.principal_id(), role_claim(&user.role)).await?;

        tracing::info!(user_id = user.id, "User signed up");

        Ok(SignupResponse {
            user_id: user.id,
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
        })
    }

    /// 刷新令牌
    ///
    /// 旧刷新令牌被消费后立即失效（轮换），同一令牌最多兑换一次。
    pub async fn refresh_token(&self, req: RefreshTokenRequest) -> Result<LoginResponse, AppError> {
        let claims = self.validator.verify_refresh(&req.refresh_token).map_err(|e| {
            tracing::debug!(reason = %e, "Rejected refresh token");
            AppError::Unauthorized
        })?;

        let record = self
            .refresh_tokens
            .consume(&claims.jti, Utc::now())
            .await
            .ok_or_else(|| {
                tracing::warn!(user_id = %claims.sub, "Refresh token reused or unknown");
                AppError::Unauthorized
            })?;

        if record.subject != claims.sub {
            tracing::warn!(user_id = %claims.sub, "Refresh token subject mismatch");
            return Err(AppError::Unauthorized);
        }

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let pair = self.issue_pair(user.principal_id(), role_claim(&user.role)).await?;

        tracing::info!(user_id = user.id, "Refresh token rotated");

        Ok(LoginResponse::from(pair))
    }

    /// 登出（撤销刷新令牌），重复调用不报错
    pub async fn logout(&self, refresh_token: &str, caller: PrincipalId) -> Result<(), AppError> {
        let claims = self.validator.verify_refresh(refresh_token).map_err(|e| {
            tracing::debug!(reason = %e, "Rejected refresh token on logout");
            AppError::Unauthorized
        })?;

        let revoked = self.refresh_tokens.revoke(&claims.jti, caller).await;
        tracing::info!(user_id = %caller, revoked, "User logged out");

        Ok(())
    }

    /// 清理过期的刷新令牌记录
    pub async fn purge_expired_refresh_tokens(&self) -> usize {
        self.refresh_tokens.purge_expired(Utc::now()).await
    }

    async fn issue_pair(
        &self,
        subject: PrincipalId,
        extra: Map<String, Value>,
    ) -> Result<TokenPair, AppError> {
        let pair = self.issuer.issue_token_pair(subject, extra)?;

        self.refresh_tokens
            .register(
                &pair.refresh.jti,
                RefreshRecord {
                    subject,
                    expires_at: pair.refresh.expires_at,
                },
            )
            .await;

        Ok(pair)
    }

    // Argon2 是 CPU 密集型操作，放到阻塞线程池执行
    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::internal(format!("password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::internal(format!("password verification task failed: {}", e)))
    }
}

fn role_claim(role: &str) -> Map<String, Value> {
    let mut extra = Map::new();
    extra.insert("role".to_string(), Value::String(role.to_string()));
    extra
}

fn record_login(principal: PrincipalId, outcome: &'static str) {
    metrics::counter!("auth_login_attempts_total", "outcome" => outcome).increment(1);

    if outcome == "success" {
        tracing::info!(user_id = %principal, "login_success");
    } else {
        tracing::info!(user_id = %principal, reason = outcome, "login_failure");
    }
}
