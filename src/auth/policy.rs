//! Session policy: the immutable settings shared by token issuance and validation

use crate::{config::AppConfig, error::AppError};
use chrono::Duration;
use jsonwebtoken::Algorithm;
use secrecy::{ExposeSecret, Secret};

/// Signing secrets, lifetimes and issuer name.
///
/// Built once at startup and shared read-only; every token operation takes
/// its settings from here rather than from the environment.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    access_secret: Secret<String>,
    refresh_secret: Secret<String>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    issuer: String,
}

impl SessionPolicy {
    /// The only algorithm tokens are signed with or accepted under.
    pub const ALGORITHM: Algorithm = Algorithm::HS256;

    /// Create a policy whose refresh tokens share the access secret.
    ///
    /// # Errors
    /// `AppError::Config` when a secret is empty, a TTL is not positive or
    /// the refresh TTL does not exceed the access TTL.
    pub fn new(
        secret: Secret<String>,
        issuer: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, AppError> {
        let refresh_secret = Secret::new(secret.expose_secret().clone());
        Self::with_refresh_secret(secret, refresh_secret, issuer, access_ttl, refresh_ttl)
    }

    pub fn with_refresh_secret(
        access_secret: Secret<String>,
        refresh_secret: Secret<String>,
        issuer: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, AppError> {
        if access_secret.expose_secret().is_empty() {
            return Err(AppError::Config("access token secret must not be empty".to_string()));
        }
        if refresh_secret.expose_secret().is_empty() {
            return Err(AppError::Config("refresh token secret must not be empty".to_string()));
        }
        if access_ttl <= Duration::zero() {
            return Err(AppError::Config("access token TTL must be positive".to_string()));
        }
        if refresh_ttl <= access_ttl {
            return Err(AppError::Config(
                "refresh token TTL must exceed access token TTL".to_string(),
            ));
        }

        Ok(Self {
            access_secret,
            refresh_secret,
            access_ttl,
            refresh_ttl,
            issuer: issuer.into(),
        })
    }

    /// Build the policy from loaded application config.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let security = &config.security;
        let access_secret = security.jwt_secret.clone();
        let refresh_secret = security
            .jwt_refresh_secret
            .clone()
            .unwrap_or_else(|| Secret::new(access_secret.expose_secret().clone()));

        Self::with_refresh_secret(
            access_secret,
            refresh_secret,
            security.issuer.clone(),
            ttl_from_secs(security.access_token_exp_secs, "access_token_exp_secs")?,
            ttl_from_secs(security.effective_refresh_token_exp_secs(), "refresh_token_exp_secs")?,
        )
    }

    pub fn access_secret(&self) -> &Secret<String> {
        &self.access_secret
    }

    pub fn refresh_secret(&self) -> &Secret<String> {
        &self.refresh_secret
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

fn ttl_from_secs(secs: u64, name: &str) -> Result<Duration, AppError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| AppError::Config(format!("{} is out of range", name)))
}
