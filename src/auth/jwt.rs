//! JWT token generation and validation
//! Implements access token + refresh token pattern

use crate::{
    auth::{
        claims::{is_reserved, Claims, PrincipalId, TokenKind},
        policy::SessionPolicy,
    },
    error::AppError,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

/// A freshly signed token with the metadata the caller needs to track it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub subject: PrincipalId,
    pub expires_at: DateTime<Utc>,
}

/// Access and refresh tokens issued together for one subject.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    pub expires_in: u64, // seconds until access token expires
}

/// Signs access and refresh tokens under a [`SessionPolicy`].
pub struct TokenIssuer {
    policy: SessionPolicy,
    access_key: EncodingKey,
    refresh_key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(policy: &SessionPolicy) -> Self {
        Self {
            access_key: EncodingKey::from_secret(policy.access_secret().expose_secret().as_bytes()),
            refresh_key: EncodingKey::from_secret(
                policy.refresh_secret().expose_secret().as_bytes(),
            ),
            policy: policy.clone(),
        }
    }

    /// Generate access token
    ///
    /// `extra` is merged into the payload; entries named like a reserved
    /// claim are dropped.
    pub fn issue_access_token(
        &self,
        subject: PrincipalId,
        extra: Map<String, Value>,
    ) -> Result<IssuedToken, AppError> {
        self.issue_access_token_at(subject, extra, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        subject: PrincipalId,
        extra: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        self.sign(TokenKind::Access, subject, extra, now)
    }

    /// Generate refresh token
    pub fn issue_refresh_token(&self, subject: PrincipalId) -> Result<IssuedToken, AppError> {
        self.issue_refresh_token_at(subject, Utc::now())
    }

    pub fn issue_refresh_token_at(
        &self,
        subject: PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        self.sign(TokenKind::Refresh, subject, Map::new(), now)
    }

    /// Generate access token + refresh token
    pub fn issue_token_pair(
        &self,
        subject: PrincipalId,
        extra: Map<String, Value>,
    ) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        Ok(TokenPair {
            access: self.issue_access_token_at(subject, extra, now)?,
            refresh: self.issue_refresh_token_at(subject, now)?,
            expires_in: self.expires_in_secs(),
        })
    }

    /// Access TTL in seconds, reported to clients as `expires_in`.
    pub fn expires_in_secs(&self) -> u64 {
        self.policy.access_ttl().num_seconds().max(0) as u64
    }

    fn sign(
        &self,
        kind: TokenKind,
        subject: PrincipalId,
        mut extra: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let (key, ttl) = match kind {
            TokenKind::Access => (&self.access_key, self.policy.access_ttl()),
            TokenKind::Refresh => (&self.refresh_key, self.policy.refresh_ttl()),
        };

        let dropped: Vec<String> = extra.keys().filter(|k| is_reserved(k)).cloned().collect();
        if !dropped.is_empty() {
            tracing::debug!(?dropped, "Ignoring reserved keys in extra claims");
            extra.retain(|k, _| !is_reserved(k));
        }

        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            tracing::error!(
                token_type = kind.as_str(),
                ttl_secs = ttl.num_seconds(),
                "Token expiry overflowed"
            );
            AppError::internal(format!("{} token expiry out of range", kind.as_str()))
        })?;
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: subject,
            iss: self.policy.issuer().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: jti.clone(),
            kind,
            extra,
        };

        let token = encode(&Header::new(SessionPolicy::ALGORITHM), &claims.into_map(), key)
            .map_err(|e| {
                tracing::error!("Failed to encode {} token: {:?}", kind.as_str(), e);
                AppError::internal(format!("failed to encode {} token", kind.as_str()))
            })?;

        Ok(IssuedToken {
            token,
            jti,
            subject,
            expires_at,
        })
    }
}

/// Verifies tokens issued under a [`SessionPolicy`].
///
/// Validation is a pure function of the token, the configured secrets and
/// the current time; it performs no I/O.
pub struct TokenValidator {
    issuer: String,
    access_key: DecodingKey,
    refresh_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(policy: &SessionPolicy) -> Self {
        // Only the signature and the pinned algorithm are checked by
        // jsonwebtoken; reserved claims are checked against our own clock.
        let mut validation = Validation::new(SessionPolicy::ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::new();

        Self {
            issuer: policy.issuer().to_string(),
            access_key: DecodingKey::from_secret(policy.access_secret().expose_secret().as_bytes()),
            refresh_key: DecodingKey::from_secret(
                policy.refresh_secret().expose_secret().as_bytes(),
            ),
            validation,
        }
    }

    /// Validate an access token and return its subject.
    pub fn validate(&self, token: &str) -> Result<PrincipalId, AppError> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<PrincipalId, AppError> {
        Ok(self.verify_at(token, TokenKind::Access, now)?.sub)
    }

    /// Validate access token specifically
    pub fn verify_access(&self, token: &str) -> Result<Claims, AppError> {
        self.verify_at(token, TokenKind::Access, Utc::now())
    }

    /// Validate refresh token specifically
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        self.verify_at(token, TokenKind::Refresh, Utc::now())
    }

    /// Verify signature, algorithm, issuer, kind and expiry, in that order.
    pub fn verify_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, AppError> {
        let key = match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        };

        let data = decode::<Map<String, Value>>(token, key, &self.validation).map_err(|e| {
            tracing::debug!(reason = ?e.kind(), "Token validation failed");
            AppError::Unauthorized
        })?;

        let claims = Claims::from_map(data.claims)?;

        if claims.iss != self.issuer {
            tracing::debug!(iss = %claims.iss, "Token issuer mismatch");
            return Err(AppError::Unauthorized);
        }

        if claims.kind != kind {
            tracing::debug!(
                expected = kind.as_str(),
                actual = claims.kind.as_str(),
                "Token type mismatch"
            );
            return Err(AppError::Unauthorized);
        }

        if claims.exp <= now.timestamp() {
            tracing::debug!(sub = %claims.sub, exp = claims.exp, "Token expired");
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }
}
