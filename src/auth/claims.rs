//! Token claims and subject decoding

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Claim keys computed by the issuer. Caller-supplied extras never override them.
pub const RESERVED_CLAIMS: [&str; 6] = ["sub", "iss", "iat", "exp", "jti", "token_type"];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_CLAIMS.contains(&key)
}

/// Identifier of a principal (user) as carried in the `sub` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub i64);

impl PrincipalId {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PrincipalId {
    fn from(id: i64) -> Self {
        PrincipalId(id)
    }
}

/// Decode a `sub` claim value.
///
/// Integers, integral floats and decimal strings all map to the same id;
/// anything else, including non-positive ids, is a `MalformedClaim`.
impl TryFrom<&Value> for PrincipalId {
    type Error = AppError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let id = match value {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        };

        match id {
            Some(id) if id > 0 => Ok(PrincipalId(id)),
            _ => Err(AppError::MalformedClaim(format!("undecodable subject: {}", value))),
        }
    }
}

/// Kind of token, stored in the `token_type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "access" => Some(TokenKind::Access),
            "refresh" => Some(TokenKind::Refresh),
            _ => None,
        }
    }
}

/// A verified claim set.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub sub: PrincipalId,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub kind: TokenKind,
    /// Non-reserved claims, e.g. `role`.
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Serialize into the flat claim map that forms the token payload.
    ///
    /// `sub` is written as a string, per RFC 7519.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map: Map<String, Value> =
            self.extra.into_iter().filter(|(k, _)| !is_reserved(k)).collect();

        map.insert("sub".to_string(), Value::String(self.sub.to_string()));
        map.insert("iss".to_string(), Value::String(self.iss));
        map.insert("iat".to_string(), Value::from(self.iat));
        map.insert("exp".to_string(), Value::from(self.exp));
        map.insert("jti".to_string(), Value::String(self.jti));
        map.insert("token_type".to_string(), Value::String(self.kind.as_str().to_string()));
        map
    }

    /// Read a decoded payload back into typed claims.
    ///
    /// # Errors
    /// `MalformedClaim` for a missing or undecodable subject, `Unauthorized`
    /// for any other missing or mistyped reserved claim.
    pub fn from_map(mut map: Map<String, Value>) -> Result<Self, AppError> {
        let sub = map
            .remove("sub")
            .ok_or_else(|| AppError::MalformedClaim("missing subject".to_string()))?;
        let sub = PrincipalId::try_from(&sub)?;

        let iss = take_string(&mut map, "iss")?;
        let iat = take_timestamp(&mut map, "iat")?;
        let exp = take_timestamp(&mut map, "exp")?;
        let jti = take_string(&mut map, "jti")?;
        let kind = take_string(&mut map, "token_type")?;
        let kind = TokenKind::parse(&kind).ok_or_else(|| {
            tracing::debug!(token_type = %kind, "Unknown token type");
            AppError::Unauthorized
        })?;

        Ok(Self {
            sub,
            iss,
            iat,
            exp,
            jti,
            kind,
            extra: map,
        })
    }

    /// Convenience accessor for a string-valued extra claim.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Result<String, AppError> {
    match map.remove(key) {
        Some(Value::String(s)) => Ok(s),
        _ => {
            tracing::debug!(claim = key, "Missing or non-string claim");
            Err(AppError::Unauthorized)
        }
    }
}

fn take_timestamp(map: &mut Map<String, Value>, key: &str) -> Result<i64, AppError> {
    let value = map.remove(key);
    value
        .as_ref()
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .ok_or_else(|| {
            tracing::debug!(claim = key, "Missing or non-numeric claim");
            AppError::Unauthorized
        })
}
