//! Refresh token rotation store
//!
//! Every issued refresh token is registered by its `jti`. Redeeming removes
//! the entry atomically, so a refresh token can be exchanged at most once.

use crate::auth::claims::PrincipalId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Registered refresh token metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshRecord {
    pub subject: PrincipalId,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Record a newly issued refresh token.
    async fn register(&self, jti: &str, record: RefreshRecord);

    /// Remove and return the record for `jti` if it is still live.
    ///
    /// Concurrent calls with the same `jti` succeed for at most one caller.
    async fn consume(&self, jti: &str, now: DateTime<Utc>) -> Option<RefreshRecord>;

    /// Revoke the token if it belongs to `subject`. Returns whether a record was removed.
    async fn revoke(&self, jti: &str, subject: PrincipalId) -> bool;

    /// Drop expired records. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

/// Process-local store. Outstanding refresh tokens do not survive a restart.
#[derive(Default)]
pub struct InMemoryRefreshStore {
    records: DashMap<String, RefreshRecord>,
}

impl InMemoryRefreshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshStore {
    async fn register(&self, jti: &str, record: RefreshRecord) {
        self.records.insert(jti.to_string(), record);
    }

    async fn consume(&self, jti: &str, now: DateTime<Utc>) -> Option<RefreshRecord> {
        let (_, record) = self.records.remove(jti)?;
        (record.expires_at > now).then_some(record)
    }

    async fn revoke(&self, jti: &str, subject: PrincipalId) -> bool {
        self.records.remove_if(jti, |_, record| record.subject == subject).is_some()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.expires_at > now);
        before.saturating_sub(self.records.len())
    }
}
