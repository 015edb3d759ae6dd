//! Verification session store.
//!
//! The OTP flow only talks to [`VerificationSessionStore`]. The shipped
//! implementation keeps sessions in the relational database so that every
//! service instance sees the same sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use civicdesk_common::AppResult;
use civicdesk_db::{entities::verification_session, repositories::VerificationSessionRepository};
use std::sync::Arc;

/// Storage for one-time-code sessions.
///
/// The conditional operations must be atomic with respect to concurrent
/// callers: exactly one caller may observe `true` for a given transition.
#[async_trait]
pub trait VerificationSessionStore: Send + Sync {
    /// Fetch a session by ID.
    async fn get(&self, id: &str) -> AppResult<Option<verification_session::Model>>;

    /// Store a new session.
    async fn put(
        &self,
        session: verification_session::ActiveModel,
    ) -> AppResult<verification_session::Model>;

    /// Remove a session. Returns whether it existed.
    async fn delete(&self, id: &str) -> AppResult<bool>;

    /// Remove every session expired at `now`. Returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Count a failed attempt unless `max_attempts` is already reached.
    async fn record_failed_attempt(&self, id: &str, max_attempts: i32) -> AppResult<bool>;

    /// Flip an unverified session to verified and bind `token_hash` to it.
    async fn mark_verified(
        &self,
        id: &str,
        token_hash: &str,
        verified_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Look up a verified session by token digest.
    async fn find_by_token(&self, token_hash: &str)
    -> AppResult<Option<verification_session::Model>>;

    /// Remove a verified session carrying `token_hash`.
    async fn take_verified(&self, id: &str, token_hash: &str) -> AppResult<bool>;
}

/// Database-backed session store.
#[derive(Clone)]
pub struct DbSessionStore {
    repo: VerificationSessionRepository,
}

impl DbSessionStore {
    /// Create a new database-backed store.
    #[must_use]
    pub const fn new(repo: VerificationSessionRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl VerificationSessionStore for DbSessionStore {
    async fn get(&self, id: &str) -> AppResult<Option<verification_session::Model>> {
        self.repo.find_by_id(id).await
    }

    async fn put(
        &self,
        session: verification_session::ActiveModel,
    ) -> AppResult<verification_session::Model> {
        self.repo.create(session).await
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        Ok(self.repo.delete(id).await? > 0)
    }

    async fn sweep(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.repo.delete_expired(now).await
    }

    async fn record_failed_attempt(&self, id: &str, max_attempts: i32) -> AppResult<bool> {
        Ok(self.repo.increment_attempts(id, max_attempts).await? > 0)
    }

    async fn mark_verified(
        &self,
        id: &str,
        token_hash: &str,
        verified_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        Ok(self.repo.mark_verified(id, token_hash, verified_at).await? > 0)
    }

    async fn find_by_token(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<verification_session::Model>> {
        self.repo.find_verified_by_token_hash(token_hash).await
    }

    async fn take_verified(&self, id: &str, token_hash: &str) -> AppResult<bool> {
        Ok(self.repo.delete_redeemed(id, token_hash).await? > 0)
    }
}

/// Shared session store handle.
pub type SessionStoreService = Arc<dyn VerificationSessionStore>;
