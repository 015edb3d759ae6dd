//! Verification session repository.
//!
//! Every state change is a single conditional statement so that concurrent
//! requests on different service instances cannot both win the same
//! transition (two redemptions of one token, attempts past the limit).

use std::sync::Arc;

use crate::entities::{VerificationSession, verification_session};
use civicdesk_common::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    sea_query::Expr,
};

/// Verification session repository for database operations.
#[derive(Clone)]
pub struct VerificationSessionRepository {
    db: Arc<DatabaseConnection>,
}

impl VerificationSessionRepository {
    /// Create a new verification session repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a session by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<verification_session::Model>> {
        VerificationSession::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a verified session by the digest of its token.
    pub async fn find_verified_by_token_hash(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<verification_session::Model>> {
        VerificationSession::find()
            .filter(verification_session::Column::TokenHash.eq(token_hash))
            .filter(verification_session::Column::Verified.eq(true))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new session.
    pub async fn create(
        &self,
        model: verification_session::ActiveModel,
    ) -> AppResult<verification_session::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a session. Returns the number of rows removed.
    pub async fn delete(&self, id: &str) -> AppResult<u64> {
        VerificationSession::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map(|r| r.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count one failed attempt, unless the limit has already been reached.
    ///
    /// Returns the number of rows updated (0 if the session is gone or exhausted).
    pub async fn increment_attempts(&self, id: &str, max_attempts: i32) -> AppResult<u64> {
        VerificationSession::update_many()
            .col_expr(
                verification_session::Column::AttemptCount,
                Expr::col(verification_session::Column::AttemptCount).add(1),
            )
            .filter(verification_session::Column::Id.eq(id))
            .filter(verification_session::Column::Verified.eq(false))
            .filter(verification_session::Column::AttemptCount.lt(max_attempts))
            .exec(self.db.as_ref())
            .await
            .map(|r| r.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark an unverified session as verified and bind a token digest to it.
    ///
    /// Returns the number of rows updated (0 if another request got there first).
    pub async fn mark_verified(
        &self,
        id: &str,
        token_hash: &str,
        verified_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        VerificationSession::update_many()
            .col_expr(verification_session::Column::Verified, Expr::value(true))
            .col_expr(
                verification_session::Column::TokenHash,
                Expr::value(token_hash.to_string()),
            )
            .col_expr(
                verification_session::Column::VerifiedAt,
                Expr::value(verified_at.fixed_offset()),
            )
            .filter(verification_session::Column::Id.eq(id))
            .filter(verification_session::Column::Verified.eq(false))
            .exec(self.db.as_ref())
            .await
            .map(|r| r.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a verified session only if it still carries `token_hash`.
    ///
    /// Exactly one caller observes `1` for a given token.
    pub async fn delete_redeemed(&self, id: &str, token_hash: &str) -> AppResult<u64> {
        VerificationSession::delete_many()
            .filter(verification_session::Column::Id.eq(id))
            .filter(verification_session::Column::TokenHash.eq(token_hash))
            .filter(verification_session::Column::Verified.eq(true))
            .exec(self.db.as_ref())
            .await
            .map(|r| r.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every session whose expiry is at or before `now`.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        VerificationSession::delete_many()
            .filter(verification_session::Column::ExpiresAt.lte(now.fixed_offset()))
            .exec(self.db.as_ref())
            .await
            .map(|r| r.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
