//! Verification session entity.
//!
//! A short-lived one-time-code session proving control of an email address.
//! The code and the verification token are stored as digests only.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What a verified identity may be used for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationPurpose {
    /// Filing a complaint without an account.
    #[sea_orm(string_value = "complaint_submission")]
    ComplaintSubmission,
    /// Tracking a previously filed complaint.
    #[sea_orm(string_value = "complaint_tracking")]
    ComplaintTracking,
}

impl VerificationPurpose {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ComplaintSubmission => "complaint_submission",
            Self::ComplaintTracking => "complaint_tracking",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "verification_session")]
pub struct Model {
    /// Opaque, unguessable session identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Email address the code was sent to, stored lowercase
    pub email: String,

    /// SHA-256 digest of the one-time code
    #[serde(skip_serializing)]
    pub code_hash: String,

    pub purpose: VerificationPurpose,

    pub attempt_count: i32,

    #[sea_orm(default_value = false)]
    pub verified: bool,

    /// SHA-256 digest of the verification token, set once verified
    #[sea_orm(unique, nullable)]
    #[serde(skip_serializing)]
    pub token_hash: Option<String>,

    #[sea_orm(nullable)]
    pub verified_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    /// Always `created_at` + the configured TTL
    pub expires_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the session is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTimeWithTimeZone) -> bool {
        now >= self.expires_at
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
