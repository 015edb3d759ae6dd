//! Complaint entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Complaint priority. Fixes the SLA window at creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

/// Complaint lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    #[sea_orm(string_value = "registered")]
    Registered,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "reopened")]
    Reopened,
}

impl ComplaintStatus {
    /// Stable lowercase name, as stored.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
        }
    }

    /// Resolved or closed: work on the complaint has finished.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "complaint")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Human-readable number, `PREFIX-YEAR-NNN`
    #[sea_orm(unique)]
    pub complaint_number: String,

    pub complaint_type: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub priority: ComplaintPriority,

    pub status: ComplaintStatus,

    // Location
    pub ward: String,
    #[sea_orm(nullable)]
    pub area: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub address: Option<String>,
    #[sea_orm(nullable)]
    pub latitude: Option<f64>,
    #[sea_orm(nullable)]
    pub longitude: Option<f64>,

    // Contact
    #[sea_orm(nullable)]
    pub contact_name: Option<String>,
    /// Stored lowercase
    pub contact_email: String,
    #[sea_orm(nullable)]
    pub contact_phone: Option<String>,

    /// NULL = filed by a guest
    #[sea_orm(nullable)]
    pub submitted_by_id: Option<String>,

    #[sea_orm(nullable)]
    pub assigned_to_id: Option<String>,
    #[sea_orm(nullable)]
    pub assigned_at: Option<DateTimeWithTimeZone>,

    /// Fixed at creation from priority, never recomputed
    pub sla_deadline: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub resolved_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(nullable)]
    pub closed_at: Option<DateTimeWithTimeZone>,

    // Feedback (only after resolution)
    #[sea_orm(nullable)]
    pub feedback_rating: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub feedback_comment: Option<String>,
    #[sea_orm(nullable)]
    pub feedback_at: Option<DateTimeWithTimeZone>,

    /// Optimistic concurrency counter, bumped on every update
    pub version: i32,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SubmittedById",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Submitter,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AssignedToId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Assignee,

    #[sea_orm(has_many = "super::complaint_status_log::Entity")]
    StatusLog,

    #[sea_orm(has_many = "super::complaint_attachment::Entity")]
    Attachments,
}

impl Related<super::complaint_status_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusLog.def()
    }
}

impl Related<super::complaint_attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attachments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
