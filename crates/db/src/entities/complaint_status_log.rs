//! Complaint status log entity.
//!
//! Append-only. Rows are written in the same transaction as the complaint
//! update they describe and never modified afterwards.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::complaint::ComplaintStatus;

/// Kind of lifecycle event recorded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusLogType {
    /// Complaint created.
    #[sea_orm(string_value = "registration")]
    Registration,
    #[sea_orm(string_value = "assignment")]
    Assignment,
    #[sea_orm(string_value = "status_update")]
    StatusUpdate,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "complaint_status_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub complaint_id: String,

    /// Position in the complaint's history, contiguous from 1
    pub sequence: i32,

    pub entry_type: StatusLogType,

    /// NULL for guest or system generated entries
    #[sea_orm(nullable)]
    pub actor_id: Option<String>,

    #[sea_orm(nullable)]
    pub from_status: Option<ComplaintStatus>,

    pub to_status: ComplaintStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::complaint::Entity",
        from = "Column::ComplaintId",
        to = "super::complaint::Column::Id",
        on_delete = "Cascade"
    )]
    Complaint,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ActorId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Actor,
}

impl Related<super::complaint::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Complaint.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
