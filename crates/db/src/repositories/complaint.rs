//! Complaint repository.
//!
//! Complaint writes and their status log entries share one transaction.
//! Updates are guarded by the `version` column: a write based on a stale
//! snapshot affects no rows and surfaces as [`AppError::Conflict`].

use std::sync::Arc;

use crate::entities::{
    Complaint, ComplaintAttachment, ComplaintSequence, ComplaintStatusLog, complaint,
    complaint::ComplaintStatus, complaint_attachment, complaint_sequence, complaint_status_log,
    complaint_status_log::StatusLogType,
};
use chrono::Utc;
use civicdesk_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};

/// A status log entry to append alongside a complaint write.
#[derive(Debug, Clone)]
pub struct NewStatusLog {
    pub id: String,
    pub entry_type: StatusLogType,
    pub actor_id: Option<String>,
    pub from_status: Option<ComplaintStatus>,
    pub to_status: ComplaintStatus,
    pub comment: Option<String>,
}

/// Listing filter.
///
/// `ward`, `submitted_by_id` and `assigned_to_id` are alternatives: a complaint
/// is visible when it matches any of the ones that are set. With none set the
/// listing is unrestricted. `status` always narrows the result.
#[derive(Debug, Clone, Default)]
pub struct ComplaintQuery {
    pub ward: Option<String>,
    pub submitted_by_id: Option<String>,
    pub assigned_to_id: Option<String>,
    pub status: Option<ComplaintStatus>,
}

/// Complaint repository for database operations.
#[derive(Clone)]
pub struct ComplaintRepository {
    db: Arc<DatabaseConnection>,
}

impl ComplaintRepository {
    /// Create a new complaint repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a complaint by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<complaint::Model>> {
        Complaint::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a complaint by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<complaint::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ComplaintNotFound(id.to_string()))
    }

    /// Find a complaint by its human-readable number.
    pub async fn find_by_number(&self, number: &str) -> AppResult<Option<complaint::Model>> {
        Complaint::find()
            .filter(complaint::Column::ComplaintNumber.eq(number))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a complaint by number, returning an error if not found.
    pub async fn get_by_number(&self, number: &str) -> AppResult<complaint::Model> {
        self.find_by_number(number)
            .await?
            .ok_or_else(|| AppError::ComplaintNotFound(number.to_string()))
    }

    /// Insert a complaint with its registration log entry and attachments.
    ///
    /// The complaint number is allocated from the per-year counter inside the
    /// same transaction, formatted as `PREFIX-YEAR-NNN`. The stored version
    /// starts at 1 and the log entry takes sequence 1.
    pub async fn create_with_log(
        &self,
        number_prefix: &str,
        year: i32,
        mut model: complaint::ActiveModel,
        attachments: Vec<complaint_attachment::ActiveModel>,
        log: NewStatusLog,
    ) -> AppResult<complaint::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let seq = next_sequence(&txn, year)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        model.complaint_number = Set(format_complaint_number(number_prefix, year, seq));
        model.version = Set(1);

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        log_model(&created.id, 1, log)
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for mut attachment in attachments {
            attachment.complaint_id = Set(created.id.clone());
            attachment
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Apply `changes` to `current` if nobody else has written it meanwhile.
    ///
    /// The version is bumped and, when given, `log` is appended right after
    /// the complaint's last log entry. Returns the stored complaint after the
    /// write.
    pub async fn update_with_log(
        &self,
        current: &complaint::Model,
        mut changes: complaint::ActiveModel,
        log: Option<NewStatusLog>,
    ) -> AppResult<complaint::Model> {
        let next_version = current.version + 1;
        changes.version = Set(next_version);
        changes.updated_at = Set(Some(Utc::now().fixed_offset()));

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Complaint::update_many()
            .set(changes)
            .filter(complaint::Column::Id.eq(current.id.as_str()))
            .filter(complaint::Column::Version.eq(current.version))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::Conflict(format!(
                "complaint {} was modified concurrently",
                current.complaint_number
            )));
        }

        if let Some(log) = log {
            let sequence = next_log_sequence(&txn, &current.id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            log_model(&current.id, sequence, log)
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        let updated = Complaint::find_by_id(current.id.as_str())
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::ComplaintNotFound(current.id.clone()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    /// Link a guest complaint to a user account.
    ///
    /// Only takes effect while the complaint has no submitter. Returns the
    /// number of rows updated.
    pub async fn link_submitter(&self, complaint_id: &str, user_id: &str) -> AppResult<u64> {
        Complaint::update_many()
            .col_expr(
                complaint::Column::SubmittedById,
                Expr::value(user_id.to_string()),
            )
            .col_expr(
                complaint::Column::Version,
                Expr::col(complaint::Column::Version).add(1),
            )
            .col_expr(
                complaint::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(complaint::Column::Id.eq(complaint_id))
            .filter(complaint::Column::SubmittedById.is_null())
            .exec(self.db.as_ref())
            .await
            .map(|r| r.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Status log of a complaint, oldest first.
    pub async fn find_status_log(
        &self,
        complaint_id: &str,
    ) -> AppResult<Vec<complaint_status_log::Model>> {
        ComplaintStatusLog::find()
            .filter(complaint_status_log::Column::ComplaintId.eq(complaint_id))
            .order_by_asc(complaint_status_log::Column::Sequence)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Attachments of a complaint.
    pub async fn find_attachments(
        &self,
        complaint_id: &str,
    ) -> AppResult<Vec<complaint_attachment::Model>> {
        ComplaintAttachment::find()
            .filter(complaint_attachment::Column::ComplaintId.eq(complaint_id))
            .order_by_asc(complaint_attachment::Column::CreatedAt)
            .order_by_asc(complaint_attachment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List complaints matching `query`, newest first.
    pub async fn list(
        &self,
        query: &ComplaintQuery,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<complaint::Model>> {
        let mut scope = Condition::any();
        let mut scoped = false;
        if let Some(ward) = &query.ward {
            scope = scope.add(complaint::Column::Ward.eq(ward.as_str()));
            scoped = true;
        }
        if let Some(id) = &query.submitted_by_id {
            scope = scope.add(complaint::Column::SubmittedById.eq(id.as_str()));
            scoped = true;
        }
        if let Some(id) = &query.assigned_to_id {
            scope = scope.add(complaint::Column::AssignedToId.eq(id.as_str()));
            scoped = true;
        }

        let mut select = Complaint::find();
        if scoped {
            select = select.filter(scope);
        }
        if let Some(status) = query.status {
            select = select.filter(complaint::Column::Status.eq(status));
        }

        select
            .order_by_desc(complaint::Column::CreatedAt)
            .order_by_desc(complaint::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// `PREFIX-YEAR-NNN`, with the counter zero-padded to at least three digits.
#[must_use]
pub fn format_complaint_number(prefix: &str, year: i32, seq: i64) -> String {
    format!("{prefix}-{year}-{seq:03}")
}

/// Bump and return the counter for `year`, creating it on first use.
///
/// The update takes a row lock that is held until the surrounding
/// transaction ends, so concurrent allocations serialize.
async fn next_sequence<C: ConnectionTrait>(conn: &C, year: i32) -> Result<i64, DbErr> {
    ComplaintSequence::insert(complaint_sequence::ActiveModel {
        year: Set(year),
        last_value: Set(0),
    })
    .on_conflict(
        OnConflict::column(complaint_sequence::Column::Year)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    ComplaintSequence::update_many()
        .col_expr(
            complaint_sequence::Column::LastValue,
            Expr::col(complaint_sequence::Column::LastValue).add(1),
        )
        .filter(complaint_sequence::Column::Year.eq(year))
        .exec(conn)
        .await?;

    ComplaintSequence::find_by_id(year)
        .one(conn)
        .await?
        .map(|row| row.last_value)
        .ok_or_else(|| DbErr::RecordNotFound(format!("complaint_sequence {year}")))
}

/// Sequence for the next status log entry of `complaint_id`.
///
/// Callers hold the complaint row through the version update, so entries of
/// one complaint are never numbered concurrently.
async fn next_log_sequence<C: ConnectionTrait>(conn: &C, complaint_id: &str) -> Result<i32, DbErr> {
    let last: Option<i32> = ComplaintStatusLog::find()
        .select_only()
        .column_as(complaint_status_log::Column::Sequence.max(), "last")
        .filter(complaint_status_log::Column::ComplaintId.eq(complaint_id))
        .into_tuple::<Option<i32>>()
        .one(conn)
        .await?
        .flatten();
    Ok(last.unwrap_or(0) + 1)
}

fn log_model(complaint_id: &str, sequence: i32, log: NewStatusLog) -> complaint_status_log::ActiveModel {
    complaint_status_log::ActiveModel {
        id: Set(log.id),
        complaint_id: Set(complaint_id.to_string()),
        sequence: Set(sequence),
        entry_type: Set(log.entry_type),
        actor_id: Set(log.actor_id),
        from_status: Set(log.from_status),
        to_status: Set(log.to_status),
        comment: Set(log.comment),
        created_at: Set(Utc::now().fixed_offset()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::complaint::ComplaintPriority;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_complaint(id: &str, status: ComplaintStatus) -> complaint::Model {
        let now = Utc::now();
        complaint::Model {
            id: id.to_string(),
            complaint_number: "CMP-2026-001".to_string(),
            complaint_type: "pothole".to_string(),
            description: "Large pothole near the market".to_string(),
            priority: ComplaintPriority::High,
            status,
            ward: "W1".to_string(),
            area: None,
            address: None,
            latitude: None,
            longitude: None,
            contact_name: None,
            contact_email: "citizen@test.com".to_string(),
            contact_phone: None,
            submitted_by_id: None,
            assigned_to_id: None,
            assigned_at: None,
            sla_deadline: (now + Duration::hours(48)).into(),
            resolved_at: None,
            closed_at: None,
            feedback_rating: None,
            feedback_comment: None,
            feedback_at: None,
            version: 1,
            created_at: now.into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_format_complaint_number() {
        assert_eq!(format_complaint_number("CMP", 2026, 1), "CMP-2026-001");
        assert_eq!(format_complaint_number("CMP", 2026, 42), "CMP-2026-042");
        assert_eq!(format_complaint_number("RD", 2027, 1234), "RD-2027-1234");
    }

    #[tokio::test]
    async fn test_get_by_number_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<complaint::Model>::new()])
                .into_connection(),
        );

        let repo = ComplaintRepository::new(db);
        match repo.get_by_number("CMP-2026-999").await {
            Err(AppError::ComplaintNotFound(n)) => assert_eq!(n, "CMP-2026-999"),
            other => panic!("Expected ComplaintNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let current = create_test_complaint("c1", ComplaintStatus::Registered);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = ComplaintRepository::new(db);
        let changes = complaint::ActiveModel {
            status: Set(ComplaintStatus::InProgress),
            ..Default::default()
        };

        let result = repo.update_with_log(&current, changes, None).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_returns_rows() {
        let a = create_test_complaint("c1", ComplaintStatus::Registered);
        let b = create_test_complaint("c2", ComplaintStatus::Assigned);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[a, b]])
                .into_connection(),
        );

        let repo = ComplaintRepository::new(db);
        let query = ComplaintQuery {
            ward: Some("W1".to_string()),
            ..Default::default()
        };
        let rows = repo.list(&query, 20, 0).await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
