//! Complaint lifecycle: assignment, status transitions, feedback and reads.
//!
//! Every mutation is checked by the authorizer first, then written together
//! with its status log entry against the version that was read. Notices go
//! out after the write commits.

use crate::services::authorizer::{Action, Actor, authorize};
use crate::services::notification::{Notice, NotificationDispatcherService, dispatch_all};
use crate::services::sla::{SlaStatus, sla_status};
use chrono::{DateTime, Utc};
use civicdesk_common::{AppError, AppResult, IdGenerator};
use civicdesk_db::{
    entities::{
        complaint::{self, ComplaintStatus},
        complaint_attachment, complaint_status_log,
        complaint_status_log::StatusLogType,
        notification::NotificationType,
        user::UserRole,
    },
    repositories::{ComplaintQuery, ComplaintRepository, NewStatusLog, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

/// Whether a complaint may move from `from` to `to`.
///
/// The only way back from `RESOLVED` or `CLOSED` is through `REOPENED`.
#[must_use]
pub const fn is_allowed_transition(from: ComplaintStatus, to: ComplaintStatus) -> bool {
    use civicdesk_db::entities::complaint::ComplaintStatus::{
        Assigned, Closed, InProgress, Registered, Reopened, Resolved,
    };

    matches!(
        (from, to),
        (Registered, Assigned | InProgress | Closed)
            | (Assigned, InProgress | Resolved | Closed)
            | (InProgress, Resolved | Closed)
            | (Resolved, Closed | Reopened)
            | (Closed, Reopened)
            | (Reopened, Assigned | InProgress | Closed)
    )
}

/// Citizen feedback on a finished complaint.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// Listing options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintListFilter {
    pub status: Option<ComplaintStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// A complaint with its derived SLA status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintSummary {
    pub complaint: complaint::Model,
    pub sla_status: SlaStatus,
}

/// A complaint with everything recorded against it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintDetail {
    pub complaint: complaint::Model,
    pub sla_status: SlaStatus,
    pub status_log: Vec<complaint_status_log::Model>,
    pub attachments: Vec<complaint_attachment::Model>,
}

/// Derived SLA status of a stored complaint at `now`.
#[must_use]
pub fn current_sla_status(complaint: &complaint::Model, now: DateTime<Utc>) -> SlaStatus {
    sla_status(
        complaint.status,
        complaint.created_at.with_timezone(&Utc),
        complaint.sla_deadline.with_timezone(&Utc),
        now,
    )
}

/// Complaint state machine.
#[derive(Clone)]
pub struct ComplaintService {
    complaint_repo: ComplaintRepository,
    user_repo: UserRepository,
    dispatcher: NotificationDispatcherService,
    id_gen: IdGenerator,
}

impl ComplaintService {
    /// Create a new complaint service.
    #[must_use]
    pub const fn new(
        complaint_repo: ComplaintRepository,
        user_repo: UserRepository,
        dispatcher: NotificationDispatcherService,
    ) -> Self {
        Self {
            complaint_repo,
            user_repo,
            dispatcher,
            id_gen: IdGenerator::new(),
        }
    }

    /// Assign a complaint to a staff member.
    ///
    /// Allowed while the complaint is not resolved or closed. A registered or
    /// reopened complaint moves to `ASSIGNED`; otherwise its status is kept.
    pub async fn assign(
        &self,
        complaint_id: &str,
        assignee_id: &str,
        actor: &Actor,
    ) -> AppResult<complaint::Model> {
        let current = self.complaint_repo.get_by_id(complaint_id).await?;
        authorize(actor, Action::Assign, &current)?;

        if current.status.is_completed() {
            return Err(AppError::InvalidTransition {
                from: current.status.to_string(),
                to: ComplaintStatus::Assigned.to_string(),
            });
        }

        let assignee = self.user_repo.get_by_id(assignee_id).await?;
        if !assignee.is_active || !assignee.role.is_staff() {
            return Err(AppError::BadRequest(
                "complaints can only be assigned to active staff".to_string(),
            ));
        }

        let next_status = match current.status {
            ComplaintStatus::Registered | ComplaintStatus::Reopened => ComplaintStatus::Assigned,
            other => other,
        };

        let changes = complaint::ActiveModel {
            assigned_to_id: Set(Some(assignee.id.clone())),
            assigned_at: Set(Some(Utc::now().fixed_offset())),
            status: Set(next_status),
            ..Default::default()
        };
        let log = NewStatusLog {
            id: self.id_gen.generate(),
            entry_type: StatusLogType::Assignment,
            actor_id: Some(actor.id.clone()),
            from_status: Some(current.status),
            to_status: next_status,
            comment: None,
        };

        let updated = self
            .complaint_repo
            .update_with_log(&current, changes, Some(log))
            .await?;

        info!(
            complaint_id = %updated.id,
            actor_id = %actor.id,
            assignee_id = %assignee.id,
            "Complaint assigned"
        );

        dispatch_all(
            self.dispatcher.as_ref(),
            vec![Notice {
                recipient_id: assignee.id,
                notification_type: NotificationType::ComplaintAssigned,
                title: format!("Complaint {} assigned to you", updated.complaint_number),
                message: format!(
                    "{} in ward {} is now yours to handle.",
                    updated.complaint_type, updated.ward
                ),
                complaint_id: Some(updated.id.clone()),
                data: json!({
                    "complaintNumber": updated.complaint_number,
                    "priority": updated.priority,
                    "slaDeadline": updated.sla_deadline,
                }),
            }],
        )
        .await;

        Ok(updated)
    }

    /// Move a complaint to `new_status`.
    ///
    /// `resolved_at` and `closed_at` are stamped the first time the complaint
    /// reaches that status and kept across reopenings.
    pub async fn change_status(
        &self,
        complaint_id: &str,
        new_status: ComplaintStatus,
        actor: &Actor,
        comment: Option<String>,
    ) -> AppResult<complaint::Model> {
        let current = self.complaint_repo.get_by_id(complaint_id).await?;
        authorize(actor, Action::UpdateStatus, &current)?;

        if !is_allowed_transition(current.status, new_status) {
            return Err(AppError::InvalidTransition {
                from: current.status.to_string(),
                to: new_status.to_string(),
            });
        }

        let now = Utc::now().fixed_offset();
        let mut changes = complaint::ActiveModel {
            status: Set(new_status),
            ..Default::default()
        };
        if new_status == ComplaintStatus::Resolved && current.resolved_at.is_none() {
            changes.resolved_at = Set(Some(now));
        }
        if new_status == ComplaintStatus::Closed && current.closed_at.is_none() {
            changes.closed_at = Set(Some(now));
        }

        let log = NewStatusLog {
            id: self.id_gen.generate(),
            entry_type: StatusLogType::StatusUpdate,
            actor_id: Some(actor.id.clone()),
            from_status: Some(current.status),
            to_status: new_status,
            comment: comment.clone(),
        };

        let updated = self
            .complaint_repo
            .update_with_log(&current, changes, Some(log))
            .await?;

        info!(
            complaint_id = %updated.id,
            actor_id = %actor.id,
            from = current.status.as_str(),
            to = new_status.as_str(),
            "Complaint status changed"
        );

        if let Some(submitter_id) = updated.submitted_by_id.clone() {
            let mut message = format!(
                "Your complaint {} is now {}.",
                updated.complaint_number, new_status
            );
            if let Some(comment) = &comment {
                message.push(' ');
                message.push_str(comment);
            }

            dispatch_all(
                self.dispatcher.as_ref(),
                vec![Notice {
                    recipient_id: submitter_id,
                    notification_type: NotificationType::StatusUpdated,
                    title: format!("Complaint {} updated", updated.complaint_number),
                    message,
                    complaint_id: Some(updated.id.clone()),
                    data: json!({
                        "complaintNumber": updated.complaint_number,
                        "fromStatus": current.status,
                        "toStatus": new_status,
                    }),
                }],
            )
            .await;
        }

        Ok(updated)
    }

    /// Record the submitter's feedback on a resolved or closed complaint.
    ///
    /// Replaces any earlier feedback.
    pub async fn submit_feedback(
        &self,
        complaint_id: &str,
        input: FeedbackInput,
        actor: &Actor,
    ) -> AppResult<complaint::Model> {
        input.validate()?;

        let current = self.complaint_repo.get_by_id(complaint_id).await?;
        authorize(actor, Action::SubmitFeedback, &current)?;

        if current.submitted_by_id.as_deref() != Some(actor.id.as_str()) {
            return Err(AppError::Forbidden(
                "only the submitter can leave feedback".to_string(),
            ));
        }

        if !current.status.is_completed() {
            return Err(AppError::NotResolved);
        }

        let changes = complaint::ActiveModel {
            feedback_rating: Set(Some(input.rating)),
            feedback_comment: Set(input.comment),
            feedback_at: Set(Some(Utc::now().fixed_offset())),
            ..Default::default()
        };

        let updated = self
            .complaint_repo
            .update_with_log(&current, changes, None)
            .await?;

        info!(
            complaint_id = %updated.id,
            rating = input.rating,
            "Complaint feedback recorded"
        );
        Ok(updated)
    }

    /// Fetch a complaint the actor may view.
    pub async fn get(&self, complaint_id: &str, actor: &Actor) -> AppResult<ComplaintDetail> {
        let complaint = self.complaint_repo.get_by_id(complaint_id).await?;
        authorize(actor, Action::View, &complaint)?;
        self.detail(complaint).await
    }

    /// List the complaints the actor may view, newest first.
    pub async fn list(
        &self,
        actor: &Actor,
        filter: ComplaintListFilter,
    ) -> AppResult<Vec<ComplaintSummary>> {
        if !actor.is_active {
            return Err(AppError::Forbidden("account is disabled".to_string()));
        }

        let mut query = match actor.role {
            UserRole::Admin => ComplaintQuery::default(),
            UserRole::WardOfficer => ComplaintQuery {
                ward: actor.ward.clone(),
                submitted_by_id: Some(actor.id.clone()),
                assigned_to_id: Some(actor.id.clone()),
                ..Default::default()
            },
            UserRole::Maintenance => ComplaintQuery {
                submitted_by_id: Some(actor.id.clone()),
                assigned_to_id: Some(actor.id.clone()),
                ..Default::default()
            },
            UserRole::Citizen => ComplaintQuery {
                submitted_by_id: Some(actor.id.clone()),
                ..Default::default()
            },
        };
        query.status = filter.status;

        let limit = filter
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = filter.offset.unwrap_or(0);

        let now = Utc::now();
        Ok(self
            .complaint_repo
            .list(&query, limit, offset)
            .await?
            .into_iter()
            .map(|complaint| ComplaintSummary {
                sla_status: current_sla_status(&complaint, now),
                complaint,
            })
            .collect())
    }

    /// Assemble the full view of a complaint. Performs no access check.
    pub(crate) async fn detail(&self, complaint: complaint::Model) -> AppResult<ComplaintDetail> {
        let status_log = self.complaint_repo.find_status_log(&complaint.id).await?;
        let attachments = self.complaint_repo.find_attachments(&complaint.id).await?;

        Ok(ComplaintDetail {
            sla_status: current_sla_status(&complaint, Utc::now()),
            complaint,
            status_log,
            attachments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civicdesk_db::entities::complaint::ComplaintStatus::{
        Assigned, Closed, InProgress, Registered, Reopened, Resolved,
    };

    const ALL: [ComplaintStatus; 6] = [Registered, Assigned, InProgress, Resolved, Closed, Reopened];

    #[test]
    fn test_closed_cannot_jump_back_to_in_progress() {
        assert!(!is_allowed_transition(Closed, InProgress));
        assert!(is_allowed_transition(Closed, Reopened));
        assert!(is_allowed_transition(Reopened, InProgress));
    }

    #[test]
    fn test_no_self_transitions() {
        for status in ALL {
            assert!(!is_allowed_transition(status, status), "{status} -> {status}");
        }
    }

    #[test]
    fn test_nothing_returns_to_registered() {
        for status in ALL {
            assert!(!is_allowed_transition(status, Registered));
        }
    }

    #[test]
    fn test_reopen_only_from_completed() {
        for status in ALL {
            assert_eq!(
                is_allowed_transition(status, Reopened),
                status.is_completed(),
                "{status} -> reopened"
            );
        }
    }

    #[test]
    fn test_completed_does_not_go_backwards() {
        for from in [Resolved, Closed] {
            for to in [Assigned, InProgress] {
                assert!(!is_allowed_transition(from, to), "{from} -> {to}");
            }
        }
        assert!(!is_allowed_transition(Closed, Resolved));
    }

    #[test]
    fn test_feedback_rating_bounds() {
        let ok = FeedbackInput {
            rating: 5,
            comment: None,
        };
        let too_low = FeedbackInput {
            rating: 0,
            comment: None,
        };
        let too_high = FeedbackInput {
            rating: 6,
            comment: None,
        };
        assert!(ok.validate().is_ok());
        assert!(too_low.validate().is_err());
        assert!(too_high.validate().is_err());
    }
}
