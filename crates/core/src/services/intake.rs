//! Guest complaint intake.
//!
//! Guests never authenticate: a redeemed verification token proves control
//! of the contact mailbox and stands in for authorisation.

use crate::services::account::AccountService;
use crate::services::complaint::{ComplaintDetail, ComplaintService};
use crate::services::notification::{Notice, NotificationDispatcherService, dispatch_all};
use crate::services::session_issuer::{AuthToken, SessionIssuerService};
use crate::services::sla::sla_deadline;
use crate::services::verification::{RedeemedIdentity, VerificationService};
use chrono::{Datelike, Utc};
use civicdesk_common::{AppError, AppResult, IdGenerator};
use civicdesk_db::{
    entities::{
        complaint::{self, ComplaintPriority, ComplaintStatus},
        complaint_attachment,
        complaint_status_log::StatusLogType,
        notification::NotificationType,
        user::{self, UserRole},
        verification_session::VerificationPurpose,
    },
    repositories::{ComplaintRepository, NewStatusLog, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, warn};
use validator::Validate;

/// Reference to an externally stored file.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(url)]
    pub url: String,
    #[validate(length(max = 128))]
    pub content_type: Option<String>,
}

/// Fields a guest supplies when filing a complaint.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GuestComplaintInput {
    #[validate(length(min = 1, max = 128))]
    pub complaint_type: String,
    #[validate(length(min = 10, max = 5000))]
    pub description: String,
    pub priority: ComplaintPriority,
    #[validate(length(min = 1, max = 64))]
    pub ward: String,
    #[validate(length(max = 256))]
    pub area: Option<String>,
    #[validate(length(max = 1000))]
    pub address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(length(max = 256))]
    pub contact_name: Option<String>,
    #[validate(email, length(max = 320))]
    pub contact_email: String,
    #[validate(length(max = 32))]
    pub contact_phone: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub attachments: Vec<AttachmentInput>,
}

/// Intake service for unauthenticated submitters.
#[derive(Clone)]
pub struct IntakeService {
    verification: VerificationService,
    accounts: AccountService,
    complaints: ComplaintService,
    complaint_repo: ComplaintRepository,
    user_repo: UserRepository,
    dispatcher: NotificationDispatcherService,
    session_issuer: SessionIssuerService,
    number_prefix: String,
    id_gen: IdGenerator,
}

impl IntakeService {
    /// Create a new intake service.
    #[must_use]
    pub fn new(
        verification: VerificationService,
        accounts: AccountService,
        complaints: ComplaintService,
        complaint_repo: ComplaintRepository,
        user_repo: UserRepository,
        dispatcher: NotificationDispatcherService,
        session_issuer: SessionIssuerService,
        number_prefix: impl Into<String>,
    ) -> Self {
        Self {
            verification,
            accounts,
            complaints,
            complaint_repo,
            user_repo,
            dispatcher,
            session_issuer,
            number_prefix: number_prefix.into(),
            id_gen: IdGenerator::new(),
        }
    }

    /// File a complaint on behalf of a verified guest.
    ///
    /// The token must come from a `COMPLAINT_SUBMISSION` session for the same
    /// address as `contact_email`. The complaint starts `REGISTERED` with no
    /// submitter. Ward officers of the ward and all administrators are told.
    pub async fn submit_as_guest(
        &self,
        verification_token: &str,
        input: GuestComplaintInput,
    ) -> AppResult<complaint::Model> {
        input.validate()?;

        let identity = self.redeem(verification_token, VerificationPurpose::ComplaintSubmission).await?;
        let contact_email = input.contact_email.trim().to_lowercase();
        if identity.email != contact_email {
            return Err(AppError::IdentityMismatch);
        }

        let now = Utc::now();
        let complaint_id = self.id_gen.generate();

        let model = complaint::ActiveModel {
            id: Set(complaint_id.clone()),
            complaint_type: Set(input.complaint_type),
            description: Set(input.description),
            priority: Set(input.priority),
            status: Set(ComplaintStatus::Registered),
            ward: Set(input.ward),
            area: Set(input.area),
            address: Set(input.address),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            contact_name: Set(input.contact_name),
            contact_email: Set(contact_email),
            contact_phone: Set(input.contact_phone),
            submitted_by_id: Set(None),
            assigned_to_id: Set(None),
            assigned_at: Set(None),
            sla_deadline: Set(sla_deadline(input.priority, now).fixed_offset()),
            resolved_at: Set(None),
            closed_at: Set(None),
            feedback_rating: Set(None),
            feedback_comment: Set(None),
            feedback_at: Set(None),
            created_at: Set(now.fixed_offset()),
            updated_at: Set(None),
            ..Default::default()
        };

        let attachments = input
            .attachments
            .into_iter()
            .map(|a| complaint_attachment::ActiveModel {
                id: Set(self.id_gen.generate()),
                complaint_id: Set(complaint_id.clone()),
                file_name: Set(a.file_name),
                url: Set(a.url),
                content_type: Set(a.content_type),
                created_at: Set(now.fixed_offset()),
            })
            .collect();

        let log = NewStatusLog {
            id: self.id_gen.generate(),
            entry_type: StatusLogType::Registration,
            actor_id: None,
            from_status: None,
            to_status: ComplaintStatus::Registered,
            comment: None,
        };

        let created = self
            .complaint_repo
            .create_with_log(&self.number_prefix, now.year(), model, attachments, log)
            .await?;

        info!(
            complaint_id = %created.id,
            complaint_number = %created.complaint_number,
            ward = %created.ward,
            priority = ?created.priority,
            "Guest complaint registered"
        );

        self.notify_registration(&created).await;

        Ok(created)
    }

    /// Exchange a tracking token for a citizen account linked to the complaint.
    ///
    /// Repeating the promotion for an already linked complaint returns the
    /// linked user instead of creating another.
    pub async fn auto_promote_on_track(
        &self,
        complaint_id: &str,
        verification_token: &str,
    ) -> AppResult<(user::Model, AuthToken)> {
        let complaint = self.complaint_repo.get_by_id(complaint_id).await?;

        let identity = self.redeem(verification_token, VerificationPurpose::ComplaintTracking).await?;
        if identity.email != complaint.contact_email {
            return Err(AppError::IdentityMismatch);
        }

        let user = match &complaint.submitted_by_id {
            Some(user_id) => self.user_repo.get_by_id(user_id).await?,
            None => self.link_citizen(&complaint).await?,
        };

        if !user.is_active {
            return Err(AppError::Forbidden("account is disabled".to_string()));
        }
        if user.role != UserRole::Citizen {
            return Err(AppError::Forbidden(
                "staff accounts cannot be opened with a tracking code".to_string(),
            ));
        }

        let token = self.session_issuer.issue(&user)?;

        info!(
            complaint_id = %complaint.id,
            user_id = %user.id,
            "Guest promoted to citizen session"
        );
        Ok((user, token))
    }

    /// Show a complaint to a guest who re-verified its contact mailbox.
    pub async fn track_as_guest(
        &self,
        complaint_number: &str,
        verification_token: &str,
    ) -> AppResult<ComplaintDetail> {
        let complaint = self.complaint_repo.get_by_number(complaint_number).await?;

        let identity = self.redeem(verification_token, VerificationPurpose::ComplaintTracking).await?;
        if identity.email != complaint.contact_email {
            return Err(AppError::IdentityMismatch);
        }

        self.complaints.detail(complaint).await
    }

    async fn redeem(
        &self,
        token: &str,
        purpose: VerificationPurpose,
    ) -> AppResult<RedeemedIdentity> {
        let identity = self.verification.redeem_token(token).await?;
        if identity.purpose != purpose {
            warn!(
                expected = purpose.as_str(),
                actual = identity.purpose.as_str(),
                "Verification token used for the wrong purpose"
            );
            return Err(AppError::InvalidToken);
        }
        Ok(identity)
    }

    async fn link_citizen(&self, complaint: &complaint::Model) -> AppResult<user::Model> {
        let citizen = self
            .accounts
            .upsert_citizen(
                &complaint.contact_email,
                complaint.contact_name.clone(),
                complaint.contact_phone.clone(),
            )
            .await?;

        if self
            .complaint_repo
            .link_submitter(&complaint.id, &citizen.id)
            .await?
            > 0
        {
            return Ok(citizen);
        }

        // Someone linked it first; hand back whoever that was.
        let linked = self.complaint_repo.get_by_id(&complaint.id).await?;
        match linked.submitted_by_id {
            Some(user_id) => self.user_repo.get_by_id(&user_id).await,
            None => Err(AppError::Conflict(format!(
                "could not link complaint {}",
                complaint.complaint_number
            ))),
        }
    }

    async fn notify_registration(&self, complaint: &complaint::Model) {
        let recipients = match self.registration_recipients(&complaint.ward).await {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(error = %e, complaint_id = %complaint.id, "Could not resolve notification recipients");
                return;
            }
        };

        let notices = recipients
            .into_iter()
            .map(|recipient_id| Notice {
                recipient_id,
                notification_type: NotificationType::ComplaintRegistered,
                title: format!("New complaint {}", complaint.complaint_number),
                message: format!(
                    "A {} complaint was filed in ward {}.",
                    complaint.complaint_type, complaint.ward
                ),
                complaint_id: Some(complaint.id.clone()),
                data: json!({
                    "complaintNumber": complaint.complaint_number,
                    "ward": complaint.ward,
                    "priority": complaint.priority,
                }),
            })
            .collect();

        dispatch_all(self.dispatcher.as_ref(), notices).await;
    }

    /// Active ward officers of `ward` plus active administrators, each once.
    async fn registration_recipients(&self, ward: &str) -> AppResult<Vec<String>> {
        let officers = self
            .user_repo
            .find_active_by_role_in_ward(UserRole::WardOfficer, ward)
            .await?;
        let admins = self.user_repo.find_active_admins().await?;

        let mut seen = HashSet::new();
        Ok(officers
            .into_iter()
            .chain(admins)
            .map(|u| u.id)
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> GuestComplaintInput {
        GuestComplaintInput {
            complaint_type: "garbage".to_string(),
            description: "Garbage has not been collected for 5 days".to_string(),
            priority: ComplaintPriority::Medium,
            ward: "W1".to_string(),
            area: None,
            address: None,
            latitude: Some(12.97),
            longitude: Some(77.59),
            contact_name: Some("Asha".to_string()),
            contact_email: "guest@test.com".to_string(),
            contact_phone: None,
            attachments: vec![],
        }
    }

    #[test]
    fn test_valid_input_passes() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn test_short_description_rejected() {
        let mut input = valid_input();
        input.description = "too short".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let mut input = valid_input();
        input.latitude = Some(91.0);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_bad_attachment_url_rejected() {
        let mut input = valid_input();
        input.attachments.push(AttachmentInput {
            file_name: "photo.jpg".to_string(),
            url: "not a url".to_string(),
            content_type: None,
        });
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_input_deserializes_from_camel_case() {
        let input: GuestComplaintInput = serde_json::from_value(json!({
            "complaintType": "streetlight",
            "description": "Streetlight flickering all night",
            "priority": "HIGH",
            "ward": "W1",
            "contactEmail": "guest@test.com"
        }))
        .unwrap_or_else(|e| panic!("deserialize failed: {e}"));

        assert_eq!(input.priority, ComplaintPriority::High);
        assert!(input.attachments.is_empty());
        assert!(input.latitude.is_none());
    }
}
