//! Access rules for complaint reads and transitions.
//!
//! Guest intake never passes through here: a redeemed verification token
//! is its authorisation.

use civicdesk_common::{AppError, AppResult};
use civicdesk_db::entities::{
    complaint,
    user::{self, UserRole},
};

/// The authenticated user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: UserRole,
    pub ward: Option<String>,
    pub is_active: bool,
}

impl From<&user::Model> for Actor {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role,
            ward: user.ward.clone(),
            is_active: user.is_active,
        }
    }
}

/// Operations gated by [`can_perform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Assign,
    UpdateStatus,
    SubmitFeedback,
}

impl Action {
    const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Assign => "assign",
            Self::UpdateStatus => "update the status of",
            Self::SubmitFeedback => "leave feedback on",
        }
    }
}

/// Whether `actor` may perform `action` on `complaint`.
#[must_use]
pub fn can_perform(actor: &Actor, action: Action, complaint: &complaint::Model) -> bool {
    if !actor.is_active {
        return false;
    }

    match actor.role {
        UserRole::Admin => return true,
        UserRole::WardOfficer if actor.ward.as_deref() == Some(complaint.ward.as_str()) => {
            return true;
        }
        _ => {}
    }

    let is_assignee = complaint.assigned_to_id.as_deref() == Some(actor.id.as_str());
    let is_submitter = complaint.submitted_by_id.as_deref() == Some(actor.id.as_str());

    match action {
        Action::View => is_assignee || is_submitter,
        Action::Assign | Action::UpdateStatus => is_assignee,
        Action::SubmitFeedback => is_submitter,
    }
}

/// [`can_perform`], as a `Forbidden` error.
pub fn authorize(actor: &Actor, action: Action, complaint: &complaint::Model) -> AppResult<()> {
    if can_perform(actor, action, complaint) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "not allowed to {} complaint {}",
            action.as_str(),
            complaint.complaint_number
        )))
    }
}
