//! Account provisioning.

use crate::services::authorizer::Actor;
use chrono::Utc;
use civicdesk_common::{AppError, AppResult, IdGenerator};
use civicdesk_db::{
    entities::user::{self, UserRole},
    repositories::UserRepository,
};
use sea_orm::Set;
use tracing::{info, warn};

/// Staff accounts are never handed out through an email code alone.
fn citizen_only(user: user::Model) -> AppResult<user::Model> {
    if user.role == UserRole::Citizen {
        Ok(user)
    } else {
        warn!(user_id = %user.id, role = user.role.as_str(), "Refused citizen upsert for a staff email");
        Err(AppError::Forbidden(
            "this email belongs to a staff account".to_string(),
        ))
    }
}

/// Account service for user provisioning.
#[derive(Clone)]
pub struct AccountService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Return the citizen owning `email`, creating the account if none exists.
    ///
    /// Concurrent calls for the same email converge on a single row: the
    /// insert is skipped on an email conflict and the winner is read back.
    /// An email held by a staff account is refused with `Forbidden`.
    pub async fn upsert_citizen(
        &self,
        email: &str,
        name: Option<String>,
        phone: Option<String>,
    ) -> AppResult<user::Model> {
        let email = email.trim().to_lowercase();

        if let Some(existing) = self.user_repo.find_by_email(&email).await? {
            return citizen_only(existing);
        }

        let id = self.id_gen.generate();
        let inserted = self
            .user_repo
            .insert_if_email_absent(user::ActiveModel {
                id: Set(id.clone()),
                email: Set(email.clone()),
                name: Set(name),
                phone: Set(phone),
                role: Set(UserRole::Citizen),
                ward: Set(None),
                is_active: Set(true),
                created_at: Set(Utc::now().fixed_offset()),
                updated_at: Set(None),
            })
            .await?;

        if inserted > 0 {
            info!(user_id = %id, "Provisioned citizen account");
        }

        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Internal("citizen account vanished after upsert".to_string()))?;
        citizen_only(user)
    }

    /// Load the acting user for an authenticated request.
    pub async fn actor(&self, user_id: &str) -> AppResult<Actor> {
        let user = self.user_repo.get_by_id(user_id).await?;
        Ok(Actor::from(&user))
    }
}
