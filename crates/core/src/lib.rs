//! Core business logic for civicdesk.
//!
//! Guest identity verification, guest complaint intake and the complaint
//! lifecycle, with the collaborator traits (code delivery, session
//! issuance, notification dispatch) they depend on.

pub mod services;

pub use services::*;

use civicdesk_common::Config;
use civicdesk_db::repositories::{
    ComplaintRepository, NotificationRepository, UserRepository, VerificationSessionRepository,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Every service, wired against one database.
#[derive(Clone)]
pub struct Services {
    pub verification: VerificationService,
    pub intake: IntakeService,
    pub complaints: ComplaintService,
    pub accounts: AccountService,
    pub notifications: NotificationService,
}

impl Services {
    /// Build the service graph.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &Config,
        code_sender: CodeSenderService,
        session_issuer: SessionIssuerService,
        dispatcher: NotificationDispatcherService,
    ) -> Self {
        let user_repo = UserRepository::new(db.clone());
        let complaint_repo = ComplaintRepository::new(db.clone());
        let notification_repo = NotificationRepository::new(db.clone());
        let session_repo = VerificationSessionRepository::new(db);

        let store: SessionStoreService = Arc::new(DbSessionStore::new(session_repo));
        let verification =
            VerificationService::new(store, code_sender, config.verification.clone());
        let accounts = AccountService::new(user_repo.clone());
        let complaints =
            ComplaintService::new(complaint_repo.clone(), user_repo.clone(), dispatcher.clone());
        let intake = IntakeService::new(
            verification.clone(),
            accounts.clone(),
            complaints.clone(),
            complaint_repo,
            user_repo,
            dispatcher,
            session_issuer,
            config.complaint.number_prefix.clone(),
        );

        Self {
            verification,
            intake,
            complaints,
            accounts,
            notifications: NotificationService::new(notification_repo),
        }
    }
}
