//! Maintenance jobs against a migrated in-memory database.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use civicdesk_common::config::VerificationConfig;
use civicdesk_core::{DbSessionStore, LogCodeSender, NotificationService, VerificationService};
use civicdesk_db::{
    entities::{
        Notification, VerificationSession, notification, user, verification_session,
        verification_session::VerificationPurpose,
    },
    repositories::{NotificationRepository, UserRepository, VerificationSessionRepository},
    test_utils::memory_database,
};
use civicdesk_queue::{MaintenanceExecutor, MaintenanceJob, ServiceExecutor, run_job};
use sea_orm::{EntityTrait, PaginatorTrait, Set};

fn session(id: &str, expires_in: Duration) -> verification_session::ActiveModel {
    let now = Utc::now();
    verification_session::ActiveModel {
        id: Set(id.to_string()),
        email: Set(format!("{id}@test.com")),
        code_hash: Set("hash".to_string()),
        purpose: Set(VerificationPurpose::ComplaintSubmission),
        attempt_count: Set(0),
        verified: Set(false),
        token_hash: Set(None),
        verified_at: Set(None),
        created_at: Set(now.fixed_offset()),
        expires_at: Set((now + expires_in).fixed_offset()),
    }
}

#[tokio::test]
async fn test_service_executor_removes_stale_rows() {
    let db = Arc::new(memory_database().await.unwrap());

    let sessions = VerificationSessionRepository::new(db.clone());
    sessions.create(session("stale", -Duration::minutes(5))).await.unwrap();
    sessions.create(session("live", Duration::minutes(5))).await.unwrap();

    UserRepository::new(db.clone())
        .create(user::ActiveModel {
            id: Set("officer".to_string()),
            email: Set("officer@city.test".to_string()),
            name: Set(None),
            phone: Set(None),
            role: Set(user::UserRole::WardOfficer),
            ward: Set(Some("W1".to_string())),
            is_active: Set(true),
            created_at: Set(Utc::now().fixed_offset()),
            updated_at: Set(None),
        })
        .await
        .unwrap();

    let notifications = NotificationRepository::new(db.clone());
    for (id, age_days, is_read) in [("old-read", 120, true), ("old-unread", 120, false), ("new-read", 1, true)] {
        notifications
            .create(notification::ActiveModel {
                id: Set(id.to_string()),
                recipient_id: Set("officer".to_string()),
                notification_type: Set(notification::NotificationType::ComplaintRegistered),
                title: Set("New complaint".to_string()),
                message: Set("Filed in W1".to_string()),
                complaint_id: Set(None),
                data: Set(None),
                is_read: Set(is_read),
                created_at: Set((Utc::now() - Duration::days(age_days)).fixed_offset()),
            })
            .await
            .unwrap();
    }

    let verification = VerificationService::new(
        Arc::new(DbSessionStore::new(sessions)),
        Arc::new(LogCodeSender),
        VerificationConfig::default(),
    );
    let executor = ServiceExecutor::new(verification, NotificationService::new(notifications));

    assert_eq!(executor.sweep_expired_sessions().await.unwrap(), 1);
    assert_eq!(VerificationSession::find().count(db.as_ref()).await.unwrap(), 1);

    run_job(
        &executor,
        MaintenanceJob::CleanupReadNotifications { retention_days: 90 },
    )
    .await;
    let remaining: Vec<String> = Notification::find()
        .all(db.as_ref())
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(!remaining.contains(&"old-read".to_string()));
}
