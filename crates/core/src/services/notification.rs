//! Notification dispatch and the per-user notification log.
//!
//! Dispatch is best-effort: a failed notification never undoes the
//! complaint write that triggered it.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use civicdesk_common::{AppError, AppResult, IdGenerator};
use civicdesk_db::{
    entities::notification::{self, NotificationType},
    repositories::NotificationRepository,
};
use sea_orm::Set;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub recipient_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub complaint_id: Option<String>,
    pub data: Value,
}

/// Delivers notices to users.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver one notice.
    async fn notify(&self, notice: Notice) -> AppResult<()>;
}

/// Shared dispatcher handle.
pub type NotificationDispatcherService = Arc<dyn NotificationDispatcher>;

/// Send every notice, logging failures instead of returning them.
///
/// Returns how many were delivered.
pub async fn dispatch_all(dispatcher: &dyn NotificationDispatcher, notices: Vec<Notice>) -> usize {
    let mut delivered = 0;
    for notice in notices {
        let recipient_id = notice.recipient_id.clone();
        let kind = notice.notification_type.as_str();
        match dispatcher.notify(notice).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(
                error = %e,
                recipient_id = %recipient_id,
                notification_type = kind,
                "Notification dispatch failed"
            ),
        }
    }
    delivered
}

/// Stores notices in the notification table.
#[derive(Clone)]
pub struct DbNotificationDispatcher {
    notification_repo: NotificationRepository,
    id_gen: IdGenerator,
}

impl DbNotificationDispatcher {
    /// Create a new database-backed dispatcher.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            id_gen: IdGenerator::new(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for DbNotificationDispatcher {
    async fn notify(&self, notice: Notice) -> AppResult<()> {
        self.notification_repo
            .create(notification::ActiveModel {
                id: Set(self.id_gen.generate()),
                recipient_id: Set(notice.recipient_id),
                notification_type: Set(notice.notification_type),
                title: Set(notice.title),
                message: Set(notice.message),
                complaint_id: Set(notice.complaint_id),
                data: Set(Some(notice.data)),
                is_read: Set(false),
                created_at: Set(Utc::now().fixed_offset()),
            })
            .await?;
        Ok(())
    }
}

/// A no-op dispatcher for when notifications are disabled.
#[derive(Clone, Default)]
pub struct NoOpNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for NoOpNotificationDispatcher {
    async fn notify(&self, _notice: Notice) -> AppResult<()> {
        Ok(())
    }
}

/// Notification service for reading and pruning a user's notifications.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self { notification_repo }
    }

    /// Get notifications for a user, newest first.
    pub async fn get_notifications(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_recipient(user_id, limit.clamp(1, 100), until_id, unread_only)
            .await
    }

    /// Mark one of the user's notifications as read.
    pub async fn mark_as_read(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        let updated = self
            .notification_repo
            .mark_as_read(notification_id, user_id)
            .await?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("notification {notification_id}")));
        }
        Ok(())
    }

    /// Mark all of the user's notifications as read.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Count unread notifications.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }

    /// Delete read notifications older than `retention_days`.
    pub async fn cleanup_read(&self, retention_days: u32) -> AppResult<u64> {
        if retention_days == 0 {
            return Err(AppError::BadRequest(
                "retention must be at least one day".to_string(),
            ));
        }
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let removed = self.notification_repo.delete_read_older_than(cutoff).await?;
        if removed > 0 {
            info!(removed, retention_days, "Cleaned up read notifications");
        }
        Ok(removed)
    }
}
