//! Periodic maintenance tasks.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use civicdesk_common::{AppResult, config::MaintenanceConfig};
use civicdesk_core::{NotificationService, VerificationService};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Maintenance job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceJob {
    /// Delete verification sessions past their expiry.
    SweepExpiredSessions,
    /// Delete read notifications older than the retention period.
    CleanupReadNotifications { retention_days: u32 },
}

impl MaintenanceJob {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SweepExpiredSessions => "sweep_expired_sessions",
            Self::CleanupReadNotifications { .. } => "cleanup_read_notifications",
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval for the session sweep (default: 5 minutes).
    pub session_sweep_interval: Duration,
    /// Interval for notification cleanup (default: daily).
    pub notification_cleanup_interval: Duration,
    /// Read notifications older than this are deleted. Zero disables cleanup.
    pub notification_retention_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&MaintenanceConfig::default())
    }
}

impl From<&MaintenanceConfig> for SchedulerConfig {
    fn from(config: &MaintenanceConfig) -> Self {
        Self {
            session_sweep_interval: Duration::from_secs(config.session_sweep_interval_secs.max(1)),
            notification_cleanup_interval: Duration::from_secs(
                config.notification_cleanup_interval_secs.max(1),
            ),
            notification_retention_days: config.notification_retention_days,
        }
    }
}

/// Job executor trait for maintenance jobs.
#[async_trait::async_trait]
pub trait MaintenanceExecutor: Send + Sync {
    /// Delete expired verification sessions, returning how many went.
    async fn sweep_expired_sessions(&self) -> AppResult<u64>;

    /// Delete read notifications older than `retention_days`.
    async fn cleanup_read_notifications(&self, retention_days: u32) -> AppResult<u64>;
}

/// Executor backed by the core services.
#[derive(Clone)]
pub struct ServiceExecutor {
    verification: VerificationService,
    notifications: NotificationService,
}

impl ServiceExecutor {
    #[must_use]
    pub const fn new(verification: VerificationService, notifications: NotificationService) -> Self {
        Self {
            verification,
            notifications,
        }
    }
}

#[async_trait::async_trait]
impl MaintenanceExecutor for ServiceExecutor {
    async fn sweep_expired_sessions(&self) -> AppResult<u64> {
        self.verification.sweep_expired().await
    }

    async fn cleanup_read_notifications(&self, retention_days: u32) -> AppResult<u64> {
        self.notifications.cleanup_read(retention_days).await
    }
}

/// Run one job, logging the outcome.
pub async fn run_job<E: MaintenanceExecutor + ?Sized>(executor: &E, job: MaintenanceJob) {
    let result = match job {
        MaintenanceJob::SweepExpiredSessions => executor.sweep_expired_sessions().await,
        MaintenanceJob::CleanupReadNotifications { retention_days } => {
            executor.cleanup_read_notifications(retention_days).await
        }
    };

    match result {
        Ok(count) => {
            if count > 0 {
                tracing::info!(job = job.name(), count, "Maintenance job removed rows");
            } else {
                tracing::debug!(job = job.name(), "Maintenance job had nothing to do");
            }
        }
        Err(e) => {
            tracing::error!(job = job.name(), error = %e, "Maintenance job failed");
        }
    }
}

/// Handles to the spawned maintenance loops.
#[derive(Debug)]
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Number of running loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every loop.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        tracing::info!("Maintenance scheduler stopped");
    }
}

fn spawn_loop<E: MaintenanceExecutor + 'static>(
    executor: Arc<E>,
    every: Duration,
    job: MaintenanceJob,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            run_job(executor.as_ref(), job).await;
        }
    })
}

/// Run the scheduler with the given configuration and executor.
///
/// Each job runs on its own interval, starting immediately.
pub fn run_scheduler<E: MaintenanceExecutor + 'static>(
    config: &SchedulerConfig,
    executor: Arc<E>,
) -> SchedulerHandle {
    let mut tasks = vec![spawn_loop(
        executor.clone(),
        config.session_sweep_interval,
        MaintenanceJob::SweepExpiredSessions,
    )];

    if config.notification_retention_days > 0 {
        tasks.push(spawn_loop(
            executor,
            config.notification_cleanup_interval,
            MaintenanceJob::CleanupReadNotifications {
                retention_days: config.notification_retention_days,
            },
        ));
    } else {
        tracing::info!("Notification cleanup disabled");
    }

    tracing::info!(
        sweep_secs = config.session_sweep_interval.as_secs(),
        cleanup_secs = config.notification_cleanup_interval.as_secs(),
        "Maintenance scheduler started"
    );

    SchedulerHandle { tasks }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civicdesk_common::AppError;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingExecutor {
        sweeps: AtomicU64,
        cleanups: AtomicU64,
        fail_sweep: bool,
    }

    #[async_trait::async_trait]
    impl MaintenanceExecutor for CountingExecutor {
        async fn sweep_expired_sessions(&self) -> AppResult<u64> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            if self.fail_sweep {
                return Err(AppError::Database("connection reset".to_string()));
            }
            Ok(2)
        }

        async fn cleanup_read_notifications(&self, retention_days: u32) -> AppResult<u64> {
            assert_eq!(retention_days, 30);
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    fn fast_config(retention_days: u32) -> SchedulerConfig {
        SchedulerConfig {
            session_sweep_interval: Duration::from_millis(10),
            notification_cleanup_interval: Duration::from_millis(10),
            notification_retention_days: retention_days,
        }
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.session_sweep_interval, Duration::from_secs(300));
        assert_eq!(config.notification_cleanup_interval, Duration::from_secs(86400));
        assert_eq!(config.notification_retention_days, 90);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = SchedulerConfig::from(&MaintenanceConfig {
            session_sweep_interval_secs: 0,
            notification_cleanup_interval_secs: 0,
            notification_retention_days: 7,
        });
        assert_eq!(config.session_sweep_interval, Duration::from_secs(1));
        assert_eq!(config.notification_cleanup_interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_scheduler_runs_both_jobs() {
        let executor = Arc::new(CountingExecutor::default());
        let handle = run_scheduler(&fast_config(30), executor.clone());
        assert_eq!(handle.len(), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown();

        assert!(executor.sweeps.load(Ordering::SeqCst) >= 1);
        assert!(executor.cleanups.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_zero_retention_disables_cleanup() {
        let executor = Arc::new(CountingExecutor::default());
        let handle = run_scheduler(&fast_config(0), executor.clone());
        assert_eq!(handle.len(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.shutdown();

        assert_eq!(executor.cleanups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_job_keeps_looping() {
        let executor = Arc::new(CountingExecutor {
            fail_sweep: true,
            ..Default::default()
        });
        let handle = run_scheduler(&fast_config(0), executor.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown();

        assert!(executor.sweeps.load(Ordering::SeqCst) >= 2);
    }
}
