//! SLA policy.
//!
//! The deadline is fixed when a complaint is created. The SLA status is
//! derived on read and never stored.

use chrono::{DateTime, Duration, Utc};
use civicdesk_db::entities::complaint::{ComplaintPriority, ComplaintStatus};
use serde::{Deserialize, Serialize};

/// Derived SLA standing of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaStatus {
    OnTime,
    /// At most a quarter of the window remains
    Warning,
    Overdue,
    /// Resolved or closed
    Completed,
}

/// Resolution window for a priority.
#[must_use]
pub fn sla_window(priority: ComplaintPriority) -> Duration {
    match priority {
        ComplaintPriority::Critical => Duration::hours(24),
        ComplaintPriority::High => Duration::hours(48),
        ComplaintPriority::Medium => Duration::hours(72),
        ComplaintPriority::Low => Duration::hours(120),
    }
}

/// Deadline for a complaint of `priority` created at `created_at`.
#[must_use]
pub fn sla_deadline(priority: ComplaintPriority, created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + sla_window(priority)
}

/// SLA status at `now`.
#[must_use]
pub fn sla_status(
    status: ComplaintStatus,
    created_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> SlaStatus {
    if status.is_completed() {
        return SlaStatus::Completed;
    }
    if now > deadline {
        return SlaStatus::Overdue;
    }

    let window = deadline - created_at;
    let remaining = deadline - now;
    if remaining * 4 <= window {
        SlaStatus::Warning
    } else {
        SlaStatus::OnTime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_per_priority() {
        let created = Utc::now();
        let cases = [
            (ComplaintPriority::Critical, 24),
            (ComplaintPriority::High, 48),
            (ComplaintPriority::Medium, 72),
            (ComplaintPriority::Low, 120),
        ];
        for (priority, hours) in cases {
            assert_eq!(
                sla_deadline(priority, created),
                created + Duration::hours(hours)
            );
        }
    }

    #[test]
    fn test_status_progression() {
        let created = Utc::now();
        let deadline = sla_deadline(ComplaintPriority::High, created);
        let open = ComplaintStatus::InProgress;

        assert_eq!(sla_status(open, created, deadline, created), SlaStatus::OnTime);
        assert_eq!(
            sla_status(open, created, deadline, created + Duration::hours(35)),
            SlaStatus::OnTime
        );
        assert_eq!(
            sla_status(open, created, deadline, created + Duration::hours(36)),
            SlaStatus::Warning
        );
        assert_eq!(
            sla_status(open, created, deadline, deadline),
            SlaStatus::Warning
        );
        assert_eq!(
            sla_status(open, created, deadline, deadline + Duration::seconds(1)),
            SlaStatus::Overdue
        );
    }

    #[test]
    fn test_completed_wins_over_overdue() {
        let created = Utc::now() - Duration::days(30);
        let deadline = sla_deadline(ComplaintPriority::Critical, created);

        for status in [ComplaintStatus::Resolved, ComplaintStatus::Closed] {
            assert_eq!(
                sla_status(status, created, deadline, Utc::now()),
                SlaStatus::Completed
            );
        }
        assert_eq!(
            sla_status(ComplaintStatus::Reopened, created, deadline, Utc::now()),
            SlaStatus::Overdue
        );
    }
}
