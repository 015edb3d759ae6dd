//! Repositories wrapping database access per aggregate.

mod complaint;
mod notification;
mod user;
mod verification_session;

pub use complaint::{ComplaintQuery, ComplaintRepository, NewStatusLog, format_complaint_number};
pub use notification::NotificationRepository;
pub use user::UserRepository;
pub use verification_session::VerificationSessionRepository;
