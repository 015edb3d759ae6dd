//! Database entities.

#![allow(missing_docs)]

pub mod complaint;
pub mod complaint_attachment;
pub mod complaint_sequence;
pub mod complaint_status_log;
pub mod notification;
pub mod user;
pub mod verification_session;

pub use complaint::Entity as Complaint;
pub use complaint_attachment::Entity as ComplaintAttachment;
pub use complaint_sequence::Entity as ComplaintSequence;
pub use complaint_status_log::Entity as ComplaintStatusLog;
pub use notification::Entity as Notification;
pub use user::Entity as User;
pub use verification_session::Entity as VerificationSession;
