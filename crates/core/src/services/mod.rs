//! Business logic services.

#![allow(missing_docs)]

pub mod account;
pub mod authorizer;
pub mod code_sender;
pub mod complaint;
pub mod intake;
pub mod notification;
pub mod session_issuer;
pub mod session_store;
pub mod sla;
pub mod verification;

pub use account::AccountService;
pub use authorizer::{Action, Actor, authorize, can_perform};
pub use code_sender::{CodeSender, CodeSenderService, LogCodeSender, SmtpCodeSender};
pub use complaint::{
    ComplaintDetail, ComplaintListFilter, ComplaintService, ComplaintSummary, FeedbackInput,
    is_allowed_transition,
};
pub use intake::{AttachmentInput, GuestComplaintInput, IntakeService};
pub use notification::{
    DbNotificationDispatcher, NoOpNotificationDispatcher, Notice, NotificationDispatcher,
    NotificationDispatcherService, NotificationService,
};
pub use session_issuer::{AuthToken, JwtSessionIssuer, SessionClaims, SessionIssuer, SessionIssuerService};
pub use session_store::{DbSessionStore, SessionStoreService, VerificationSessionStore};
pub use sla::{SlaStatus, sla_deadline, sla_status, sla_window};
pub use verification::{IssuedCode, RedeemedIdentity, VerificationService, VerificationToken};
