//! One-time code delivery.

use async_trait::async_trait;
use civicdesk_common::{
    AppError, AppResult,
    config::{EmailConfig, PortalConfig, VerificationConfig},
};
use civicdesk_db::entities::verification_session::VerificationPurpose;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Delivers a verification code to a mailbox.
#[async_trait]
pub trait CodeSender: Send + Sync {
    /// Send `code` to `email`. Any error means the code did not go out.
    async fn send_code(&self, email: &str, code: &str, purpose: VerificationPurpose)
    -> AppResult<()>;
}

/// Shared code sender handle.
pub type CodeSenderService = Arc<dyn CodeSender>;

/// Sends codes over SMTP.
#[derive(Clone)]
pub struct SmtpCodeSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    portal_name: String,
    ttl_minutes: i64,
}

impl SmtpCodeSender {
    /// Build a sender from the mail, portal and verification settings.
    pub fn new(
        email: &EmailConfig,
        portal: &PortalConfig,
        verification: &VerificationConfig,
    ) -> AppResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&email.smtp_host)
            .map_err(|e| AppError::Config(format!("invalid SMTP relay: {e}")))?
            .port(email.smtp_port);

        if let (Some(username), Some(password)) = (&email.username, &email.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = Mailbox::new(
            Some(email.from_name.clone()),
            email
                .from_address
                .parse()
                .map_err(|e| AppError::Config(format!("invalid from address: {e}")))?,
        );

        Ok(Self {
            transport: builder.build(),
            from,
            portal_name: portal.name.clone(),
            ttl_minutes: verification.code_ttl_secs / 60,
        })
    }

    fn subject(&self, purpose: VerificationPurpose) -> String {
        match purpose {
            VerificationPurpose::ComplaintSubmission => {
                format!("{}: confirm your email to file a complaint", self.portal_name)
            }
            VerificationPurpose::ComplaintTracking => {
                format!("{}: your complaint tracking code", self.portal_name)
            }
        }
    }
}

#[async_trait]
impl CodeSender for SmtpCodeSender {
    async fn send_code(
        &self,
        email: &str,
        code: &str,
        purpose: VerificationPurpose,
    ) -> AppResult<()> {
        let to: Mailbox = email
            .parse()
            .map_err(|e| AppError::DeliveryError(format!("invalid recipient: {e}")))?;

        let body = format!(
            "Your verification code is {code}.\n\n\
             It expires in {} minutes. If you did not request it, ignore this message.\n",
            self.ttl_minutes
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(self.subject(purpose))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::DeliveryError(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::DeliveryError(e.to_string()))?;

        debug!(purpose = purpose.as_str(), "Verification code mailed");
        Ok(())
    }
}

/// Development sender: records the delivery in the log instead of mailing it.
///
/// The code itself is never written out.
#[derive(Clone, Default)]
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send_code(
        &self,
        email: &str,
        _code: &str,
        purpose: VerificationPurpose,
    ) -> AppResult<()> {
        info!(
            recipient = %email,
            purpose = purpose.as_str(),
            "Verification code generated (mail delivery disabled)"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email_config() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.test.local".to_string(),
            smtp_port: 2525,
            username: Some("mailer".to_string()),
            password: Some("secret".to_string()),
            from_address: "noreply@civicdesk.test".to_string(),
            from_name: "Civicdesk".to_string(),
        }
    }

    fn portal_config() -> PortalConfig {
        PortalConfig {
            name: "Civicdesk".to_string(),
            url: "https://civicdesk.test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_smtp_sender_builds_from_config() {
        let sender =
            SmtpCodeSender::new(&email_config(), &portal_config(), &VerificationConfig::default())
                .unwrap();
        assert_eq!(sender.ttl_minutes, 10);
        assert!(
            sender
                .subject(VerificationPurpose::ComplaintTracking)
                .starts_with("Civicdesk:")
        );
    }

    #[tokio::test]
    async fn test_smtp_sender_rejects_bad_from_address() {
        let mut config = email_config();
        config.from_address = "not an address".to_string();

        let result =
            SmtpCodeSender::new(&config, &portal_config(), &VerificationConfig::default());
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let sender = LogCodeSender;
        sender
            .send_code("guest@test.com", "123456", VerificationPurpose::ComplaintSubmission)
            .await
            .unwrap();
    }
}
