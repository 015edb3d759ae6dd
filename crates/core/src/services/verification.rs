//! One-time-code verification gateway.
//!
//! A session is created per code request and destroyed on expiry, on
//! exhaustion of its attempts or when its verification token is redeemed.
//! Codes and tokens only ever reach the store as digests.

use crate::services::code_sender::CodeSenderService;
use crate::services::session_store::SessionStoreService;
use chrono::{DateTime, Duration, Utc};
use civicdesk_common::{
    AppError, AppResult, IdGenerator, config::VerificationConfig, constant_time_eq, digest_secret,
};
use civicdesk_db::entities::verification_session::{self, VerificationPurpose};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

/// Result of issuing a code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCode {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

/// A single-use token proving control of a mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationToken {
    pub token: String,
}

/// The identity bound to a redeemed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemedIdentity {
    pub email: String,
    pub purpose: VerificationPurpose,
}

#[derive(Debug, Validate)]
struct IssueRequest {
    #[validate(email, length(max = 320))]
    email: String,
}

/// Issues and checks one-time codes.
#[derive(Clone)]
pub struct VerificationService {
    store: SessionStoreService,
    sender: CodeSenderService,
    config: VerificationConfig,
    id_gen: IdGenerator,
}

impl VerificationService {
    /// Create a new verification service.
    #[must_use]
    pub const fn new(
        store: SessionStoreService,
        sender: CodeSenderService,
        config: VerificationConfig,
    ) -> Self {
        Self {
            store,
            sender,
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a session for `email` and send it a fresh code.
    ///
    /// If the code cannot be delivered the session is removed again and
    /// [`AppError::DeliveryError`] is returned.
    pub async fn issue_code(
        &self,
        email: &str,
        purpose: VerificationPurpose,
    ) -> AppResult<IssuedCode> {
        let email = email.trim().to_lowercase();
        IssueRequest {
            email: email.clone(),
        }
        .validate()?;

        let code = self.id_gen.generate_numeric_code(self.config.code_length);
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.code_ttl_secs);

        let session = self
            .store
            .put(verification_session::ActiveModel {
                id: Set(self.id_gen.generate_token()),
                email: Set(email.clone()),
                code_hash: Set(digest_secret(&code)),
                purpose: Set(purpose),
                attempt_count: Set(0),
                verified: Set(false),
                token_hash: Set(None),
                verified_at: Set(None),
                created_at: Set(now.fixed_offset()),
                expires_at: Set(expires_at.fixed_offset()),
            })
            .await?;

        if let Err(e) = self.sender.send_code(&email, &code, purpose).await {
            if let Err(cleanup) = self.store.delete(&session.id).await {
                warn!(error = %cleanup, "Failed to remove undeliverable session");
            }
            warn!(error = %e, purpose = purpose.as_str(), "Verification code delivery failed");
            return Err(match e {
                AppError::DeliveryError(msg) => AppError::DeliveryError(msg),
                other => AppError::DeliveryError(other.to_string()),
            });
        }

        info!(purpose = purpose.as_str(), "Verification code issued");

        Ok(IssuedCode {
            session_id: session.id,
            expires_at,
        })
    }

    /// Check `code` against the session and mint a verification token.
    ///
    /// The session survives a successful check; the token must be redeemed
    /// with [`Self::redeem_token`].
    pub async fn verify_code(&self, session_id: &str, code: &str) -> AppResult<VerificationToken> {
        let session = self
            .store
            .get(session_id)
            .await?
            .ok_or(AppError::SessionNotFound)?;

        let now = Utc::now();
        if session.is_expired_at(now.fixed_offset()) {
            self.store.delete(&session.id).await?;
            return Err(AppError::SessionExpired);
        }

        if session.attempt_count >= self.config.max_attempts {
            self.store.delete(&session.id).await?;
            return Err(AppError::AttemptsExceeded);
        }

        if session.verified {
            return Err(AppError::Conflict("code already used".to_string()));
        }

        if !constant_time_eq(&digest_secret(code.trim()), &session.code_hash) {
            return Err(self.record_mismatch(&session).await);
        }

        let token = self.id_gen.generate_token();
        let claimed = self
            .store
            .mark_verified(&session.id, &digest_secret(&token), now)
            .await?;
        if !claimed {
            return Err(AppError::Conflict("code already used".to_string()));
        }

        info!(purpose = session.purpose.as_str(), "Verification code accepted");
        Ok(VerificationToken { token })
    }

    async fn record_mismatch(&self, session: &verification_session::Model) -> AppError {
        let max = self.config.max_attempts;
        match self.store.record_failed_attempt(&session.id, max).await {
            Ok(true) => {
                let remaining = (max - session.attempt_count - 1).max(0) as u32;
                debug!(remaining, "Verification code mismatch");
                AppError::CodeMismatch {
                    remaining_attempts: remaining,
                }
            }
            // Another request used up the last attempt or verified the session.
            Ok(false) => match self.store.get(&session.id).await {
                Ok(Some(current)) if current.verified => {
                    AppError::Conflict("code already used".to_string())
                }
                Ok(Some(_)) => AppError::AttemptsExceeded,
                Ok(None) => AppError::SessionNotFound,
                Err(e) => e,
            },
            Err(e) => e,
        }
    }

    /// Consume a verification token, returning the identity it proves.
    ///
    /// A token can be redeemed once; any later redemption fails with
    /// [`AppError::InvalidToken`].
    pub async fn redeem_token(&self, token: &str) -> AppResult<RedeemedIdentity> {
        let token_hash = digest_secret(token.trim());

        let session = self
            .store
            .find_by_token(&token_hash)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if session.is_expired_at(Utc::now().fixed_offset()) {
            self.store.delete(&session.id).await?;
            return Err(AppError::InvalidToken);
        }

        if !self.store.take_verified(&session.id, &token_hash).await? {
            return Err(AppError::InvalidToken);
        }

        debug!(purpose = session.purpose.as_str(), "Verification token redeemed");

        Ok(RedeemedIdentity {
            email: session.email,
            purpose: session.purpose,
        })
    }

    /// Replace a session with a new one for the same email and purpose.
    ///
    /// The old session is removed before the new code is sent.
    pub async fn resend_code(&self, session_id: &str) -> AppResult<IssuedCode> {
        let session = self
            .store
            .get(session_id)
            .await?
            .ok_or(AppError::SessionNotFound)?;

        self.store.delete(&session.id).await?;
        self.issue_code(&session.email, session.purpose).await
    }

    /// Remove expired sessions.
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        let removed = self.store.sweep(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Swept expired verification sessions");
        }
        Ok(removed)
    }
}
