//! Bearer session issuance for authenticated users.

use chrono::{DateTime, Duration, TimeZone, Utc};
use civicdesk_common::{AppError, AppResult, IdGenerator, config::AuthConfig};
use civicdesk_db::entities::user;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A signed bearer token and its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    /// Unique token ID
    pub jti: String,
}

/// Produces bearer tokens for users.
pub trait SessionIssuer: Send + Sync {
    /// Issue a token for `user`.
    fn issue(&self, user: &user::Model) -> AppResult<AuthToken>;

    /// Check a token and return its claims.
    fn verify(&self, token: &str) -> AppResult<SessionClaims>;
}

/// Shared session issuer handle.
pub type SessionIssuerService = Arc<dyn SessionIssuer>;

/// HS256 JWT issuer.
#[derive(Clone)]
pub struct JwtSessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
    id_gen: IdGenerator,
}

impl JwtSessionIssuer {
    /// Create an issuer from the auth settings.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            ttl: Duration::hours(config.token_ttl_hours),
            id_gen: IdGenerator::new(),
        }
    }
}

impl SessionIssuer for JwtSessionIssuer {
    fn issue(&self, user: &user::Model) -> AppResult<AuthToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = SessionClaims {
            sub: user.id.clone(),
            role: user.role.as_str().to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: self.id_gen.generate(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("failed to sign session token: {e}")))?;

        // Report the expiry at the second precision the claim carries.
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or(expires_at);

        Ok(AuthToken { token, expires_at })
    }

    fn verify(&self, token: &str) -> AppResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        Ok(decode::<SessionClaims>(token, &self.decoding_key, &validation)?.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civicdesk_db::entities::user::UserRole;

    fn auth_config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            issuer: "civicdesk-test".to_string(),
            token_ttl_hours: 24,
        }
    }

    fn citizen() -> user::Model {
        user::Model {
            id: "user1".to_string(),
            email: "citizen@test.com".to_string(),
            name: None,
            phone: None,
            role: UserRole::Citizen,
            ward: None,
            is_active: true,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = JwtSessionIssuer::new(&auth_config("test_secret"));
        let token = issuer.issue(&citizen()).unwrap();

        let claims = issuer.verify(&token.token).unwrap();
        assert_eq!(claims.sub, "user1");
        assert_eq!(claims.role, "citizen");
        assert_eq!(claims.iss, "civicdesk-test");
        assert_eq!(claims.exp, token.expires_at.timestamp());
        assert!(token.expires_at > Utc::now() + Duration::hours(23));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtSessionIssuer::new(&auth_config("secret1"));
        let other = JwtSessionIssuer::new(&auth_config("secret2"));

        let token = issuer.issue(&citizen()).unwrap();
        assert!(matches!(
            other.verify(&token.token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let issuer = JwtSessionIssuer::new(&auth_config("secret"));
        assert!(issuer.verify("not-a-token").is_err());
    }
}
