//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Public portal configuration.
    pub portal: PortalConfig,
    /// One-time-code verification settings.
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Complaint settings.
    #[serde(default)]
    pub complaint: ComplaintConfig,
    /// Bearer token issuance settings.
    pub auth: AuthConfig,
    /// Outgoing mail settings. Codes are only logged when absent.
    #[serde(default)]
    pub email: Option<EmailConfig>,
    /// Periodic maintenance settings.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Public portal configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// Portal display name, used in mail subjects.
    #[serde(default = "default_portal_name")]
    pub name: String,
    /// Public URL of the portal.
    pub url: String,
}

/// One-time-code verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Number of digits in an issued code.
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    /// Lifetime of a verification session in seconds.
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: i64,
    /// Failed attempts allowed before the session is destroyed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

/// Complaint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ComplaintConfig {
    /// Prefix of human-readable complaint numbers (`PREFIX-YEAR-NNN`).
    #[serde(default = "default_number_prefix")]
    pub number_prefix: String,
}

/// Bearer token issuance settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing session tokens.
    pub jwt_secret: String,
    /// Issuer claim.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Token lifetime in hours.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

/// SMTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// SMTP host.
    pub smtp_host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// From address.
    pub from_address: String,
    /// From display name.
    #[serde(default = "default_portal_name")]
    pub from_name: String,
}

/// Periodic maintenance settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Interval between expired-session sweeps in seconds.
    #[serde(default = "default_session_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,
    /// Interval between notification cleanups in seconds.
    #[serde(default = "default_notification_cleanup_interval_secs")]
    pub notification_cleanup_interval_secs: u64,
    /// Read notifications older than this are deleted.
    #[serde(default = "default_notification_retention_days")]
    pub notification_retention_days: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            code_ttl_secs: default_code_ttl_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for ComplaintConfig {
    fn default() -> Self {
        Self {
            number_prefix: default_number_prefix(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            session_sweep_interval_secs: default_session_sweep_interval_secs(),
            notification_cleanup_interval_secs: default_notification_cleanup_interval_secs(),
            notification_retention_days: default_notification_retention_days(),
        }
    }
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_portal_name() -> String {
    "Civicdesk".to_string()
}

const fn default_code_length() -> usize {
    6
}

const fn default_code_ttl_secs() -> i64 {
    600
}

const fn default_max_attempts() -> i32 {
    3
}

fn default_number_prefix() -> String {
    "CMP".to_string()
}

fn default_issuer() -> String {
    "civicdesk".to_string()
}

const fn default_token_ttl_hours() -> i64 {
    24
}

const fn default_smtp_port() -> u16 {
    587
}

const fn default_session_sweep_interval_secs() -> u64 {
    300
}

const fn default_notification_cleanup_interval_secs() -> u64 {
    86400
}

const fn default_notification_retention_days() -> u32 {
    90
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `CIVICDESK_ENV`)
    /// 3. Environment variables with `CIVICDESK_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("CIVICDESK_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CIVICDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CIVICDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/civicdesk"

            [portal]
            url = "https://portal.example.org"

            [auth]
            jwt_secret = "secret"
            "#,
        );

        assert_eq!(config.verification.code_length, 6);
        assert_eq!(config.verification.code_ttl_secs, 600);
        assert_eq!(config.verification.max_attempts, 3);
        assert_eq!(config.complaint.number_prefix, "CMP");
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.database.max_connections, 100);
        assert_eq!(config.maintenance.notification_retention_days, 90);
        assert!(config.email.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/civicdesk"

            [portal]
            name = "Ward Portal"
            url = "https://portal.example.org"

            [complaint]
            number_prefix = "GRV"

            [auth]
            jwt_secret = "secret"
            issuer = "ward-portal"

            [email]
            smtp_host = "smtp.example.org"
            from_address = "noreply@example.org"
            "#,
        );

        assert_eq!(config.portal.name, "Ward Portal");
        assert_eq!(config.complaint.number_prefix, "GRV");
        assert_eq!(config.auth.issuer, "ward-portal");
        let email = config.email.unwrap();
        assert_eq!(email.smtp_port, 587);
        assert_eq!(email.from_name, "Civicdesk");
    }
}
