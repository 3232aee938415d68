//! Back-office configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LIVESHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `LIVESHOP_BASE_URL` - Public URL of the back-office
//! - `LIVESHOP_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `LIVESHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `LIVESHOP_PORT` - Listen port (default: 3002)
//! - `LIVESHOP_LOG_JSON` - Emit JSON logs when set
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (Facebook - enables comment import)
//! - `FACEBOOK_PAGE_ID` - Page whose live videos are read
//! - `FACEBOOK_PAGE_ACCESS_TOKEN` - Page access token
//! - `FACEBOOK_GRAPH_URL` - Graph API host (default: <https://graph.facebook.com>)
//! - `FACEBOOK_API_VERSION` - Graph API version (default: v19.0)
//! - `FACEBOOK_APP_SECRET` - App secret used to verify webhook signatures
//! - `FACEBOOK_VERIFY_TOKEN` - Token echoed back during webhook subscription
//!
//! ## Optional (TPOS - enables order sync)
//! - `TPOS_USERNAME` / `TPOS_PASSWORD` - TPOS account credentials
//! - `TPOS_BASE_URL` - TPOS host (default: <https://tomato.tpos.vn>)
//!
//! ## Optional (TLS)
//! - `LIVESHOP_TLS_CERT` - PEM-encoded certificate chain
//! - `LIVESHOP_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";
const DEFAULT_GRAPH_VERSION: &str = "v19.0";
const DEFAULT_TPOS_URL: &str = "https://tomato.tpos.vn";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Back-office configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the back-office
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Facebook Graph configuration (optional - comment import)
    pub facebook: Option<FacebookConfig>,
    /// TPOS configuration (optional - order sync)
    pub tpos: Option<TposConfig>,
    /// Emit JSON logs instead of text
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// Facebook Graph API configuration.
///
/// Implements `Debug` manually to redact the page token and app secret.
#[derive(Clone)]
pub struct FacebookConfig {
    /// Page ID whose videos are listed
    pub page_id: String,
    /// Page access token
    pub page_access_token: SecretString,
    /// Graph API host, overridable for tests
    pub graph_url: String,
    /// Graph API version (e.g., v19.0)
    pub api_version: String,
    /// App secret for `X-Hub-Signature-256` verification
    pub app_secret: Option<SecretString>,
    /// Webhook subscription verify token
    pub verify_token: Option<SecretString>,
}

impl std::fmt::Debug for FacebookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacebookConfig")
            .field("page_id", &self.page_id)
            .field("page_access_token", &"[REDACTED]")
            .field("graph_url", &self.graph_url)
            .field("api_version", &self.api_version)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field("verify_token", &self.verify_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl FacebookConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let page_id = get_optional_env("FACEBOOK_PAGE_ID");
        let token = get_optional_env("FACEBOOK_PAGE_ACCESS_TOKEN");

        match (page_id, token) {
            (Some(page_id), Some(token)) => {
                // Page tokens are long random strings
                validate_secret_strength(&token, "FACEBOOK_PAGE_ACCESS_TOKEN")?;
                let app_secret = get_optional_env("FACEBOOK_APP_SECRET").map(SecretString::from);
                let verify_token =
                    get_optional_env("FACEBOOK_VERIFY_TOKEN").map(SecretString::from);
                Ok(Some(Self {
                    page_id,
                    page_access_token: SecretString::from(token),
                    graph_url: get_env_or_default("FACEBOOK_GRAPH_URL", DEFAULT_GRAPH_URL),
                    api_version: get_env_or_default("FACEBOOK_API_VERSION", DEFAULT_GRAPH_VERSION),
                    app_secret,
                    verify_token,
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "FACEBOOK_*".to_string(),
                "Both FACEBOOK_PAGE_ID and FACEBOOK_PAGE_ACCESS_TOKEN must be set together"
                    .to_string(),
            )),
        }
    }
}

/// TPOS account configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct TposConfig {
    /// TPOS host
    pub base_url: String,
    /// Account username
    pub username: String,
    /// Account password
    pub password: SecretString,
}

impl std::fmt::Debug for TposConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TposConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl TposConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let username = get_optional_env("TPOS_USERNAME");
        let password = get_optional_env("TPOS_PASSWORD");

        match (username, password) {
            (Some(username), Some(password)) => Ok(Some(Self {
                base_url: get_env_or_default("TPOS_BASE_URL", DEFAULT_TPOS_URL),
                username,
                password: SecretString::from(password),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "TPOS_*".to_string(),
                "Both TPOS_USERNAME and TPOS_PASSWORD must be set together".to_string(),
            )),
        }
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("LIVESHOP_TLS_CERT");
        let key_pem = get_optional_env("LIVESHOP_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "LIVESHOP_TLS_*".to_string(),
                "Both LIVESHOP_TLS_CERT and LIVESHOP_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("LIVESHOP_DATABASE_URL")?;
        let host = get_env_or_default("LIVESHOP_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("LIVESHOP_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("LIVESHOP_PORT", "3002")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("LIVESHOP_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("LIVESHOP_BASE_URL")?;
        let session_secret = get_validated_secret("LIVESHOP_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "LIVESHOP_SESSION_SECRET")?;

        let facebook = FacebookConfig::from_env()?;
        let tpos = TposConfig::from_env()?;
        let log_json = get_optional_env("LIVESHOP_LOG_JSON").is_some();
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            facebook,
            tpos,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns the Facebook configuration, if comment import is enabled.
    #[must_use]
    pub const fn facebook(&self) -> Option<&FacebookConfig> {
        self.facebook.as_ref()
    }

    /// Returns the TPOS configuration, if order sync is enabled.
    #[must_use]
    pub const fn tpos(&self) -> Option<&TposConfig> {
        self.tpos.as_ref()
    }

    /// Whether session cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Load only the database URL, for tools that do not serve HTTP.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither `LIVESHOP_DATABASE_URL`
/// nor `DATABASE_URL` is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_database_url("LIVESHOP_DATABASE_URL")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: SecretString::from("postgres://localhost/liveshop"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3002,
            base_url: "http://localhost:3002".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            facebook: None,
            tpos: None,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
            tls: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-page-token-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3002);
    }

    #[test]
    fn test_secure_cookies_follow_base_url() {
        let mut config = test_config();
        assert!(!config.secure_cookies());
        config.base_url = "https://shop.example.vn".to_string();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_facebook_config_debug_redacts_secrets() {
        let config = FacebookConfig {
            page_id: "1234567890".to_string(),
            page_access_token: SecretString::from("EAAG-super-long-page-token"),
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            api_version: DEFAULT_GRAPH_VERSION.to_string(),
            app_secret: Some(SecretString::from("f00dfacecafe")),
            verify_token: None,
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("1234567890"));
        assert!(debug_output.contains("v19.0"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("EAAG-super-long-page-token"));
        assert!(!debug_output.contains("f00dfacecafe"));
    }

    #[test]
    fn test_tpos_config_debug_redacts_password() {
        let config = TposConfig {
            base_url: DEFAULT_TPOS_URL.to_string(),
            username: "shop-owner".to_string(),
            password: SecretString::from("hunter2-but-longer"),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("shop-owner"));
        assert!(!debug_output.contains("hunter2-but-longer"));
    }
}
