//! Panel configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FIREBASE_API_KEY` - Firebase web API key (validated for entropy)
//! - `FIREBASE_PROJECT_ID` - Firebase project id
//!
//! ## Optional
//! - `PANEL_HOST` - Bind address (default: 127.0.0.1)
//! - `PANEL_PORT` - Listen port (default: 3100)
//! - `FIREBASE_AUTH_URL` - Identity Toolkit endpoint override
//! - `FIREBASE_TOKEN_URL` - Secure Token endpoint override
//! - `FIRESTORE_URL` - Firestore endpoint override
//! - `ADMIN_REGISTRY_COLLECTION` - Registry collection name (default: admins)
//! - `AUDIT_LOG_COLLECTION` - Audit collection name (default: auditLogs)
//! - `PANEL_ALLOWED_ORIGIN` - CORS origin for the SPA, if served elsewhere
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (0.0 to 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Sentry traces sample rate (0.0 to 1.0)
//! - `LOG_FORMAT` - `json` for structured log output

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

use crate::services::guard::GuardConfig;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

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

/// Panel application configuration.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Firebase endpoints and credentials
    pub firebase: FirebaseConfig,
    /// Admin registry collection name
    pub registry_collection: String,
    /// Audit log collection name
    pub audit_collection: String,
    /// CORS origin for the panel SPA, if served from another host
    pub allowed_origin: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Firebase web API key
    pub api_key: SecretString,
    /// Firebase project id
    pub project_id: String,
    /// Identity Toolkit endpoint
    pub auth_url: String,
    /// Secure Token endpoint
    pub token_url: String,
    /// Firestore endpoint
    pub firestore_url: String,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("firestore_url", &self.firestore_url)
            .finish()
    }
}

impl FirebaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("FIREBASE_API_KEY")?,
            project_id: get_required_env("FIREBASE_PROJECT_ID")?,
            auth_url: get_env_or_default("FIREBASE_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: get_env_or_default("FIREBASE_TOKEN_URL", DEFAULT_TOKEN_URL),
            firestore_url: get_env_or_default("FIRESTORE_URL", DEFAULT_FIRESTORE_URL),
        })
    }
}

impl PanelConfig {
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

        let host = get_env_or_default("PANEL_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("PANEL_HOST".to_owned(), e.to_string()))?;
        let port = get_env_or_default("PANEL_PORT", "3100")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PANEL_PORT".to_owned(), e.to_string()))?;

        let firebase = FirebaseConfig::from_env()?;
        let registry_collection = get_env_or_default("ADMIN_REGISTRY_COLLECTION", "admins");
        let audit_collection = get_env_or_default("AUDIT_LOG_COLLECTION", "auditLogs");
        let allowed_origin = get_optional_env("PANEL_ALLOWED_ORIGIN");
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            firebase,
            registry_collection,
            audit_collection,
            allowed_origin,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Collection names for the session guard.
    #[must_use]
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            registry_collection: self.registry_collection.clone(),
            audit_collection: self.audit_collection.clone(),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
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
                var_name.to_owned(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API keys have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
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

    #[test]
    fn shannon_entropy_of_repeated_char_is_zero() {
        assert!((shannon_entropy("kkkkkkk") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn shannon_entropy_of_two_balanced_chars_is_one_bit() {
        assert!((shannon_entropy("xy") - 1.0).abs() < 0.01);
    }

    #[test]
    fn validate_secret_strength_rejects_placeholders() {
        let result = validate_secret_strength("your-firebase-key", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn validate_secret_strength_rejects_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn validate_secret_strength_accepts_api_key_shaped_input() {
        let result = validate_secret_strength("AIzaSyD9k3B7mQ2xW8vR4nL6tJ1pH5gF0cE2aZ", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn firebase_config_debug_redacts_api_key() {
        let config = FirebaseConfig {
            api_key: SecretString::from("AIzaVeryRealKeyMaterial"),
            project_id: "crypted-prod".to_owned(),
            auth_url: DEFAULT_AUTH_URL.to_owned(),
            token_url: DEFAULT_TOKEN_URL.to_owned(),
            firestore_url: DEFAULT_FIRESTORE_URL.to_owned(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("crypted-prod"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("AIzaVeryRealKeyMaterial"));
    }

    #[test]
    fn socket_addr_combines_host_and_port() {
        let config = PanelConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3100,
            firebase: FirebaseConfig {
                api_key: SecretString::from("k"),
                project_id: "crypted-test".to_owned(),
                auth_url: DEFAULT_AUTH_URL.to_owned(),
                token_url: DEFAULT_TOKEN_URL.to_owned(),
                firestore_url: DEFAULT_FIRESTORE_URL.to_owned(),
            },
            registry_collection: "admins".to_owned(),
            audit_collection: "auditLogs".to_owned(),
            allowed_origin: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3100);

        let guard = config.guard_config();
        assert_eq!(guard.registry_collection, "admins");
    }
}
