//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; the defaults target a local Medusa backend.
//!
//! - `MEDUSA_BASE_URL` - Commerce backend URL (default: `http://localhost:9000`)
//! - `MEDUSA_PUBLISHABLE_API_KEY` - Publishable API key sent with store requests
//! - `MEDUSA_MAX_RETRIES` - Retry budget for transient failures (default: 3)
//! - `MEDUSA_REGION_ID` - Region used when a cart is created lazily
//! - `STRIPE_PUBLISHABLE_KEY` - Key for client-side card confirmation
//! - `STRIPE_API_BASE` - Payment confirmation API (default: `https://api.stripe.com`)
//! - `CART_STORE_PATH` - Session store file (default: `~/.medusa-store/cart.json`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `LOG_FORMAT` - `pretty` (default) or `json`

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use medusa_store_core::RegionId;

const DEFAULT_MEDUSA_BASE_URL: &str = "http://localhost:9000";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
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

/// Storefront configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Commerce backend configuration
    pub medusa: MedusaConfig,
    /// Payment confirmation configuration
    pub stripe: StripeConfig,
    /// File holding the active cart identifier
    pub cart_store_path: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Log output format
    pub log_format: LogFormat,
}

/// Commerce backend configuration.
///
/// Implements `Debug` manually to redact the publishable key.
#[derive(Clone)]
pub struct MedusaConfig {
    /// Backend base URL
    pub base_url: Url,
    /// Publishable API key (scopes requests to a sales channel)
    pub publishable_key: Option<SecretString>,
    /// Retry budget for transient failures
    pub max_retries: u32,
    /// Base delay between retries, doubled on every attempt
    pub retry_backoff: Duration,
    /// Region used when a cart is created lazily
    pub region_id: Option<RegionId>,
}

impl MedusaConfig {
    /// Configuration for a backend at `base_url` with default retry policy.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            publishable_key: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            region_id: None,
        }
    }
}

impl std::fmt::Debug for MedusaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MedusaConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "publishable_key",
                &self.publishable_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("region_id", &self.region_id)
            .finish()
    }
}

/// Payment confirmation configuration.
///
/// Implements `Debug` manually to redact the publishable key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Publishable key used for client-side confirmation
    pub publishable_key: Option<SecretString>,
    /// API base URL
    pub api_base: Url,
}

impl StripeConfig {
    /// Configuration for a confirmation API at `api_base`.
    #[must_use]
    pub fn new(api_base: Url, publishable_key: impl Into<String>) -> Self {
        Self {
            publishable_key: Some(SecretString::from(publishable_key.into())),
            api_base,
        }
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field(
                "publishable_key",
                &self.publishable_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or a key looks like
    /// a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let medusa = MedusaConfig::from_env()?;
        let stripe = StripeConfig::from_env()?;
        let cart_store_path = match get_optional_env("CART_STORE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_cart_store_path()?,
        };
        let log_format = get_env_or_default("LOG_FORMAT", "pretty")
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::InvalidEnvVar("LOG_FORMAT".to_string(), e))?;

        Ok(Self {
            medusa,
            stripe,
            cart_store_path,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            log_format,
        })
    }
}

impl MedusaConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_retries = get_env_or_default("MEDUSA_MAX_RETRIES", "3")
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MEDUSA_MAX_RETRIES".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url: get_url("MEDUSA_BASE_URL", DEFAULT_MEDUSA_BASE_URL)?,
            publishable_key: get_optional_secret("MEDUSA_PUBLISHABLE_API_KEY")?,
            max_retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            region_id: get_optional_env("MEDUSA_REGION_ID").map(RegionId::new),
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            publishable_key: get_optional_secret("STRIPE_PUBLISHABLE_KEY")?,
            api_base: get_url("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a URL-valued environment variable.
fn get_url(key: &str, default: &str) -> Result<Url, ConfigError> {
    Url::parse(&get_env_or_default(key, default))
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Load an optional key, rejecting placeholder values.
fn get_optional_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    get_optional_env(key)
        .map(|value| {
            validate_not_placeholder(&value, key)?;
            Ok(SecretString::from(value))
        })
        .transpose()
}

/// Default session store location under the user's home directory.
fn default_cart_store_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".medusa-store").join("cart.json"))
        .ok_or_else(|| ConfigError::MissingEnvVar("CART_STORE_PATH".to_string()))
}

/// Validate that a key is not a placeholder copied from a sample `.env`.
fn validate_not_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}
