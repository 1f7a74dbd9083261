//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LARDER_API_URL` - Root of the backing REST service (e.g. `http://localhost:8000/api/`)
//!
//! ## Optional
//! - `LARDER_API_TOKEN` - Bearer token sent with every request
//! - `LARDER_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `LARDER_CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `LARDER_SHIPPING_FLAT` - Flat shipping charge (default: 10.00)
//! - `LARDER_TAX_RATE` - Flat tax rate as a fraction (default: 0.07)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use larder_core::Money;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_SHIPPING_FLAT: &str = "10.00";
const DEFAULT_TAX_RATE: &str = "0.07";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
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

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backing service connection
    pub api: ApiConfig,
    /// Advisory checkout pricing
    pub pricing: PricingConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backing REST service configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Service root. Always ends in `/` so resource paths join beneath it.
    pub base_url: Url,
    /// Bearer token, if the service requires one
    pub token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long catalog reads stay cached
    pub catalog_cache_ttl: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("catalog_cache_ttl", &self.catalog_cache_ttl)
            .finish()
    }
}

impl ApiConfig {
    /// Configuration for a service at `base_url` with default timeouts and no token.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL does not parse or is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("LARDER_API_URL", base_url)?,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
        })
    }
}

/// Flat pricing used for the advisory checkout totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    /// Shipping charge added to every order
    pub shipping_flat: Money,
    /// Tax rate applied to the subtotal (0.07 = 7%)
    pub tax_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            shipping_flat: Money::from_cents(1000),
            tax_rate: Decimal::new(7, 2),
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
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`StorefrontConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        Ok(Self {
            api: ApiConfig::from_vars(&vars)?,
            pricing: PricingConfig::from_vars(&vars)?,
            sentry_dsn: vars.optional("SENTRY_DSN"),
            sentry_environment: vars.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

impl ApiConfig {
    fn from_vars(vars: &Vars<'_>) -> Result<Self, ConfigError> {
        let base_url = parse_base_url("LARDER_API_URL", &vars.required("LARDER_API_URL")?)?;

        let token = match vars.optional("LARDER_API_TOKEN") {
            Some(value) => {
                validate_secret_strength(&value, "LARDER_API_TOKEN")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        let timeout = vars.parsed::<u64>("LARDER_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "LARDER_HTTP_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let ttl = vars.parsed::<u64>(
            "LARDER_CATALOG_CACHE_TTL_SECS",
            DEFAULT_CATALOG_CACHE_TTL_SECS,
        )?;

        Ok(Self {
            base_url,
            token,
            timeout: Duration::from_secs(timeout),
            catalog_cache_ttl: Duration::from_secs(ttl),
        })
    }
}

impl PricingConfig {
    fn from_vars(vars: &Vars<'_>) -> Result<Self, ConfigError> {
        let shipping = parse_decimal(
            "LARDER_SHIPPING_FLAT",
            &vars.or_default("LARDER_SHIPPING_FLAT", DEFAULT_SHIPPING_FLAT),
        )?;
        let tax_rate = parse_decimal(
            "LARDER_TAX_RATE",
            &vars.or_default("LARDER_TAX_RATE", DEFAULT_TAX_RATE),
        )?;

        if tax_rate > Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "LARDER_TAX_RATE".to_string(),
                "must be a fraction between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            shipping_flat: Money::new(shipping).rounded(),
            tax_rate,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    /// Get an optional variable. Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

/// Parse a service root, forcing a trailing slash so `Url::join` keeps the
/// path prefix.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    let parsed = Decimal::from_str(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if parsed.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(parsed)
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

    #[allow(clippy::cast_precision_loss)] // Token length will never exceed f64 precision
    let len = s.chars().count() as f64;
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("LARDER_API_URL", "http://localhost:8000/api")]).unwrap();

        assert_eq!(config.api.base_url.as_str(), "http://localhost:8000/api/");
        assert!(config.api.token.is_none());
        assert_eq!(config.api.timeout, Duration::from_secs(10));
        assert_eq!(config.api.catalog_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.pricing, PricingConfig::default());
        assert_eq!(config.pricing.shipping_flat.to_string(), "10.00");
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_api_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "LARDER_API_URL"));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = load(&[("LARDER_API_URL", "ftp://files.example/api/")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));
    }

    #[test]
    fn test_pricing_overrides() {
        let config = load(&[
            ("LARDER_API_URL", "https://shop.example/api/"),
            ("LARDER_SHIPPING_FLAT", "4.5"),
            ("LARDER_TAX_RATE", "0.2"),
        ])
        .unwrap();
        assert_eq!(config.pricing.shipping_flat, Money::from_cents(450));
        assert_eq!(config.pricing.tax_rate, Decimal::new(2, 1));
    }

    #[test]
    fn test_rejects_bad_pricing() {
        let err = load(&[
            ("LARDER_API_URL", "https://shop.example/api/"),
            ("LARDER_TAX_RATE", "7"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "LARDER_TAX_RATE"));

        let err = load(&[
            ("LARDER_API_URL", "https://shop.example/api/"),
            ("LARDER_SHIPPING_FLAT", "-1"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = load(&[
            ("LARDER_API_URL", "https://shop.example/api/"),
            ("LARDER_HTTP_TIMEOUT_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));
    }

    #[test]
    fn test_placeholder_token_rejected() {
        let err = load(&[
            ("LARDER_API_URL", "https://shop.example/api/"),
            ("LARDER_API_TOKEN", "your-token-here"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(..)));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_api_config_debug_redacts_token() {
        let config = load(&[
            ("LARDER_API_URL", "https://shop.example/api/"),
            ("LARDER_API_TOKEN", "tk_9fQ2mX7vLp4RzA8w"),
        ])
        .unwrap();

        let debug_output = format!("{:?}", config.api);
        assert!(debug_output.contains("shop.example"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("tk_9fQ2mX7vLp4RzA8w"));
    }
}
