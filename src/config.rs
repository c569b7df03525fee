use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::CircuitBreakerConfig;

// ============================================================================
// Configuration
// ============================================================================
//
// Everything comes from the environment (a `.env` file is loaded by the
// binary first). Unparsable values fall back to the default with a warning.
//
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub token: Option<BearerToken>,
    pub timeout: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(10),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, or a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_defaults = BackendConfig::default();
        let breaker_defaults = backend_defaults.circuit_breaker.clone();
        let metrics_defaults = MetricsConfig::default();

        let backend = BackendConfig {
            base_url: lookup("ORDER_API_BASE_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(backend_defaults.base_url),
            token: lookup("ORDER_API_TOKEN")
                .filter(|token| !token.is_empty())
                .map(BearerToken::new),
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "ORDER_API_TIMEOUT_SECS",
                backend_defaults.timeout.as_secs(),
            )),
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parse_or(
                    &lookup,
                    "ORDER_API_CB_FAILURE_THRESHOLD",
                    breaker_defaults.failure_threshold,
                ),
                cool_down: Duration::from_secs(parse_or(
                    &lookup,
                    "ORDER_API_CB_TIMEOUT_SECS",
                    breaker_defaults.cool_down.as_secs(),
                )),
                success_threshold: parse_or(
                    &lookup,
                    "ORDER_API_CB_SUCCESS_THRESHOLD",
                    breaker_defaults.success_threshold,
                ),
            },
        };

        let metrics = MetricsConfig {
            enabled: parse_or(&lookup, "METRICS_ENABLED", metrics_defaults.enabled),
            port: parse_or(&lookup, "METRICS_PORT", metrics_defaults.port),
        };

        Self { backend, metrics }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Ignoring unparsable config value");
            default
        }),
        None => default,
    }
}

/// Bearer credential for the backend. Never printed.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the Authorization header only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}
