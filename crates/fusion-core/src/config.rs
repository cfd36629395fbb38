use crate::error::FusionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Production endpoint used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://api.fusion.com/v1";

/// Prefix shared by every environment variable read by [`FusionConfig::from_env`]
pub const ENV_PREFIX: &str = "FUSION_";

/// Flat configuration for a [`FusionClient`](crate::FusionClient)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: f64,
    pub max_retries: u32,
    pub enable_cache: bool,
    pub cache_ttl_seconds: u64,
    pub cache_max_size: usize,
    pub rate_limit_calls: u32,
    pub rate_limit_window_seconds: u64,
    /// Base delay of the exponential backoff
    pub retry_backoff_seconds: f64,
    /// Upper bound for a single backoff delay
    pub retry_max_backoff_seconds: f64,
    pub retry_jitter: bool,
    /// Consecutive backend failures before the circuit opens
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout_seconds: f64,
    /// Log every request and response status
    pub enable_tracing: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30.0,
            max_retries: 3,
            enable_cache: true,
            cache_ttl_seconds: 300,
            cache_max_size: 1000,
            rate_limit_calls: 100,
            rate_limit_window_seconds: 60,
            retry_backoff_seconds: 1.0,
            retry_max_backoff_seconds: 60.0,
            retry_jitter: true,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_seconds: 60.0,
            enable_tracing: false,
        }
    }
}

impl FusionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: f64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff_seconds: f64, max_backoff_seconds: f64, jitter: bool) -> Self {
        self.retry_backoff_seconds = backoff_seconds;
        self.retry_max_backoff_seconds = max_backoff_seconds;
        self.retry_jitter = jitter;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    pub fn with_cache_limits(mut self, ttl_seconds: u64, max_size: usize) -> Self {
        self.cache_ttl_seconds = ttl_seconds;
        self.cache_max_size = max_size;
        self
    }

    pub fn with_rate_limit(mut self, calls: u32, window_seconds: u64) -> Self {
        self.rate_limit_calls = calls;
        self.rate_limit_window_seconds = window_seconds;
        self
    }

    pub fn with_circuit_breaker(mut self, threshold: u32, timeout_seconds: f64) -> Self {
        self.circuit_breaker_threshold = threshold;
        self.circuit_breaker_timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }

    pub fn circuit_breaker_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.circuit_breaker_timeout_seconds)
    }

    /// Base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Default headers sent with every request
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert(
            "User-Agent".to_string(),
            format!("fusion-client/{}", env!("CARGO_PKG_VERSION")),
        );
        headers
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FusionError> {
        if self.api_key.trim().is_empty() {
            return Err(FusionError::configuration("API key is required"));
        }

        if self.base_url.is_empty() {
            return Err(FusionError::configuration("Base URL is required"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(FusionError::configuration(
                "Base URL must be a valid HTTP/HTTPS URL",
            ));
        }

        if !(self.timeout_seconds.is_finite() && self.timeout_seconds > 0.0) {
            return Err(FusionError::configuration("Timeout must be positive"));
        }

        // A zero budget would never admit a call
        if self.rate_limit_calls == 0 {
            return Err(FusionError::configuration(
                "rate_limit_calls must be greater than zero",
            ));
        }

        if self.enable_cache && self.cache_max_size == 0 {
            return Err(FusionError::configuration(
                "cache_max_size must be greater than zero when caching is enabled",
            ));
        }

        if self.retry_backoff_seconds < 0.0 || self.retry_max_backoff_seconds < 0.0 {
            return Err(FusionError::configuration(
                "Backoff durations cannot be negative",
            ));
        }

        if self.circuit_breaker_threshold == 0 {
            return Err(FusionError::configuration(
                "circuit_breaker_threshold must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Create a config from `FUSION_*` environment variables
    pub fn from_env() -> Result<Self, FusionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup, starting from defaults.
    ///
    /// Variables that are present but unparsable are reported as configuration
    /// errors rather than silently ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FusionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let api_key = var("API_KEY").ok_or_else(|| {
            FusionError::configuration("FUSION_API_KEY environment variable not set")
        })?;

        let mut config = FusionConfig::new(api_key);

        if let Some(base_url) = var("BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(value) = var("TIMEOUT") {
            config.timeout_seconds = parse_var("FUSION_TIMEOUT", &value)?;
        }
        if let Some(value) = var("MAX_RETRIES") {
            config.max_retries = parse_var("FUSION_MAX_RETRIES", &value)?;
        }
        if let Some(value) = var("CACHE_ENABLED") {
            config.enable_cache = parse_bool("FUSION_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = var("CACHE_TTL") {
            config.cache_ttl_seconds = parse_var("FUSION_CACHE_TTL", &value)?;
        }
        if let Some(value) = var("CACHE_MAX_SIZE") {
            config.cache_max_size = parse_var("FUSION_CACHE_MAX_SIZE", &value)?;
        }
        if let Some(value) = var("RATE_LIMIT_CALLS") {
            config.rate_limit_calls = parse_var("FUSION_RATE_LIMIT_CALLS", &value)?;
        }
        if let Some(value) = var("RATE_LIMIT_WINDOW") {
            config.rate_limit_window_seconds = parse_var("FUSION_RATE_LIMIT_WINDOW", &value)?;
        }
        if let Some(value) = var("ENABLE_TRACING") {
            config.enable_tracing = parse_bool("FUSION_ENABLE_TRACING", &value)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, FusionError> {
    value
        .trim()
        .parse()
        .map_err(|_| FusionError::configuration(format!("Invalid value for {name}: '{value}'")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, FusionError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FusionError::configuration(format!(
            "Invalid boolean for {name}: '{value}'"
        ))),
    }
}

/// Utility functions for parsing retry timing from HTTP headers
pub mod retry_parsing {
    use std::str::FromStr;
    use std::time::Duration;

    /// Parse a `Retry-After` header value in its delta-seconds form.
    ///
    /// HTTP-date values are not supported and yield `None`.
    pub fn parse_retry_after(value: &str) -> Option<Duration> {
        u64::from_str(value.trim()).ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = FusionConfig::new("key");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert!(config.enable_cache);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache_max_size, 1000);
        assert_eq!(config.rate_limit_calls, 100);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        config.validate().unwrap();
    }

    #[test]
    fn headers_carry_bearer_token() {
        let headers = FusionConfig::new("secret").headers();
        assert_eq!(
            headers.get("Authorization"),
            Some(&"Bearer secret".to_string())
        );
        assert_eq!(
            headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );
        assert!(headers["User-Agent"].starts_with("fusion-client/"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(FusionConfig::new("").validate().is_err());
        assert!(
            FusionConfig::new("k")
                .with_base_url("ftp://example.com")
                .validate()
                .is_err()
        );
        assert!(FusionConfig::new("k").with_rate_limit(0, 60).validate().is_err());
        assert!(FusionConfig::new("k").with_timeout(0.0).validate().is_err());
        assert!(
            FusionConfig::new("k")
                .with_cache_limits(300, 0)
                .validate()
                .is_err()
        );
        // A zero-sized cache is fine when caching is off
        FusionConfig::new("k")
            .with_cache(false)
            .with_cache_limits(300, 0)
            .validate()
            .unwrap();
    }

    #[test]
    fn api_base_strips_trailing_slash() {
        let config = FusionConfig::new("k").with_base_url("http://localhost:8080/api/");
        assert_eq!(config.api_base(), "http://localhost:8080/api");
    }

    #[test]
    fn from_lookup_reads_prefixed_variables() {
        let config = FusionConfig::from_lookup(lookup_from(&[
            ("FUSION_API_KEY", "env-key"),
            ("FUSION_BASE_URL", "http://localhost:9000"),
            ("FUSION_TIMEOUT", "12.5"),
            ("FUSION_MAX_RETRIES", "5"),
            ("FUSION_CACHE_ENABLED", "false"),
            ("FUSION_RATE_LIMIT_CALLS", "10"),
            ("FUSION_RATE_LIMIT_WINDOW", "1"),
        ]))
        .unwrap();

        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.timeout(), Duration::from_millis(12_500));
        assert_eq!(config.max_retries, 5);
        assert!(!config.enable_cache);
        assert_eq!(config.rate_limit_calls, 10);
        assert_eq!(config.rate_limit_window_seconds, 1);
    }

    #[test]
    fn from_lookup_requires_api_key() {
        let err = FusionConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, FusionError::Configuration { .. }));
    }

    #[test]
    fn from_lookup_rejects_garbage() {
        let err = FusionConfig::from_lookup(lookup_from(&[
            ("FUSION_API_KEY", "k"),
            ("FUSION_MAX_RETRIES", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("FUSION_MAX_RETRIES"));
    }

    #[test]
    fn deserializes_partial_toml_like_input() {
        let config: FusionConfig =
            serde_json::from_str(r#"{"api_key": "k", "cache_ttl_seconds": 10}"#).unwrap();
        assert_eq!(config.cache_ttl_seconds, 10);
        assert_eq!(config.cache_max_size, 1000);
    }

    #[test]
    fn retry_after_parsing() {
        use retry_parsing::parse_retry_after;
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 2 "), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
