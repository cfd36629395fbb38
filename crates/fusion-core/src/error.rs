use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Entity kinds that can be reported as missing by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Agent,
    Chat,
}

impl Resource {
    /// Key used for this resource in structured error details
    pub fn id_key(&self) -> &'static str {
        match self {
            Resource::Agent => "agent_id",
            Resource::Chat => "chat_id",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Agent => write!(f, "Agent"),
            Resource::Chat => write!(f, "Chat"),
        }
    }
}

/// Main error type for the Fusion client
#[derive(Error, Debug)]
pub enum FusionError {
    /// Invalid or missing credentials (401)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Credentials lack permission for the resource (403)
    #[error("Authorization failed: {message}")]
    Authorization { message: String },

    /// Rate limiting errors (429)
    #[error("Rate limit exceeded: {message}. Retry after: {retry_after:?}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// An agent or chat addressed by the request does not exist (404)
    #[error("{resource} '{id}' not found")]
    NotFound { resource: Resource, id: String },

    /// Validation errors for requests
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Connection-level failures
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Client-side timeout
    ///
    /// `duration` is the configured limit when the transport knows it.
    #[error("Request timed out: {message}")]
    Timeout {
        message: String,
        duration: Option<Duration>,
    },

    /// Server-side failure (5xx)
    #[error("Server error [{status}]: {message}")]
    Server { message: String, status: u16 },

    /// Client errors not covered by a more specific variant
    #[error("API error [{status}]: {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// The circuit breaker is open and the backend is considered unavailable
    #[error("Service unavailable: circuit breaker is open (retry in {retry_in:?})")]
    ServiceUnavailable { retry_in: Option<Duration> },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FusionError {
    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Create a not-found error for an agent or chat
    pub fn not_found(resource: Resource, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error pointing at the offending field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            message: message.into(),
            duration: Some(duration),
        }
    }

    /// Create a server error
    pub fn server(message: impl Into<String>, status: u16) -> Self {
        Self::Server {
            message: message.into(),
            status,
        }
    }

    /// Create a generic API (client) error
    pub fn api(status: u16, message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            details,
        }
    }

    /// Create a service unavailable error
    pub fn service_unavailable(retry_in: Option<Duration>) -> Self {
        Self::ServiceUnavailable { retry_in }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Check if the error is retryable.
    ///
    /// Only transport-level failures and 5xx responses are retried. Rate limits
    /// carry their own `retry_after` and are left to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FusionError::Network { .. } | FusionError::Timeout { .. } | FusionError::Server { .. }
        )
    }

    /// HTTP status associated with the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FusionError::Authentication { .. } => Some(401),
            FusionError::Authorization { .. } => Some(403),
            FusionError::RateLimit { .. } => Some(429),
            FusionError::NotFound { .. } => Some(404),
            FusionError::Validation { .. } => Some(400),
            FusionError::Timeout { .. } => Some(408),
            FusionError::Server { status, .. } | FusionError::Api { status, .. } => Some(*status),
            FusionError::ServiceUnavailable { .. } => Some(503),
            FusionError::Network { .. }
            | FusionError::Configuration { .. }
            | FusionError::Serialization { .. } => None,
        }
    }

    /// Structured details for programmatic handling
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            FusionError::RateLimit {
                retry_after: Some(delay),
                ..
            } => Some(serde_json::json!({ "retry_after": delay.as_secs() })),
            FusionError::NotFound { resource, id } => {
                let mut details = serde_json::Map::new();
                details.insert(resource.id_key().to_string(), id.clone().into());
                Some(serde_json::Value::Object(details))
            }
            FusionError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            FusionError::Server { status, .. } => Some(serde_json::json!({ "status": status })),
            FusionError::Timeout {
                duration: Some(limit),
                ..
            } => Some(serde_json::json!({ "timeout_ms": limit.as_millis() as u64 })),
            FusionError::Api {
                status, details, ..
            } => match details {
                Some(details) => Some(details.clone()),
                None => Some(serde_json::json!({ "status": status })),
            },
            FusionError::ServiceUnavailable {
                retry_in: Some(delay),
            } => Some(serde_json::json!({ "retry_in_ms": delay.as_millis() as u64 })),
            _ => None,
        }
    }
}

/// Convert from reqwest errors
impl From<reqwest::Error> for FusionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FusionError::Timeout {
                message: err.to_string(),
                duration: None,
            }
        } else if err.is_connect() {
            FusionError::network_with_source("Connection failed", err)
        } else if err.is_decode() {
            FusionError::serialization("Failed to decode response body", err)
        } else {
            FusionError::network_with_source("HTTP request failed", err)
        }
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for FusionError {
    fn from(err: serde_json::Error) -> Self {
        FusionError::serialization("JSON serialization failed", err)
    }
}
