//! Error types and handling for the interval poller
//!
//! Every failure of the primary update path is one of these variants. Aggregate
//! failures are converted to text at the aggregate boundary and never surface here.

use thiserror::Error;

/// Result type alias for poller operations
pub type Result<T> = std::result::Result<T, LocalvoltsError>;

/// Main error type for the poller
#[derive(Debug, Error)]
pub enum LocalvoltsError {
    /// HTTP 401 from the metering API (bad API key)
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// HTTP 403 from the metering API (bad partner id)
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// 429 or 5xx on every attempt
    #[error("Rate limited: API returned {status} after {attempts} attempts")]
    RateLimited { status: u16, attempts: u32 },

    /// Successful response with an empty interval list
    #[error("No data received: {message}")]
    EmptyResult { message: String },

    /// Response body is not a list of interval readings
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// Connection failures and unexpected HTTP statuses
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The batch contained no finalized reading
    #[error("No final data: {message}")]
    NoFinalData { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Per-attempt request timeout
    #[error("Timeout error: {message}")]
    Timeout { message: String },
}

impl LocalvoltsError {
    /// Create a new authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        LocalvoltsError::Auth {
            message: message.into(),
        }
    }

    /// Create a new forbidden error
    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        LocalvoltsError::Forbidden {
            message: message.into(),
        }
    }

    /// Create a new rate-limit error
    pub fn rate_limited(status: u16, attempts: u32) -> Self {
        LocalvoltsError::RateLimited { status, attempts }
    }

    /// Create a new empty-result error
    pub fn empty_result<S: Into<String>>(message: S) -> Self {
        LocalvoltsError::EmptyResult {
            message: message.into(),
        }
    }

    /// Create a new malformed-response error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        LocalvoltsError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        LocalvoltsError::Transport {
            message: message.into(),
        }
    }

    /// Create a new no-final-data error
    pub fn no_final_data<S: Into<String>>(message: S) -> Self {
        LocalvoltsError::NoFinalData {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        LocalvoltsError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        LocalvoltsError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        LocalvoltsError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        LocalvoltsError::Timeout {
            message: message.into(),
        }
    }

    /// Whether a later tick may succeed without operator action.
    ///
    /// Credential and configuration problems need a human; everything else
    /// (rate limits, outages, a missing final reading) can clear on its own.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LocalvoltsError::Auth { .. }
                | LocalvoltsError::Forbidden { .. }
                | LocalvoltsError::Config { .. }
                | LocalvoltsError::Validation { .. }
        )
    }
}

impl From<std::io::Error> for LocalvoltsError {
    fn from(err: std::io::Error) -> Self {
        LocalvoltsError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for LocalvoltsError {
    fn from(err: serde_yaml::Error) -> Self {
        LocalvoltsError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LocalvoltsError {
    fn from(err: serde_json::Error) -> Self {
        LocalvoltsError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for LocalvoltsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LocalvoltsError::timeout(err.to_string())
        } else {
            LocalvoltsError::transport(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for LocalvoltsError {
    fn from(err: chrono::ParseError) -> Self {
        LocalvoltsError::validation("datetime".to_string(), err.to_string())
    }
}
