use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// HTTP status that triggers the refresh flow
pub const UNAUTHORIZED: u16 = 401;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Authentication errors
    NoRefreshToken,
    RefreshRejected,

    // HTTP errors
    RequestFailed,
    Transport,
    InvalidResponse,

    // Token storage errors
    Storage,

    // Configuration related errors
    ConfigInvalid,
    ConfigMissing,

    // General errors
    Internal,
}

/// Error categories used to decide how callers should react
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The session cannot be recovered without a new login
    Authentication,
    /// Connection failures, timeouts, DNS
    Network,
    /// 5xx responses from the backend
    Server,
    /// 4xx responses other than an unrecoverable 401
    Client,
    /// Invalid or missing configuration
    Configuration,
    /// Token storage could not be read or written
    Storage,
    /// Bugs and broken invariants
    Internal,
}

/// Gateway error type.
///
/// Every variant owns its data as plain strings so the error is `Clone`; a
/// single refresh outcome is handed to every request waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Refresh token rejected by the server (status {status})")]
    RefreshRejected { status: u16, body: String },

    #[error("Request to {url} failed with status {status}")]
    RequestFailed {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Token storage error: {reason}")]
    Storage { reason: String },

    #[error("Invalid configuration value for '{key}': {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Required configuration key '{key}' is missing")]
    ConfigMissing { key: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoRefreshToken => ErrorCode::NoRefreshToken,
            Self::RefreshRejected { .. } => ErrorCode::RefreshRejected,
            Self::RequestFailed { .. } => ErrorCode::RequestFailed,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::InvalidResponse { .. } => ErrorCode::InvalidResponse,
            Self::Storage { .. } => ErrorCode::Storage,
            Self::ConfigInvalid { .. } => ErrorCode::ConfigInvalid,
            Self::ConfigMissing { .. } => ErrorCode::ConfigMissing,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoRefreshToken | Self::RefreshRejected { .. } => ErrorCategory::Authentication,
            Self::RequestFailed { status, .. } => match *status {
                UNAUTHORIZED => ErrorCategory::Authentication,
                s if s >= 500 => ErrorCategory::Server,
                _ => ErrorCategory::Client,
            },
            Self::Transport { .. } => ErrorCategory::Network,
            Self::InvalidResponse { .. } | Self::Internal(_) => ErrorCategory::Internal,
            Self::Storage { .. } => ErrorCategory::Storage,
            Self::ConfigInvalid { .. } | Self::ConfigMissing { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RefreshRejected { status, .. } | Self::RequestFailed { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// True when the error means the session is gone
    pub fn is_auth_failure(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }

    /// True for a response with status 401
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(UNAUTHORIZED)
    }

    /// Response body carried by the error, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::RefreshRejected { body, .. } | Self::RequestFailed { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::NoRefreshToken => "no_refresh_token",
            Self::RefreshRejected => "refresh_rejected",
            Self::RequestFailed => "request_failed",
            Self::Transport => "transport",
            Self::InvalidResponse => "invalid_response",
            Self::Storage => "storage",
            Self::ConfigInvalid => "config_invalid",
            Self::ConfigMissing => "config_missing",
            Self::Internal => "internal",
        };
        write!(f, "{}", code)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Network => write!(f, "network"),
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
            Self::Configuration => write!(f, "configuration"),
            Self::Storage => write!(f, "storage"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            invalid_response(err)
        } else {
            transport(err)
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        json_error(&err)
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        storage(err)
    }
}

/// Result type alias for the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

pub fn request_failed(url: impl Into<String>, status: u16, body: impl Into<String>) -> GatewayError {
    GatewayError::RequestFailed {
        url: url.into(),
        status,
        body: body.into(),
    }
}

pub fn refresh_rejected(status: u16, body: impl Into<String>) -> GatewayError {
    GatewayError::RefreshRejected {
        status,
        body: body.into(),
    }
}

pub fn transport(reason: impl fmt::Display) -> GatewayError {
    GatewayError::Transport {
        reason: reason.to_string(),
    }
}

pub fn invalid_response(reason: impl fmt::Display) -> GatewayError {
    GatewayError::InvalidResponse {
        reason: reason.to_string(),
    }
}

/// Describe a JSON failure by kind and position only.
///
/// serde messages can quote values from the input, and bodies handled here
/// carry tokens.
pub fn json_error(err: &serde_json::Error) -> GatewayError {
    use serde_json::error::Category;

    let kind = match err.classify() {
        Category::Io => "unreadable",
        Category::Syntax => "malformed",
        Category::Data => "unexpected",
        Category::Eof => "truncated",
    };
    invalid_response(format!(
        "{} JSON at line {} column {}",
        kind,
        err.line(),
        err.column()
    ))
}

pub fn storage(reason: impl fmt::Display) -> GatewayError {
    GatewayError::Storage {
        reason: reason.to_string(),
    }
}

pub fn config_invalid(key: &str, reason: impl fmt::Display) -> GatewayError {
    GatewayError::ConfigInvalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn config_missing(key: &str) -> GatewayError {
    GatewayError::ConfigMissing {
        key: key.to_string(),
    }
}
