//! Gateway configuration.
//!
//! Values come from [`GatewayConfig::default`], the environment (see
//! [`GatewayConfig::from_env`]) or the builder methods, and are checked by
//! [`GatewayConfig::validate`] before a gateway is built.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{config_invalid, config_missing, GatewayResult};
use crate::events::EVENT_BUS_CAPACITY;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REFRESH_PATH: &str = "/api/token/refresh/";
pub const DEFAULT_LOGIN_PATH: &str = "/api/token/";
pub const DEFAULT_REGISTER_PATH: &str = "/api/user/register/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_BASE_URL: &str = "PORTFOLIO_API_BASE_URL";
pub const ENV_REFRESH_PATH: &str = "PORTFOLIO_REFRESH_PATH";
pub const ENV_LOGIN_PATH: &str = "PORTFOLIO_LOGIN_PATH";
pub const ENV_REGISTER_PATH: &str = "PORTFOLIO_REGISTER_PATH";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "PORTFOLIO_REQUEST_TIMEOUT_SECS";
pub const ENV_EVENT_CAPACITY: &str = "PORTFOLIO_EVENT_CAPACITY";
pub const ENV_TOKEN_STORE: &str = "PORTFOLIO_TOKEN_STORE";

/// Configuration for the API gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL that relative request paths are resolved against
    pub base_url: String,
    /// Path of the refresh-exchange endpoint
    pub refresh_path: String,
    /// Path of the login endpoint
    pub login_path: String,
    /// Path of the registration endpoint
    pub register_path: String,
    /// Timeout applied to every HTTP request
    pub request_timeout_secs: u64,
    /// Capacity of the auth event broadcast channel
    pub event_capacity: usize,
    /// Where the file token store lives, if one is used
    pub token_store_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            register_path: DEFAULT_REGISTER_PATH.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            event_capacity: EVENT_BUS_CAPACITY,
            token_store_path: None,
        }
    }
}

impl GatewayConfig {
    /// Create a default configuration for the given API base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Build a validated configuration from environment variables, falling back to defaults
    pub fn from_env() -> GatewayResult<Self> {
        let config = Self::read_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read environment variables without validating, so callers can apply
    /// overrides first
    pub fn read_env() -> GatewayResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Only parse errors are reported here; call [`GatewayConfig::validate`]
    /// once all overrides are applied.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GatewayResult<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_BASE_URL) {
            config.base_url = value;
        }
        if let Some(value) = lookup(ENV_REFRESH_PATH) {
            config.refresh_path = value;
        }
        if let Some(value) = lookup(ENV_LOGIN_PATH) {
            config.login_path = value;
        }
        if let Some(value) = lookup(ENV_REGISTER_PATH) {
            config.register_path = value;
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout_secs = value
                .trim()
                .parse()
                .map_err(|e| config_invalid(ENV_REQUEST_TIMEOUT_SECS, e))?;
        }
        if let Some(value) = lookup(ENV_EVENT_CAPACITY) {
            config.event_capacity = value
                .trim()
                .parse()
                .map_err(|e| config_invalid(ENV_EVENT_CAPACITY, e))?;
        }
        if let Some(value) = lookup(ENV_TOKEN_STORE) {
            config.token_store_path = Some(PathBuf::from(value));
        }

        debug!(base_url = %config.base_url, "Loaded gateway configuration");
        Ok(config)
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_token_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_store_path = Some(path.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check that the configuration can be used
    pub fn validate(&self) -> GatewayResult<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(config_missing("base_url"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(config_invalid(
                "base_url",
                format!("'{}' is not an http(s) URL", base),
            ));
        }
        for (key, path) in [
            ("refresh_path", &self.refresh_path),
            ("login_path", &self.login_path),
            ("register_path", &self.register_path),
        ] {
            if !path.starts_with('/') {
                return Err(config_invalid(key, format!("'{}' must start with '/'", path)));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(config_invalid("request_timeout_secs", "must be greater than zero"));
        }
        if self.event_capacity == 0 {
            return Err(config_invalid("event_capacity", "must be greater than zero"));
        }
        Ok(())
    }
}
