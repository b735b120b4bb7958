use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod streams;
pub use streams::{EventStream, EventStreamStats, NamedEvent, Subscriber};

/// Default broadcast capacity for auth events
pub const EVENT_BUS_CAPACITY: usize = 100;
/// Number of recent events kept for replay
pub const EVENT_BUFFER_SIZE: usize = 16;

/// Name of the logout broadcast
pub const LOGOUT_EVENT: &str = "auth:logout";
/// Name of the refresh-succeeded event
pub const REFRESHED_EVENT: &str = "auth:refreshed";
/// Name of the login event
pub const LOGIN_EVENT: &str = "auth:login";

/// Session lifecycle events published by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// Tokens were cleared because the session could not be recovered
    Logout {
        reason: String,
        at: DateTime<Utc>,
    },
    /// A new access token was obtained and stored
    TokenRefreshed { at: DateTime<Utc> },
    /// Both tokens were stored after a successful login
    LoggedIn { at: DateTime<Utc> },
}

impl AuthEvent {
    pub fn logout(reason: impl Into<String>) -> Self {
        Self::Logout {
            reason: reason.into(),
            at: Utc::now(),
        }
    }

    pub fn token_refreshed() -> Self {
        Self::TokenRefreshed { at: Utc::now() }
    }

    pub fn logged_in() -> Self {
        Self::LoggedIn { at: Utc::now() }
    }

    pub fn is_logout(&self) -> bool {
        matches!(self, Self::Logout { .. })
    }
}

impl NamedEvent for AuthEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Logout { .. } => LOGOUT_EVENT,
            Self::TokenRefreshed { .. } => REFRESHED_EVENT,
            Self::LoggedIn { .. } => LOGIN_EVENT,
        }
    }
}

/// Event bus for session lifecycle notifications
#[derive(Clone)]
pub struct AuthEvents {
    stream: Arc<EventStream<AuthEvent>>,
}

impl AuthEvents {
    /// Create a new event bus with the specified capacity
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            stream: Arc::new(EventStream::new(capacity, buffer_size)),
        }
    }

    /// Get a subscriber to receive events
    pub fn subscribe(&self) -> Subscriber<AuthEvent> {
        self.stream.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: AuthEvent) -> usize {
        self.stream.publish(event).await
    }

    /// Get current statistics
    pub async fn get_stats(&self) -> EventStreamStats {
        self.stream.get_stats().await
    }

    /// Reset statistics
    pub async fn reset_stats(&self) {
        self.stream.reset_stats().await
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.stream.subscriber_count()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY, EVENT_BUFFER_SIZE)
    }
}
