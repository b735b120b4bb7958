//! Unit tests for the gateway, the session and the event stream
//!
//! These drive the crate through the scripted `MockHttpClient`; tests that
//! depend on interleavings run on paused time.


use std::sync::Arc;
use std::time::Duration;

use crate::adapters::http_client::mock::MockHttpClient;
use crate::auth::storage::{MemoryTokenStore, TokenKey, TokenStore};
use crate::error::GatewayResult;
use crate::config::GatewayConfig;
use crate::events::{AuthEvent, Subscriber};
use crate::gateway::ApiGateway;

pub const BASE: &str = "http://api.test";
pub const REFRESH_URL: &str = "http://api.test/api/token/refresh/";
pub const LOGIN_URL: &str = "http://api.test/api/token/";
pub const REFRESH_LATENCY: Duration = Duration::from_millis(50);

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

/// Gateway over a mock transport and an in-memory store
pub fn gateway_with(client: &MockHttpClient, store: &Arc<MemoryTokenStore>) -> ApiGateway {
    ApiGateway::new(
        GatewayConfig::new(BASE),
        Arc::new(client.clone()),
        Arc::clone(store) as Arc<dyn TokenStore>,
    )
}

/// Gateway over a mock transport and any store
pub fn gateway_over(client: &MockHttpClient, store: Arc<dyn TokenStore>) -> ApiGateway {
    ApiGateway::new(GatewayConfig::new(BASE), Arc::new(client.clone()), store)
}

/// Answer the refresh endpoint with `access` when the body carries `refresh`
pub fn mock_refresh(client: &MockHttpClient, refresh: &str, access: &str) {
    let refresh = refresh.to_string();
    let body = serde_json::json!({ "access": access }).to_string();
    client.mock_with(REFRESH_URL, move |req| {
        let sent = req
            .body
            .as_ref()
            .and_then(|b| b["refresh"].as_str().map(str::to_string));
        if sent.as_deref() == Some(refresh.as_str()) {
            crate::adapters::ApiResponse::new(200, body.clone())
        } else {
            crate::adapters::ApiResponse::new(401, r#"{"detail":"Token is invalid or expired"}"#)
        }
    });
    client.set_latency(REFRESH_URL, REFRESH_LATENCY);
}

/// Drain every event already queued for a subscriber
pub fn drain(subscriber: &mut Subscriber<AuthEvent>) -> Vec<AuthEvent> {
    let mut events = Vec::new();
    while let Ok(event) = subscriber.try_recv() {
        events.push(event);
    }
    events
}

pub fn logout_count(events: &[AuthEvent]) -> usize {
    events.iter().filter(|e| e.is_logout()).count()
}

/// In-memory store that can be told to fail reads or refresh-token writes
#[derive(Default)]
pub struct FlakyTokenStore {
    inner: MemoryTokenStore,
    fail_reads: std::sync::atomic::AtomicBool,
    fail_refresh_writes: std::sync::atomic::AtomicBool,
}

impl FlakyTokenStore {
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        Self {
            inner: MemoryTokenStore::with_tokens(access, refresh),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn fail_refresh_writes(&self, fail: bool) {
        self.fail_refresh_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Read bypassing the failure switch
    pub async fn peek(&self, key: TokenKey) -> Option<String> {
        self.inner.get(key).await.unwrap()
    }
}

#[async_trait::async_trait]
impl TokenStore for FlakyTokenStore {
    async fn get(&self, key: TokenKey) -> GatewayResult<Option<String>> {
        if self.fail_reads.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::storage("disk unavailable"));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: TokenKey, value: &str) -> GatewayResult<()> {
        if key == TokenKey::Refresh
            && self.fail_refresh_writes.load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(crate::error::storage("disk full"));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: TokenKey) -> GatewayResult<()> {
        self.inner.remove(key).await
    }
}
