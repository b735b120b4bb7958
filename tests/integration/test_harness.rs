//! Integration test harness
//! Provides a mock API server and a gateway persisting tokens to a temp dir

use std::path::PathBuf;
use std::sync::Arc;

use mockito::{Matcher, Mock, ServerGuard};
use serde_json::json;
use tempfile::TempDir;

use portfolio_gateway::{
    ApiGateway, AuthEvent, FileTokenStore, GatewayConfig, ReqwestHttpClient, TokenKey, TokenStore,
};

pub const REFRESH_PATH: &str = "/api/token/refresh/";

/// A mock backend plus a token file owned by one test
pub struct TestBackend {
    pub server: ServerGuard,
    token_dir: TempDir,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self {
            server: mockito::Server::new_async().await,
            token_dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn token_path(&self) -> PathBuf {
        self.token_dir.path().join("session").join("tokens.json")
    }

    pub fn config(&self) -> GatewayConfig {
        GatewayConfig::new(self.server.url()).with_token_store_path(self.token_path())
    }

    /// A fresh view of the token file, as another process would see it
    pub fn token_store(&self) -> FileTokenStore {
        FileTokenStore::new(self.token_path())
    }

    pub async fn seed_tokens(&self, access: &str, refresh: &str) {
        let store = self.token_store();
        store.set(TokenKey::Access, access).await.unwrap();
        store.set(TokenKey::Refresh, refresh).await.unwrap();
    }

    pub async fn stored(&self, key: TokenKey) -> Option<String> {
        self.token_store().get(key).await.unwrap()
    }

    /// Gateway over reqwest and the file store
    pub fn gateway(&self) -> ApiGateway {
        ApiGateway::new(
            self.config(),
            Arc::new(ReqwestHttpClient::new()),
            Arc::new(self.token_store()),
        )
    }

    /// Respond to `refresh` with `access`
    pub async fn mock_refresh(&mut self, refresh: &str, access: &str) -> Mock {
        self.server
            .mock("POST", REFRESH_PATH)
            .match_body(Matcher::Json(json!({ "refresh": refresh })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "access": access }).to_string())
            .create_async()
            .await
    }

    /// Respond to `path` with `body` only when the bearer is `token`
    pub async fn mock_protected(&mut self, method: &str, path: &str, token: &str, body: &str) -> Mock {
        self.server
            .mock(method, path)
            .match_header("authorization", format!("Bearer {}", token).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Reject `path` with 401 when the bearer is `token`
    pub async fn mock_expired(&mut self, method: &str, path: &str, token: &str) -> Mock {
        self.server
            .mock(method, path)
            .match_header("authorization", format!("Bearer {}", token).as_str())
            .with_status(401)
            .with_body(r#"{"detail":"Given token not valid for any token type","code":"token_not_valid"}"#)
            .create_async()
            .await
    }
}

/// Collect the events already delivered to a subscriber
pub fn collect_events(
    subscriber: &mut portfolio_gateway::events::Subscriber<AuthEvent>,
) -> Vec<AuthEvent> {
    let mut events = Vec::new();
    while let Ok(event) = subscriber.try_recv() {
        events.push(event);
    }
    events
}
