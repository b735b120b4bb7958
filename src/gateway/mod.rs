//! Authenticated API gateway.
//!
//! Every request sent through [`ApiGateway::send`] carries the access token
//! currently in storage. A `401` response triggers one shared token refresh
//! (see [`refresh::RefreshCoordinator`]) after which the request is replayed
//! once. When the session cannot be recovered, both tokens are cleared and an
//! [`AuthEvent::Logout`] is broadcast.

pub mod refresh;

use std::sync::Arc;

use futures::future::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::adapters::http_client::{join_url, ApiRequest, ApiResponse, HttpClient, ReqwestHttpClient};
use crate::auth::storage::{FileTokenStore, MemoryTokenStore, TokenKey, TokenStore};
use crate::auth::token::{RefreshRequest, RefreshResponse};
use crate::config::GatewayConfig;
use crate::error::{refresh_rejected, request_failed, GatewayError, GatewayResult, UNAUTHORIZED};
use crate::events::{AuthEvent, AuthEvents, Subscriber, EVENT_BUFFER_SIZE};

pub use refresh::RefreshCoordinator;

/// HTTP gateway with bearer injection and transparent token refresh
pub struct ApiGateway {
    config: GatewayConfig,
    client: Arc<dyn HttpClient>,
    store: Arc<dyn TokenStore>,
    events: AuthEvents,
    refresh: RefreshCoordinator,
}

impl ApiGateway {
    /// Create a gateway around an HTTP transport and a token store
    pub fn new(
        config: GatewayConfig,
        client: Arc<dyn HttpClient>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let events = AuthEvents::new(config.event_capacity, EVENT_BUFFER_SIZE);
        Self {
            config,
            client,
            store,
            events,
            refresh: RefreshCoordinator::new(),
        }
    }

    /// Create a gateway using reqwest and the store named by the configuration
    pub fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        config.validate()?;
        let client = Arc::new(ReqwestHttpClient::with_timeout(config.request_timeout())?);
        let store: Arc<dyn TokenStore> = match &config.token_store_path {
            Some(path) => Arc::new(FileTokenStore::new(path)),
            None => Arc::new(MemoryTokenStore::new()),
        };
        Ok(Self::new(config, client, store))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Shared token store
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.store)
    }

    /// Event bus carrying session lifecycle events
    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> Subscriber<AuthEvent> {
        self.events.subscribe()
    }

    /// Whether a token refresh is currently in flight
    pub async fn is_refreshing(&self) -> bool {
        self.refresh.is_pending().await
    }

    /// Send a request with credential injection and refresh-on-401
    pub async fn send(&self, mut request: ApiRequest) -> GatewayResult<ApiResponse> {
        let url = join_url(&self.config.base_url, request.url());
        // Correlates the first attempt with its replay in the logs
        let request_id = Uuid::new_v4();

        loop {
            self.attach_credentials(&mut request).await?;
            debug!(
                %request_id,
                method = %request.method(),
                url = %url,
                retried = request.is_retried(),
                "Sending request"
            );

            let response = self.client.execute(&url, &request).await?;
            if response.status() != UNAUTHORIZED {
                return into_result(&url, response);
            }

            warn!(
                %request_id,
                url = %url,
                retried = request.is_retried(),
                "Request rejected as unauthorized"
            );

            if self.is_refresh_call(&url) {
                // A rejected refresh token can never be fixed by refreshing again
                self.force_logout("refresh endpoint rejected the credentials")
                    .await;
                return Err(request_failed(url, UNAUTHORIZED, response.text()));
            }

            if request.is_retried() {
                return Err(request_failed(url, UNAUTHORIZED, response.text()));
            }

            self.refresh_access_token().await?;
            request.mark_retried();
            trace!(%request_id, url = %url, "Replaying request with refreshed credentials");
        }
    }

    /// Send a request as-is, without credentials or refresh handling
    pub async fn send_unauthenticated(&self, request: ApiRequest) -> GatewayResult<ApiResponse> {
        let url = join_url(&self.config.base_url, request.url());
        debug!(method = %request.method(), url = %url, "Sending unauthenticated request");
        let response = self.client.execute(&url, &request).await?;
        into_result(&url, response)
    }

    pub async fn get(&self, url: &str) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::get(url)).await
    }

    pub async fn delete(&self, url: &str) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::delete(url)).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::post(url).json(body)?).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> GatewayResult<ApiResponse> {
        self.send(ApiRequest::put(url).json(body)?).await
    }

    /// GET and deserialize the response body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> GatewayResult<T> {
        self.get(url).await?.json()
    }

    /// POST a JSON body and deserialize the response body
    pub async fn post_json_as<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> GatewayResult<T> {
        self.post_json(url, body).await?.json()
    }

    /// Obtain a new access token, joining a refresh already in flight.
    ///
    /// On failure both tokens are cleared and a logout is broadcast before
    /// the error is returned.
    pub async fn refresh_access_token(&self) -> GatewayResult<String> {
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let refresh_url = join_url(&self.config.base_url, &self.config.refresh_path);

        self.refresh
            .join_or_start(move || run_refresh(client, store, events, refresh_url).boxed())
            .await
    }

    /// Clear both tokens and broadcast a logout
    pub async fn force_logout(&self, reason: &str) {
        end_session(self.store.as_ref(), &self.events, reason).await;
    }

    async fn attach_credentials(&self, request: &mut ApiRequest) -> GatewayResult<()> {
        match self.store.get(TokenKey::Access).await? {
            Some(token) => request.set_bearer(&token),
            // Drop the stale bearer from the first attempt
            None if request.is_retried() => request.clear_bearer(),
            None => {}
        }
        Ok(())
    }

    fn is_refresh_call(&self, url: &str) -> bool {
        url.contains(self.config.refresh_path.as_str())
    }
}

fn into_result(url: &str, response: ApiResponse) -> GatewayResult<ApiResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        let status = response.status();
        debug!(url = %url, status, "Request failed");
        Err(request_failed(url, status, response.text()))
    }
}

/// One refresh cycle: exchange, persist, notify
async fn run_refresh(
    client: Arc<dyn HttpClient>,
    store: Arc<dyn TokenStore>,
    events: AuthEvents,
    refresh_url: String,
) -> GatewayResult<String> {
    match exchange_refresh_token(client.as_ref(), store.as_ref(), &refresh_url).await {
        Ok(access) => {
            info!("Access token refreshed");
            events.publish(AuthEvent::token_refreshed()).await;
            Ok(access)
        }
        Err(e) => {
            warn!(error = %e, "Token refresh failed, ending session");
            end_session(store.as_ref(), &events, &e.to_string()).await;
            Err(e)
        }
    }
}

async fn exchange_refresh_token(
    client: &dyn HttpClient,
    store: &dyn TokenStore,
    refresh_url: &str,
) -> GatewayResult<String> {
    let refresh = store
        .get(TokenKey::Refresh)
        .await?
        .ok_or(GatewayError::NoRefreshToken)?;

    let request = ApiRequest::post(refresh_url).json(&RefreshRequest { refresh: &refresh })?;
    let response = client.execute(refresh_url, &request).await?;
    if !response.is_success() {
        return Err(refresh_rejected(response.status(), response.text()));
    }

    let RefreshResponse { access } = response.json()?;
    store.set(TokenKey::Access, &access).await?;
    Ok(access)
}

async fn end_session(store: &dyn TokenStore, events: &AuthEvents, reason: &str) {
    if let Err(e) = store.clear().await {
        error!(error = %e, "Failed to clear tokens during logout");
    }
    info!(reason, "Session ended");
    events.publish(AuthEvent::logout(reason)).await;
}
