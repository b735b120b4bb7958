use std::sync::Arc;

use tracing::info;

pub mod adapters;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;

pub use adapters::{ApiRequest, ApiResponse, HttpClient, ReqwestHttpClient};
pub use api::{NewTransaction, PortfolioApi, Transaction, TransactionType, ValueSnapshot};
pub use auth::{
    AuthService, Credentials, FileTokenStore, MemoryTokenStore, RegisteredUser, SessionState,
    TokenKey, TokenPair, TokenStore,
};
pub use config::GatewayConfig;
pub use error::{ErrorCategory, ErrorCode, GatewayError, GatewayResult};
pub use events::{AuthEvent, AuthEvents, LOGOUT_EVENT};
pub use gateway::ApiGateway;

/// Everything a frontend needs: the gateway, the session and the portfolio calls
pub struct PortfolioClient {
    /// Authenticated transport shared by the services below
    pub gateway: Arc<ApiGateway>,
    /// Login, registration and session state
    pub auth: AuthService,
    /// Protected portfolio endpoints
    pub portfolio: PortfolioApi,
}

impl PortfolioClient {
    /// Wire the services around an existing gateway
    pub async fn new(gateway: ApiGateway) -> GatewayResult<Self> {
        let gateway = Arc::new(gateway);
        let auth = AuthService::new(Arc::clone(&gateway)).await?;
        let portfolio = PortfolioApi::new(Arc::clone(&gateway));
        Ok(Self {
            gateway,
            auth,
            portfolio,
        })
    }

    /// Build the client from configuration, using reqwest as transport
    pub async fn from_config(config: GatewayConfig) -> GatewayResult<Self> {
        info!(base_url = %config.base_url, "Creating portfolio client");
        Self::new(ApiGateway::from_config(config)?).await
    }

    pub fn is_logged_in(&self) -> bool {
        self.auth.is_logged_in()
    }
}

#[cfg(test)]
mod tests;
