use std::sync::Arc;

use tracing::{error, info};

use crate::adapters::http_client::ApiRequest;
use crate::auth::session::SessionState;
use crate::auth::token::{Credentials, RegisteredUser, TokenPair};
use crate::error::GatewayResult;
use crate::events::AuthEvent;
use crate::gateway::ApiGateway;

/// Login, registration and logout on top of the gateway
pub struct AuthService {
    gateway: Arc<ApiGateway>,
    session: Arc<SessionState>,
}

impl AuthService {
    /// Create the service and start following the gateway's logout broadcast
    pub async fn new(gateway: Arc<ApiGateway>) -> GatewayResult<Self> {
        let session = Arc::new(SessionState::new(gateway.token_store()).await?);
        session.watch_logout(gateway.subscribe());
        Ok(Self { gateway, session })
    }

    /// Exchange credentials for a token pair and store it
    pub async fn login(&self, username: &str, password: &str) -> GatewayResult<()> {
        let request = ApiRequest::post(self.gateway.config().login_path.as_str())
            .json(&Credentials::new(username, password))?;

        // A stale bearer must not be attached to the login call
        let tokens: TokenPair = self.gateway.send_unauthenticated(request).await?.json()?;
        if let Err(e) = self.gateway.token_store().store_pair(&tokens).await {
            // Never leave a new access token next to an old refresh token
            if let Err(clear_err) = self.session.logout().await {
                error!(error = %clear_err, "Failed to clear tokens after a partial login write");
            }
            return Err(e);
        }

        self.session.login();
        self.gateway.events().publish(AuthEvent::logged_in()).await;
        info!(username, "Logged in");
        Ok(())
    }

    /// Create a new account; does not log in
    pub async fn register(&self, username: &str, password: &str) -> GatewayResult<RegisteredUser> {
        let request = ApiRequest::post(self.gateway.config().register_path.as_str())
            .json(&Credentials::new(username, password))?;
        let user: RegisteredUser = self.gateway.send_unauthenticated(request).await?.json()?;
        info!(username = %user.username, id = user.id, "Registered user");
        Ok(user)
    }

    /// Clear the stored tokens and mark the session as logged out
    pub async fn logout(&self) -> GatewayResult<()> {
        self.session.logout().await
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn gateway(&self) -> &Arc<ApiGateway> {
        &self.gateway
    }
}
