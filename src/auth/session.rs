use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::storage::{TokenKey, TokenStore};
use crate::error::GatewayResult;
use crate::events::{AuthEvent, Subscriber};

/// Observable "is logged in" flag shared across the application
pub struct SessionState {
    store: Arc<dyn TokenStore>,
    logged_in: Arc<watch::Sender<bool>>,
    /// Task following the gateway's logout broadcast
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionState {
    /// Create the session; it starts logged in when an access token is stored
    pub async fn new(store: Arc<dyn TokenStore>) -> GatewayResult<Self> {
        let logged_in = store.get(TokenKey::Access).await?.is_some();
        debug!(logged_in, "Session state initialized from storage");
        let (sender, _) = watch::channel(logged_in);
        Ok(Self {
            store,
            logged_in: Arc::new(sender),
            listener: Mutex::new(None),
        })
    }

    pub fn is_logged_in(&self) -> bool {
        *self.logged_in.borrow()
    }

    /// Receiver notified whenever the flag changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.logged_in.subscribe()
    }

    /// Mark the session as logged in
    pub fn login(&self) {
        self.logged_in.send_replace(true);
    }

    /// Clear both tokens and mark the session as logged out
    pub async fn logout(&self) -> GatewayResult<()> {
        self.store.clear().await?;
        self.logged_in.send_replace(false);
        info!("Logged out");
        Ok(())
    }

    /// Follow logout broadcasts from the gateway.
    ///
    /// Replaces any listener started earlier. The listener stops when the
    /// event stream closes or the session is dropped.
    pub fn watch_logout(&self, mut subscriber: Subscriber<AuthEvent>) {
        let logged_in = Arc::clone(&self.logged_in);
        let store = Arc::clone(&self.store);

        let handle = tokio::spawn(async move {
            loop {
                match subscriber.recv().await {
                    Ok(event) if event.is_logout() => {
                        debug!("Logout broadcast received");
                        logged_in.send_replace(false);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        // A missed logout is recovered from storage
                        warn!(skipped, "Session listener lagged behind auth events");
                        match store.get(TokenKey::Access).await {
                            Ok(Some(_)) => {}
                            Ok(None) => {
                                logged_in.send_replace(false);
                            }
                            Err(e) => {
                                warn!(error = %e, "Failed to re-check stored session after lag");
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Ok(mut listener) = self.listener.lock() {
            if let Some(previous) = listener.replace(handle) {
                previous.abort();
            }
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}
