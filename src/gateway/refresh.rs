//! Single-flight coordination of token refreshes.
//!
//! At most one refresh runs per coordinator. The first caller that needs a
//! refresh spawns it and parks a [`Shared`] handle to its outcome in the
//! pending slot; every caller arriving while the slot is occupied awaits that
//! same handle. The spawned task empties the slot once the refresh has fully
//! settled, so the next failure starts a fresh cycle.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, error, trace};

use crate::error::{GatewayError, GatewayResult};

/// Outcome shared by every caller waiting on one refresh: the new access token
pub type RefreshOutcome = GatewayResult<String>;

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Owner of the pending-refresh slot
#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    pending: Arc<Mutex<Option<PendingRefresh>>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a refresh is currently in flight
    pub async fn is_pending(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    /// Await the refresh in flight, or start one built by `start`.
    ///
    /// `start` is only invoked when the slot is empty. The refresh runs on its
    /// own task, so it completes even if every waiter is dropped.
    pub async fn join_or_start<F>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let pending = {
            let mut slot = self.pending.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Refresh already in flight, waiting for its outcome");
                    pending.clone()
                }
                None => {
                    let pending = self.spawn_refresh(start());
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    fn spawn_refresh(&self, refresh: BoxFuture<'static, RefreshOutcome>) -> PendingRefresh {
        debug!("Starting token refresh");
        let slot = Arc::clone(&self.pending);
        // The caller still holds the slot lock, so the clear below cannot run
        // before the slot has been filled.
        let task = tokio::spawn(async move {
            let outcome = refresh.await;
            slot.lock().await.take();
            trace!(success = outcome.is_ok(), "Refresh settled, slot cleared");
            outcome
        });

        let slot = Arc::clone(&self.pending);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // The task died before it could clear the slot
                    error!(error = %e, "Refresh task failed");
                    slot.lock().await.take();
                    Err(GatewayError::Internal(format!("Refresh task failed: {}", e)))
                }
            }
        }
        .boxed()
        .shared()
    }
}
