//! Single-flight token refresh.
//!
//! A [`RefreshCoordinator`] owns the only shared mutable state of the client:
//! the `refreshing` flag and the queue of callers waiting on a refresh. Both
//! live behind one mutex, so check-and-set and enqueue happen atomically.
//!
//! ```text
//!   401 ──► enqueue ──► first entrant? ──yes──► spawn refresh cycle
//!                           │                        │
//!                           no                       ▼
//!                           │              POST refresh endpoint
//!                           ▼                        │
//!                     wait for tokens ◄──── take queue, go idle
//!                           │
//!                           ▼
//!                  replay in caller's task
//! ```
//!
//! The cycle only refreshes and hands out the outcome. Each caller replays
//! its own request, so a slow replay never holds the flag, and dropping the
//! caller aborts both its place in the queue and its replay.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::Method;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use tokio::sync::oneshot;
use tollgate_core::{
    AuthTokens, TokenStore, Transport, TransportError, TransportRequest, TransportResponse,
};
use tracing::{Instrument, debug, info_span, warn};

use super::set_bearer;
use crate::error::AuthError;
use crate::metrics;

type Outcome = Result<AuthTokens, AuthError>;

struct Pending {
    id: u64,
    notify: oneshot::Sender<Outcome>,
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    pending: Vec<Pending>,
}

struct Shared {
    state: Mutex<RefreshState>,
    next_id: AtomicU64,
    store: Arc<dyn TokenStore>,
    transport: Arc<dyn Transport>,
    refresh_url: String,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Coordinates token refreshes so at most one is in flight per client.
#[derive(Clone)]
pub(crate) struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn Transport>,
        refresh_url: String,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RefreshState::default()),
                next_id: AtomicU64::new(0),
                store,
                transport,
                refresh_url,
            }),
        }
    }

    /// Waits for the current or a new refresh cycle, then replays `request`.
    ///
    /// Resolves with the replayed response on success and with `original` when
    /// the refresh fails.
    pub(crate) async fn replay_after_refresh(
        &self,
        mut request: TransportRequest,
        original: TransportResponse,
    ) -> Result<TransportResponse, TransportError> {
        let tokens = match self.wait_for_refresh().await {
            Ok(tokens) => tokens,
            Err(error) => {
                debug!(%error, "Refresh failed, returning the original response");
                return Ok(original);
            }
        };

        set_bearer(&mut request.headers, &tokens.access_token)?;
        metrics::record_replayed();
        self.shared.transport.send(request).await
    }

    /// Waits for the current or a new refresh cycle and returns its tokens.
    pub(crate) async fn refresh(&self) -> Result<AuthTokens, AuthError> {
        self.wait_for_refresh().await
    }

    /// Whether a refresh cycle is running.
    pub(crate) fn is_busy(&self) -> bool {
        self.shared.lock().refreshing
    }

    async fn wait_for_refresh(&self) -> Outcome {
        let (notify, rx) = oneshot::channel();
        let _slot = self.enqueue(notify);
        rx.await
            .unwrap_or_else(|_| Err(AuthError::from(TransportError::Cancelled)))
    }

    fn enqueue(&self, notify: oneshot::Sender<Outcome>) -> QueueSlot {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let leader = {
            let mut state = self.shared.lock();
            state.pending.push(Pending { id, notify });
            !mem::replace(&mut state.refreshing, true)
        };

        if leader {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(shared.run_cycle().instrument(info_span!("refresh_cycle")));
        } else {
            debug!(id, "Joined in-flight token refresh");
        }

        QueueSlot {
            shared: Arc::clone(&self.shared),
            id,
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_cycle(self: Arc<Self>) {
        metrics::record_refresh_cycle();
        let outcome = self.call_refresh_endpoint().await;

        match &outcome {
            Ok(_) => debug!("Token refresh succeeded"),
            Err(error) => {
                warn!(%error, "Token refresh failed, clearing stored tokens");
                metrics::record_refresh_failure();
                if let Err(error) = self.store.clear().await {
                    warn!(%error, store = self.store.name(), "Failed to clear tokens");
                }
            }
        }

        // Taking the queue and going idle under one lock: a 401 after this
        // point starts a new cycle instead of joining a finished one.
        let batch = {
            let mut state = self.lock();
            state.refreshing = false;
            mem::take(&mut state.pending)
        };
        debug!(waiters = batch.len(), "Refresh cycle finished");

        for pending in batch {
            if pending.notify.send(outcome.clone()).is_err() {
                debug!(id = pending.id, "Waiter gone before the refresh finished");
            }
        }
    }

    async fn call_refresh_endpoint(&self) -> Outcome {
        let tokens = self.store.load().await?.ok_or(AuthError::NotAuthenticated)?;
        if tokens.is_refresh_token_expired() {
            return Err(AuthError::RefreshTokenExpired);
        }

        let body = serde_json::to_vec(&RefreshBody {
            refresh_token: &tokens.refresh_token,
        })?;
        let mut request =
            TransportRequest::new(Method::POST, self.refresh_url.as_str()).with_body(body);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        set_bearer(&mut request.headers, &tokens.refresh_token)?;

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(AuthError::RefreshRejected {
                status: response.status,
            });
        }

        let refreshed: AuthTokens = serde_json::from_slice(&response.body)?;
        self.store.save(&refreshed).await?;
        Ok(refreshed)
    }
}

/// Position of one caller in the refresh queue.
///
/// Dropping the slot before the cycle finishes removes the caller's entry.
struct QueueSlot {
    shared: Arc<Shared>,
    id: u64,
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        let before = state.pending.len();
        state.pending.retain(|pending| pending.id != self.id);
        if state.pending.len() != before {
            debug!(id = self.id, "Removed cancelled request from refresh queue");
        }
    }
}
