// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight refresh coordinator.
//!
//! At most one refresh attempt runs at a time. Callers that arrive while an
//! attempt is outstanding get a clone of the same shared future, so N racing
//! callers produce one network exchange and observe one outcome.
//!
//! The attempt runs on its own task: dropping every caller future does not
//! cancel a refresh halfway through persisting the new pair.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::event::SessionEvent;
use crate::refresh::{RefreshConfig, RefreshError, RefreshTransport};
use crate::store::SessionStore;
use crate::token::{decode, TokenPair};

type SharedAttempt = Shared<BoxFuture<'static, Result<TokenPair, RefreshError>>>;

/// The refresh currently in flight.
struct InFlight {
    generation: u64,
    attempt: SharedAttempt,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    transport: Arc<dyn RefreshTransport>,
    config: RefreshConfig,
    event_tx: broadcast::Sender<SessionEvent>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

/// Exchanges the stored refresh token for a new pair, once per staleness
/// episode. Cheap to clone; clones share the in-flight attempt.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn RefreshTransport>,
        config: RefreshConfig,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                transport,
                config,
                event_tx,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start a refresh, or join the one already running.
    ///
    /// The in-flight marker is installed before this returns, so a caller
    /// that checks and a caller that starts can never both start.
    pub fn perform_refresh(&self) -> impl Future<Output = Result<TokenPair, RefreshError>> {
        self.start(None)
    }

    /// Like [`perform_refresh`](Self::perform_refresh), for a caller that
    /// judged `stale_access` stale.
    ///
    /// A new attempt first reloads the stored pair. If the stored access
    /// token is no longer `stale_access`, an earlier refresh already rotated
    /// it and the stored pair is returned without another exchange.
    pub fn refresh_if_stale(
        &self,
        stale_access: &str,
    ) -> impl Future<Output = Result<TokenPair, RefreshError>> {
        self.start(Some(stale_access.to_owned()))
    }

    fn start(&self, stale_access: Option<String>) -> SharedAttempt {
        let mut slot = self.inner.in_flight.lock();
        if let Some(ref flight) = *slot {
            debug!(generation = flight.generation, "joining in-flight refresh");
            return flight.attempt.clone();
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let _settle = SettleGuard { inner: Arc::clone(&inner), generation };
            inner.run_attempt(generation, stale_access).await
        });
        let attempt = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(RefreshError::Interrupted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        debug!(generation, "refresh started");
        *slot = Some(InFlight { generation, attempt: attempt.clone() });
        attempt
    }

    /// Whether an attempt is currently outstanding.
    pub fn in_flight(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Forget the in-flight attempt without waiting for it. Callers already
    /// holding the shared future still receive its outcome.
    #[cfg(debug_assertions)]
    pub fn reset(&self) {
        if let Some(flight) = self.inner.in_flight.lock().take() {
            warn!(generation = flight.generation, "refresh state reset");
        }
    }
}

impl Inner {
    async fn run_attempt(
        &self,
        generation: u64,
        stale_access: Option<String>,
    ) -> Result<TokenPair, RefreshError> {
        let result = match self.load_current().await {
            Ok(Some(pair)) if stale_access.as_deref().is_some_and(|t| t != pair.access_token) => {
                debug!(generation, "access token already rotated, skipping exchange");
                return Ok(pair);
            }
            Ok(Some(pair)) if !pair.refresh_token.is_empty() => {
                self.exchange_with_retries(pair.refresh_token).await
            }
            Ok(_) => Err(RefreshError::NotFound),
            Err(e) => Err(e),
        };
        match result {
            Ok(ref pair) => {
                let expires_at = decode(&pair.access_token).ok().and_then(|c| c.expires_at);
                info!(generation, expires_at, "session refreshed");
                let _ = self.event_tx.send(SessionEvent::Refreshed { expires_at });
            }
            Err(ref e) => {
                error!(generation, code = e.as_str(), err = %e, "refresh failed");
                let _ = self.event_tx.send(SessionEvent::RefreshFailed { error: e.to_string() });
            }
        }
        result
    }

    async fn load_current(&self) -> Result<Option<TokenPair>, RefreshError> {
        self.store.load_token_pair().await.map_err(|e| RefreshError::Storage(e.to_string()))
    }

    async fn exchange_with_retries(
        &self,
        refresh_token: String,
    ) -> Result<TokenPair, RefreshError> {
        let mut retry_count = 0u32;
        loop {
            match self.transport.exchange(&refresh_token).await {
                Ok(response) => {
                    let pair = response.into_token_pair()?;
                    self.store
                        .save_token_pair(pair.clone())
                        .await
                        .map_err(|e| RefreshError::Storage(e.to_string()))?;
                    return Ok(pair);
                }
                Err(RefreshError::Transient(cause)) => {
                    retry_count += 1;
                    if retry_count >= self.config.max_retries {
                        return Err(RefreshError::MaxRetriesExceeded {
                            attempts: retry_count,
                            last: cause,
                        });
                    }
                    let backoff = self.config.backoff(retry_count);
                    warn!(
                        attempt = retry_count,
                        max = self.config.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        err = %cause,
                        "refresh failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Clears the in-flight marker when the attempt task ends, however it ends.
struct SettleGuard {
    inner: Arc<Inner>,
    generation: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        let mut slot = self.inner.in_flight.lock();
        if slot.as_ref().is_some_and(|f| f.generation == self.generation) {
            *slot = None;
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
