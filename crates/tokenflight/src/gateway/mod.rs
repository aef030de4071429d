// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request gateway: attaches bearer tokens, refreshes stale ones before a
//! request goes out, and replays requests rejected with 401 once a fresh
//! token is available.

pub mod http;

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::event::SessionEvent;
use crate::refresh::coordinator::RefreshCoordinator;
use crate::refresh::RefreshError;
use crate::store::SessionStore;
use crate::token::{
    decode, epoch_secs, remaining_seconds, status_of, TokenPair, TokenStatus,
    REFRESH_THRESHOLD_SECS,
};

/// An outbound API call, kept whole so it can be replayed.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/users/me`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Set on replays; a retried request is never replayed again.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), headers: HeaderMap::new(), body: None, retried: false }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body and its content type.
    pub fn with_json(mut self, body: impl Into<Bytes>) -> Self {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(body.into());
        self
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous value.
    pub fn with_bearer(mut self, token: &str) -> Result<Self, GatewayError> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| GatewayError::InvalidHeader(e.to_string()))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// The bearer token currently attached, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Body as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Refresh failed terminally; the session has been torn down.
    SessionExpired(RefreshError),
    Transport(String),
    Storage(String),
    /// The token cannot be carried in an HTTP header.
    InvalidHeader(String),
    /// The gateway was reset while the request was queued.
    Cancelled,
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionExpired(e) => write!(f, "session expired: {e}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Storage(msg) => write!(f, "session storage: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "invalid authorization header: {msg}"),
            Self::Cancelled => f.write_str("request cancelled"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<TransportError> for GatewayError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    NoRefreshInProgress,
    Refreshing,
}

/// Sends requests to the API backend.
pub trait ApiTransport: Send + Sync + 'static {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Refresh before a request once the access token is this close to expiry.
    pub threshold_secs: i64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self { threshold_secs: REFRESH_THRESHOLD_SECS }
    }
}

type Reply = Result<ApiResponse, GatewayError>;

struct PendingRequest {
    request: ApiRequest,
    reply: oneshot::Sender<Reply>,
}

/// Requests waiting on the current refresh.
#[derive(Default)]
struct ReplayQueue {
    refreshing: bool,
    /// Bumped by reset so a stale driver stops draining.
    epoch: u64,
    pending: VecDeque<PendingRequest>,
}

pub struct RequestGateway {
    coordinator: RefreshCoordinator,
    store: Arc<dyn SessionStore>,
    transport: Arc<dyn ApiTransport>,
    settings: GatewaySettings,
    event_tx: broadcast::Sender<SessionEvent>,
    queue: Mutex<ReplayQueue>,
}

impl RequestGateway {
    pub fn new(
        coordinator: RefreshCoordinator,
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn ApiTransport>,
        settings: GatewaySettings,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            store,
            transport,
            settings,
            event_tx,
            queue: Mutex::new(ReplayQueue::default()),
        })
    }

    /// Run `request` through the full pipeline: pre-flight, send, and
    /// replay on 401.
    pub async fn execute(
        self: &Arc<Self>,
        request: ApiRequest,
    ) -> Result<ApiResponse, GatewayError> {
        let request = self.before_request(request).await?;
        let response = self.transport.send(request.clone()).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            return self.on_response_error(request, response).await;
        }
        Ok(response)
    }

    /// Attach a usable access token, refreshing first if the stored one is
    /// expired or about to be. Without a stored session the request passes
    /// through unauthenticated.
    pub async fn before_request(&self, request: ApiRequest) -> Result<ApiRequest, GatewayError> {
        let Some(pair) = self.load_pair().await? else {
            return Ok(request);
        };

        let threshold = self.settings.threshold_secs;
        let status = status_of(Some(&pair.access_token), epoch_secs(), threshold);
        match status {
            TokenStatus::Valid => request.with_bearer(&pair.access_token),
            TokenStatus::NoToken => Ok(request),
            TokenStatus::SoonExpiring | TokenStatus::Expired => {
                debug!(%status, path = %request.path, "refreshing before request");
                match self.coordinator.refresh_if_stale(&pair.access_token).await {
                    Ok(pair) => request.with_bearer(&pair.access_token),
                    Err(e) => Err(self.teardown(e).await),
                }
            }
        }
    }

    /// Handle an error response. Anything but a first 401 is returned as is;
    /// a first 401 is queued behind a refresh and replayed with the new token.
    pub async fn on_response_error(
        self: &Arc<Self>,
        request: ApiRequest,
        response: ApiResponse,
    ) -> Result<ApiResponse, GatewayError> {
        if response.status != StatusCode::UNAUTHORIZED || request.retried {
            return Ok(response);
        }

        if self.state() == GatewayState::NoRefreshInProgress {
            if let Some(pair) = self.load_pair().await? {
                if request.bearer_token() != Some(pair.access_token.as_str()) {
                    debug!(path = %request.path, "token rotated since send, replaying");
                    return self.replay(request, &pair.access_token).await;
                }
            }
        }

        let stale_access = request.bearer_token().map(str::to_owned);
        let (reply, rx) = oneshot::channel();
        let start = {
            let mut queue = self.queue.lock();
            queue.pending.push_back(PendingRequest { request, reply });
            !std::mem::replace(&mut queue.refreshing, true)
        };
        if start {
            let gateway = Arc::clone(self);
            tokio::spawn(async move { gateway.refresh_and_replay(stale_access).await });
        }

        rx.await.unwrap_or(Err(GatewayError::Cancelled))
    }

    /// Refresh the session now, whatever the state of the access token.
    /// A terminal failure clears the session like any other.
    pub async fn refresh_now(&self) -> Result<TokenPair, GatewayError> {
        match self.coordinator.perform_refresh().await {
            Ok(pair) => Ok(pair),
            Err(e) => Err(self.teardown(e).await),
        }
    }

    /// Seconds until the stored access token expires.
    pub async fn token_remaining_seconds(&self) -> Option<i64> {
        let pair = match self.store.load_token_pair().await {
            Ok(pair) => pair?,
            Err(e) => {
                warn!(err = %e, "failed to load session");
                return None;
            }
        };
        let claims = decode(&pair.access_token).ok()?;
        Some(remaining_seconds(&claims, epoch_secs()))
    }

    pub fn state(&self) -> GatewayState {
        if self.queue.lock().refreshing || self.coordinator.in_flight() {
            GatewayState::Refreshing
        } else {
            GatewayState::NoRefreshInProgress
        }
    }

    /// Drop the refresh marker and every queued request. Persisted tokens are
    /// untouched; queued callers see [`GatewayError::Cancelled`].
    #[cfg(debug_assertions)]
    pub fn reset(&self) {
        let dropped = {
            let mut queue = self.queue.lock();
            queue.refreshing = false;
            queue.epoch += 1;
            std::mem::take(&mut queue.pending)
        };
        self.coordinator.reset();
        warn!(dropped = dropped.len(), "gateway state reset");
    }

    /// Refresh once for everything queued, then replay the queue in order.
    /// `stale_access` is the bearer the first queued request was rejected with.
    async fn refresh_and_replay(self: Arc<Self>, stale_access: Option<String>) {
        let epoch = self.queue.lock().epoch;
        let refresh = match stale_access {
            Some(ref stale) => self.coordinator.refresh_if_stale(stale).boxed(),
            None => self.coordinator.perform_refresh().boxed(),
        };
        let outcome = match refresh.await {
            Ok(pair) => Ok(pair.access_token),
            Err(e) => Err(self.teardown(e).await),
        };

        let mut replayed = 0usize;
        loop {
            let next = {
                let mut queue = self.queue.lock();
                if queue.epoch != epoch {
                    return;
                }
                match queue.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        queue.refreshing = false;
                        break;
                    }
                }
            };
            let result = match outcome {
                Ok(ref token) => self.replay(next.request, token).await,
                Err(ref e) => Err(e.clone()),
            };
            let _ = next.reply.send(result);
            replayed += 1;
        }
        debug!(replayed, ok = outcome.is_ok(), "replay queue drained");
    }

    async fn replay(&self, request: ApiRequest, token: &str) -> Result<ApiResponse, GatewayError> {
        let mut request = request.with_bearer(token)?;
        request.retried = true;
        Ok(self.transport.send(request).await?)
    }

    /// Clear the session after a terminal refresh failure. Only the caller
    /// that actually removed the pair announces the logout.
    async fn teardown(&self, err: RefreshError) -> GatewayError {
        match self.store.clear_token_pair().await {
            Ok(true) => {
                info!(code = err.as_str(), "session cleared");
                let _ = self.event_tx.send(SessionEvent::LoggedOut { reason: err.to_string() });
            }
            Ok(false) => {}
            Err(e) => warn!(err = %e, "failed to clear session"),
        }
        GatewayError::SessionExpired(err)
    }

    async fn load_pair(&self) -> Result<Option<TokenPair>, GatewayError> {
        self.store.load_token_pair().await.map_err(|e| GatewayError::Storage(e.to_string()))
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
