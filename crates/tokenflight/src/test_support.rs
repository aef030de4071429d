// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for unit and integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::gateway::{ApiRequest, ApiResponse, ApiTransport, TransportError};
use crate::refresh::{RefreshError, RefreshResponse, RefreshTransport};
use crate::token::{epoch_secs, TokenClaims};

/// Assert that an expression is `Err` and its Display output contains
/// the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

/// Build an unsigned `header.payload.signature` token carrying `claims`.
pub fn encode_token(claims: &TokenClaims) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap_or_default());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Build a token for `subject_id` that expires `ttl_secs` from now.
///
/// Negative `ttl_secs` produces an already-expired token.
pub fn token_expiring_in(subject_id: i64, ttl_secs: i64) -> String {
    let now = epoch_secs();
    encode_token(&TokenClaims {
        subject_id,
        display_name: format!("user-{subject_id}"),
        role: "member".to_owned(),
        terms_accepted: true,
        issued_at: Some(now - 60),
        expires_at: Some(now + ttl_secs),
    })
}

/// Scripted [`RefreshTransport`]: pops one outcome per exchange, repeating the
/// last one once the script runs out.
pub struct ScriptedRefresh {
    script: Mutex<VecDeque<Result<RefreshResponse, RefreshError>>>,
    last: Mutex<Option<Result<RefreshResponse, RefreshError>>>,
    delay: Duration,
    calls: AtomicU32,
    seen: Mutex<Vec<String>>,
    started: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedRefresh {
    pub fn new(script: Vec<Result<RefreshResponse, RefreshError>>) -> Arc<Self> {
        Self::with_delay(script, Duration::ZERO)
    }

    /// Each exchange sleeps `delay` before answering, so concurrent callers
    /// overlap with the in-flight attempt.
    pub fn with_delay(
        script: Vec<Result<RefreshResponse, RefreshError>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            delay,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
        })
    }

    /// Number of exchanges performed.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented, in call order.
    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    /// Start time of each exchange, on the tokio clock.
    pub fn started_at(&self) -> Vec<tokio::time::Instant> {
        self.started.lock().clone()
    }

    fn next_outcome(&self) -> Result<RefreshResponse, RefreshError> {
        let next = self.script.lock().pop_front();
        match next {
            Some(outcome) => {
                *self.last.lock() = Some(outcome.clone());
                outcome
            }
            None => self
                .last
                .lock()
                .clone()
                .unwrap_or_else(|| Err(RefreshError::Transient("empty script".to_owned()))),
        }
    }
}

impl RefreshTransport for ScriptedRefresh {
    fn exchange<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshResponse, RefreshError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(refresh_token.to_owned());
            self.started.lock().push(tokio::time::Instant::now());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.next_outcome()
        })
    }
}

/// A successful refresh body carrying `access` and `refresh`.
pub fn refreshed(access: &str, refresh: &str) -> Result<RefreshResponse, RefreshError> {
    Ok(RefreshResponse {
        access_token: Some(access.to_owned()),
        refresh_token: Some(refresh.to_owned()),
        user_id: Some(serde_json::json!(7)),
    })
}

/// Fake API backend: answers 200 with `"<path> ok"` when the request carries
/// `Bearer <accepted>`, otherwise 401. Records every request it sees.
pub struct FakeApi {
    accepted: String,
    log: Mutex<Vec<ApiRequest>>,
}

impl FakeApi {
    pub fn new(accepted: &str) -> Arc<Self> {
        Arc::new(Self { accepted: accepted.to_owned(), log: Mutex::new(Vec::new()) })
    }

    /// Requests received, in arrival order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().clone()
    }
}

impl ApiTransport for FakeApi {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>> {
        let authorized = request.bearer_token() == Some(self.accepted.as_str());
        let response = if authorized {
            ApiResponse::new(StatusCode::OK, format!("{} ok", request.path))
        } else {
            ApiResponse::new(StatusCode::UNAUTHORIZED, "unauthorized")
        };
        self.log.lock().push(request);
        Box::pin(async move { Ok(response) })
    }
}
