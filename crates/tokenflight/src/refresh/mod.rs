// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh token exchange: error taxonomy, retry policy, and transport seam.

pub mod coordinator;
pub mod http;

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::token::TokenPair;

/// Default maximum exchange attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff unit; the wait after the n-th failure is `base * 2^n`.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Default ceiling for a single backoff wait.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Why a refresh did not produce a new token pair.
///
/// Everything except [`RefreshError::Transient`] is terminal: retrying
/// cannot help and the session must be torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token in the session store.
    NotFound,
    /// Refresh endpoint rejected the refresh token (401/403).
    Rejected { status: u16 },
    /// Success response missing the access or refresh token.
    InvalidResponse(String),
    /// Transient failures exhausted the retry budget.
    MaxRetriesExceeded { attempts: u32, last: String },
    /// Session store read or write failed.
    Storage(String),
    /// The attempt task died before settling.
    Interrupted(String),
    /// Network failure or non-auth error status. Retried internally.
    Transient(String),
}

impl RefreshError {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Transient(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "REFRESH_TOKEN_NOT_FOUND",
            Self::Rejected { .. } => "REFRESH_TOKEN_EXPIRED",
            Self::InvalidResponse(_) => "INVALID_REFRESH_RESPONSE",
            Self::MaxRetriesExceeded { .. } => "MAX_RETRY_EXCEEDED",
            Self::Storage(_) => "SESSION_STORAGE",
            Self::Interrupted(_) => "REFRESH_INTERRUPTED",
            Self::Transient(_) => "TRANSIENT",
        }
    }
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => f.write_str("refresh token not found"),
            Self::Rejected { status } => write!(f, "refresh token rejected (HTTP {status})"),
            Self::InvalidResponse(msg) => write!(f, "invalid refresh response: {msg}"),
            Self::MaxRetriesExceeded { attempts, last } => {
                write!(f, "refresh failed after {attempts} attempts: {last}")
            }
            Self::Storage(msg) => write!(f, "session storage: {msg}"),
            Self::Interrupted(msg) => write!(f, "refresh interrupted: {msg}"),
            Self::Transient(msg) => write!(f, "transient: {msg}"),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Retry policy for the refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RefreshConfig {
    /// Wait before retrying after `retry_count` transient failures.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(self.max_backoff)
    }
}

/// How the refresh token is presented to the refresh endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RefreshCarrier {
    /// `Refresh: Bearer <token>` header.
    #[default]
    Header,
    /// JSON body `{"refreshToken": "<token>"}`.
    Body,
}

/// Body returned by the refresh endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
}

impl RefreshResponse {
    /// Validate that both tokens are present and non-empty.
    pub fn into_token_pair(self) -> Result<TokenPair, RefreshError> {
        let access = self.access_token.filter(|t| !t.is_empty());
        let refresh = self.refresh_token.filter(|t| !t.is_empty());
        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(TokenPair::new(access, refresh)),
            (None, _) => Err(RefreshError::InvalidResponse("missing accessToken".to_owned())),
            (_, None) => Err(RefreshError::InvalidResponse("missing refreshToken".to_owned())),
        }
    }
}

/// Network exchange of a refresh token for a new pair.
///
/// Implementations classify failures: 401/403 as [`RefreshError::Rejected`],
/// unparseable success bodies as [`RefreshError::InvalidResponse`], and
/// everything else as [`RefreshError::Transient`].
pub trait RefreshTransport: Send + Sync + 'static {
    fn exchange<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshResponse, RefreshError>>;
}
