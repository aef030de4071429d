// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token freshness classification.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::token::{decode, TokenClaims};

/// Seconds before expiry at which a token counts as soon-expiring.
pub const REFRESH_THRESHOLD_SECS: i64 = 300;

/// Freshness of the stored access token. Derived on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Valid,
    /// Within the refresh threshold of expiry.
    SoonExpiring,
    Expired,
    /// Not logged in.
    NoToken,
}

impl TokenStatus {
    /// Whether a request should wait for a refresh before going out.
    pub fn needs_refresh(self) -> bool {
        matches!(self, Self::SoonExpiring | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::SoonExpiring => "soon_expiring",
            Self::Expired => "expired",
            Self::NoToken => "no_token",
        }
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `claims` at `now` (epoch seconds).
pub fn classify(claims: Option<&TokenClaims>, now: i64, threshold_secs: i64) -> TokenStatus {
    let Some(claims) = claims else {
        return TokenStatus::NoToken;
    };
    let Some(expires_at) = claims.expires_at else {
        return TokenStatus::Expired;
    };

    let remaining = expires_at.saturating_sub(now);
    if remaining <= 0 {
        TokenStatus::Expired
    } else if remaining <= threshold_secs {
        TokenStatus::SoonExpiring
    } else {
        TokenStatus::Valid
    }
}

/// Seconds until expiry, floored at zero. Missing `exp` counts as zero.
pub fn remaining_seconds(claims: &TokenClaims, now: i64) -> i64 {
    claims.expires_at.map(|exp| exp.saturating_sub(now).max(0)).unwrap_or(0)
}

/// Classify a raw token string. Undecodable tokens are `Expired`.
pub fn status_of(token: Option<&str>, now: i64, threshold_secs: i64) -> TokenStatus {
    match token {
        None => TokenStatus::NoToken,
        Some(token) => match decode(token) {
            Ok(claims) => classify(Some(&claims), now, threshold_secs),
            Err(_) => TokenStatus::Expired,
        },
    }
}

/// Whether `token` is expired or within `threshold_secs` of expiry right now.
pub fn is_expiring_soon(token: &str, threshold_secs: i64) -> bool {
    status_of(Some(token), epoch_secs(), threshold_secs).needs_refresh()
}

/// Current wall-clock time in epoch seconds.
pub fn epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
