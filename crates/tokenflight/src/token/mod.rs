// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer token types: decoded claims, the persisted token pair, and status.

pub mod codec;
pub mod status;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

pub use codec::{decode, DecodeError};
pub use status::{
    classify, epoch_secs, is_expiring_soon, remaining_seconds, status_of, TokenStatus,
    REFRESH_THRESHOLD_SECS,
};

/// Decoded payload of an access token.
///
/// Every field is optional on the wire so partial payloads still decode.
/// Claims other than `exp` that are null or of the wrong type take their
/// defaults. A missing `exp` classifies as expired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
    #[serde(rename = "userId", deserialize_with = "lenient")]
    pub subject_id: i64,
    #[serde(rename = "name", deserialize_with = "lenient")]
    pub display_name: String,
    #[serde(deserialize_with = "lenient")]
    pub role: String,
    #[serde(rename = "termsAccepted", deserialize_with = "lenient")]
    pub terms_accepted: bool,
    /// Issue time, epoch seconds.
    #[serde(rename = "iat", deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    /// Expiry, epoch seconds.
    #[serde(rename = "exp", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// The access/refresh pair held by a [`SessionStore`](crate::store::SessionStore).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }
}

// Tokens are credentials; keep them out of logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…({} chars)", token.chars().count())
}
