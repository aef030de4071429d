// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access token payload decoding.
//!
//! Only the payload segment is read. Signatures are the server's concern;
//! the client needs the claims to schedule refreshes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::token::TokenClaims;

/// Failure to read claims out of a token string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not three non-empty dot-separated segments.
    MalformedToken,
    /// Payload segment is not valid base64url.
    Base64(String),
    /// Payload bytes are not a JSON claim set.
    Json(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedToken => f.write_str("malformed token"),
            Self::Base64(msg) => write!(f, "invalid base64 payload: {msg}"),
            Self::Json(msg) => write!(f, "invalid claims json: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode the claim set carried in a `header.payload.signature` token.
pub fn decode(token: &str) -> Result<TokenClaims, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(DecodeError::MalformedToken);
    }

    let bytes = STANDARD
        .decode(to_standard_alphabet(segments[1]))
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))
}

/// Map base64url to the standard alphabet and restore `=` padding.
fn to_standard_alphabet(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while out.len() % 4 != 0 {
        out.push('=');
    }
    out
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
