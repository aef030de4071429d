// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;

use crate::token::{
    classify, decode, remaining_seconds, DecodeError, TokenClaims, TokenPair, TokenStatus,
};

/// Printable summary of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectReport {
    pub status: TokenStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<TokenClaims>,
}

/// Decode `token` and classify it at `now`. Decode failures are reported.
pub fn inspect(token: &str, now: i64, threshold_secs: i64) -> Result<InspectReport, DecodeError> {
    let claims = decode(token)?;
    Ok(report(claims, now, threshold_secs))
}

/// Summarise the stored pair. An undecodable access token reads as expired.
pub fn stored_status(pair: Option<&TokenPair>, now: i64, threshold_secs: i64) -> InspectReport {
    let Some(pair) = pair else {
        return InspectReport { status: TokenStatus::NoToken, remaining_secs: None, claims: None };
    };
    match decode(&pair.access_token) {
        Ok(claims) => report(claims, now, threshold_secs),
        Err(_) => {
            InspectReport { status: TokenStatus::Expired, remaining_secs: Some(0), claims: None }
        }
    }
}

fn report(claims: TokenClaims, now: i64, threshold_secs: i64) -> InspectReport {
    InspectReport {
        status: classify(Some(&claims), now, threshold_secs),
        remaining_secs: Some(remaining_seconds(&claims, now)),
        claims: Some(claims),
    }
}

#[cfg(test)]
#[path = "inspect_tests.rs"]
mod tests;
