// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh endpoint client over reqwest.

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use tracing::debug;

use crate::refresh::{RefreshCarrier, RefreshError, RefreshResponse, RefreshTransport};

/// Default refresh endpoint path, joined onto the API base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// `POST {base_url}{path}` with the refresh token carried per [`RefreshCarrier`].
pub struct HttpRefreshTransport {
    url: String,
    carrier: RefreshCarrier,
    client: reqwest::Client,
}

impl HttpRefreshTransport {
    pub fn new(base_url: &str, path: &str, carrier: RefreshCarrier, timeout: Duration) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self::with_client(base_url, path, carrier, client)
    }

    pub fn with_client(
        base_url: &str,
        path: &str,
        carrier: RefreshCarrier,
        client: reqwest::Client,
    ) -> Self {
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        Self { url, carrier, client }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn do_exchange(&self, refresh_token: &str) -> Result<RefreshResponse, RefreshError> {
        let req = self.client.post(&self.url);
        let req = match self.carrier {
            RefreshCarrier::Header => req.header("Refresh", format!("Bearer {refresh_token}")),
            RefreshCarrier::Body => req.json(&serde_json::json!({ "refreshToken": refresh_token })),
        };

        let resp =
            req.send().await.map_err(|e| RefreshError::Transient(format!("HTTP error: {e}")))?;
        let status = resp.status();
        let body =
            resp.text().await.map_err(|e| RefreshError::Transient(format!("read body: {e}")))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(%status, "refresh token rejected");
            return Err(RefreshError::Rejected { status: status.as_u16() });
        }
        if !status.is_success() {
            return Err(RefreshError::Transient(format!("HTTP {status}: {body}")));
        }

        serde_json::from_str(&body)
            .map_err(|e| RefreshError::InvalidResponse(format!("parse response: {e}")))
    }
}

impl RefreshTransport for HttpRefreshTransport {
    fn exchange<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshResponse, RefreshError>> {
        Box::pin(self.do_exchange(refresh_token))
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
