// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::gateway::{ApiRequest, ApiResponse, ApiTransport, TransportError};

/// [`ApiTransport`] that sends requests to `{base_url}{path}` with reqwest.
pub struct ReqwestTransport {
    base_url: String,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self::with_client(base_url, client)
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_owned(), client }
    }

    async fn do_send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut req = self.client.request(request.method, &url).headers(request.headers);
        if let Some(body) = request.body {
            req = req.body(body);
        }

        let resp = req.send().await.map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(|e| TransportError(e.to_string()))?;
        Ok(ApiResponse { status, headers, body })
    }
}

impl ApiTransport for ReqwestTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>> {
        Box::pin(self.do_send(request))
    }
}
