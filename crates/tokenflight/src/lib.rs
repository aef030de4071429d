// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tokenflight: bearer token lifecycle for API clients.
//!
//! Decodes and classifies short-lived access tokens, refreshes them through a
//! single-flight coordinator, and wraps outbound calls in a gateway that
//! replays requests rejected with 401 once a fresh token is available.

pub mod command;
pub mod config;
pub mod event;
pub mod gateway;
pub mod refresh;
pub mod store;
pub mod test_support;
pub mod token;

pub use event::SessionEvent;
pub use gateway::{ApiRequest, ApiResponse, GatewayError, GatewayState, RequestGateway};
pub use refresh::coordinator::RefreshCoordinator;
pub use refresh::{RefreshConfig, RefreshError};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use token::{TokenClaims, TokenPair, TokenStatus};

use std::sync::Once;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls. Must run before any
/// HTTP client is built, even for plain HTTP. Only the first call has effect.
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
