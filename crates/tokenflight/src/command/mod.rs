// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `inspect`, `login`, `logout`, `status`, `refresh`, `get`, `post`.

pub mod inspect;

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::event;
use crate::gateway::http::ReqwestTransport;
use crate::gateway::{ApiRequest, ApiResponse, RequestGateway};
use crate::refresh::coordinator::RefreshCoordinator;
use crate::refresh::http::HttpRefreshTransport;
use crate::store::{FileStore, SessionStore};
use crate::token::{epoch_secs, TokenPair};

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Decode a token and print its claims and status. No I/O.
    Inspect {
        /// Access token (`header.payload.signature`).
        token: String,
    },
    /// Store an initial token pair.
    Login {
        #[arg(long, env = "TOKENFLIGHT_ACCESS_TOKEN")]
        access_token: String,
        #[arg(long, env = "TOKENFLIGHT_REFRESH_TOKEN")]
        refresh_token: String,
    },
    /// Remove the stored token pair.
    Logout,
    /// Show the status of the stored access token.
    Status,
    /// Exchange the stored refresh token for a new pair now.
    Refresh,
    /// Send an authenticated GET and print the response body.
    Get {
        /// Path relative to the API URL.
        path: String,
    },
    /// Send an authenticated POST and print the response body.
    Post {
        /// Path relative to the API URL.
        path: String,
        /// JSON request body.
        #[arg(long)]
        json: Option<String>,
    },
}

impl Command {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            Self::Login { access_token, refresh_token } => {
                if access_token.is_empty() || refresh_token.is_empty() {
                    anyhow::bail!("login requires non-empty access and refresh tokens");
                }
            }
            Self::Get { path } | Self::Post { path, .. } if !path.starts_with('/') => {
                anyhow::bail!("request path must start with '/': {path}");
            }
            Self::Post { json: Some(body), .. } => {
                serde_json::from_str::<serde_json::Value>(body)
                    .map_err(|e| anyhow::anyhow!("--json is not valid JSON: {e}"))?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Session components wired from [`Config`].
pub struct Session {
    pub store: Arc<FileStore>,
    pub gateway: Arc<RequestGateway>,
}

impl Session {
    pub fn from_config(config: &Config) -> Self {
        let store = Arc::new(FileStore::new(config.session_file()));
        let (event_tx, _) = event::channel();
        let refresh = Arc::new(HttpRefreshTransport::new(
            &config.api_url,
            &config.refresh_path,
            config.refresh_carrier,
            config.request_timeout(),
        ));
        let coordinator = RefreshCoordinator::new(
            store.clone(),
            refresh,
            config.refresh_config(),
            event_tx.clone(),
        );
        let api = Arc::new(ReqwestTransport::new(&config.api_url, config.request_timeout()));
        let gateway = RequestGateway::new(
            coordinator,
            store.clone(),
            api,
            config.gateway_settings(),
            event_tx,
        );
        Self { store, gateway }
    }
}

/// Run the configured subcommand. Returns the process exit code.
pub async fn run(config: &Config) -> anyhow::Result<i32> {
    if let Command::Inspect { ref token } = config.command {
        let report = inspect::inspect(token, epoch_secs(), config.refresh_threshold_secs)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    let session = Session::from_config(config);
    match config.command {
        Command::Inspect { .. } => Ok(0),
        Command::Login { ref access_token, ref refresh_token } => {
            session.store.save_token_pair(TokenPair::new(access_token, refresh_token)).await?;
            info!(path = %session.store.path().display(), "session stored");
            println!("{}", json!({ "loggedIn": true }));
            Ok(0)
        }
        Command::Logout => {
            let had = session.store.clear_token_pair().await?;
            println!("{}", json!({ "loggedOut": had }));
            Ok(0)
        }
        Command::Status => {
            let pair = session.store.load_token_pair().await?;
            let report = inspect::stored_status(
                pair.as_ref(),
                epoch_secs(),
                config.refresh_threshold_secs,
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(0)
        }
        Command::Refresh => {
            let pair = session.gateway.refresh_now().await?;
            let report = inspect::stored_status(
                Some(&pair),
                epoch_secs(),
                config.refresh_threshold_secs,
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(0)
        }
        Command::Get { ref path } => {
            let response = session.gateway.execute(ApiRequest::get(path.as_str())).await?;
            Ok(print_response(&response))
        }
        Command::Post { ref path, ref json } => {
            let body = json.clone().unwrap_or_else(|| "{}".to_owned());
            let request = ApiRequest::post(path.as_str()).with_json(body);
            let response = session.gateway.execute(request).await?;
            Ok(print_response(&response))
        }
    }
}

fn print_response(response: &ApiResponse) -> i32 {
    println!("{}", response.text());
    if response.status().is_success() {
        0
    } else {
        eprintln!("error: HTTP {}", response.status());
        1
    }
}
