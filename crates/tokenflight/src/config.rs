// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::command::Command;
use crate::gateway::GatewaySettings;
use crate::refresh::http::DEFAULT_REFRESH_PATH;
use crate::refresh::{RefreshCarrier, RefreshConfig};

/// Bearer token session client with single-flight refresh.
#[derive(Debug, Parser)]
#[command(name = "tokenflight", version, about)]
pub struct Config {
    /// API base URL. Requests and the refresh endpoint are relative to it.
    #[arg(long, env = "TOKENFLIGHT_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Refresh endpoint path.
    #[arg(long, env = "TOKENFLIGHT_REFRESH_PATH", default_value = DEFAULT_REFRESH_PATH)]
    pub refresh_path: String,

    /// How the refresh token is sent to the refresh endpoint.
    #[arg(long, env = "TOKENFLIGHT_REFRESH_CARRIER", value_enum, default_value_t)]
    pub refresh_carrier: RefreshCarrier,

    /// Refresh attempts before giving up.
    #[arg(long, env = "TOKENFLIGHT_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Backoff unit in milliseconds; the n-th retry waits base * 2^n.
    #[arg(long, env = "TOKENFLIGHT_BACKOFF_BASE_MS", default_value = "1000")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff wait, in milliseconds.
    #[arg(long, env = "TOKENFLIGHT_MAX_BACKOFF_MS", default_value = "60000")]
    pub max_backoff_ms: u64,

    /// Refresh before a request once the token expires within this many seconds.
    #[arg(long, env = "TOKENFLIGHT_REFRESH_THRESHOLD_SECS", default_value = "300")]
    pub refresh_threshold_secs: i64,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "TOKENFLIGHT_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Session file (default: $XDG_STATE_HOME/tokenflight/session.json).
    #[arg(long, env = "TOKENFLIGHT_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "TOKENFLIGHT_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level filter.
    #[arg(long, env = "TOKENFLIGHT_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Validate option combinations that clap cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!("--api-url must be an http:// or https:// URL");
        }
        if !self.refresh_path.starts_with('/') {
            anyhow::bail!("--refresh-path must start with '/'");
        }
        if self.max_retries == 0 {
            anyhow::bail!("--max-retries must be at least 1");
        }
        if self.backoff_base_ms == 0 {
            anyhow::bail!("--backoff-base-ms must be positive");
        }
        if self.max_backoff_ms < self.backoff_base_ms {
            anyhow::bail!("--max-backoff-ms must not be below --backoff-base-ms");
        }
        if self.refresh_threshold_secs < 0 {
            anyhow::bail!("--refresh-threshold-secs must not be negative");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("--request-timeout-secs must be positive");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        self.command.validate()
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings { threshold_secs: self.refresh_threshold_secs }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolved session file path.
    pub fn session_file(&self) -> PathBuf {
        if let Some(ref path) = self.session_file {
            return path.clone();
        }
        state_dir().join("tokenflight").join("session.json")
    }
}

/// `$XDG_STATE_HOME`, falling back to `$HOME/.local/state`.
fn state_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_STATE_HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    home.join(".local").join("state")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
