// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Runs the real `tokenflight` binary as a subprocess against a throwaway
//! session file and, where needed, a mock API backend.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::net::TcpListener;

const RUN_TIMEOUT: Duration = Duration::from_secs(20);

/// Resolve the path to the compiled `tokenflight` binary.
pub fn tokenflight_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("tokenflight")
}

/// Result of one binary invocation.
pub struct Run {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Run {
    /// Parse stdout as JSON.
    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }
}

impl From<Output> for Run {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// A `tokenflight` CLI bound to a private session file.
pub struct Cli {
    api_url: String,
    session_dir: tempfile::TempDir,
}

impl Cli {
    pub fn new(api_url: &str) -> anyhow::Result<Self> {
        let binary = tokenflight_binary();
        anyhow::ensure!(binary.exists(), "tokenflight binary not found at {}", binary.display());
        Ok(Self { api_url: api_url.to_owned(), session_dir: tempfile::tempdir()? })
    }

    pub fn session_file(&self) -> PathBuf {
        self.session_dir.path().join("session.json")
    }

    /// Run the binary with global flags for this CLI followed by `args`.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<Run> {
        let mut cmd = tokio::process::Command::new(tokenflight_binary());
        cmd.arg("--api-url")
            .arg(&self.api_url)
            .arg("--session-file")
            .arg(self.session_file())
            .arg("--backoff-base-ms")
            .arg("10")
            .arg("--log-level")
            .arg("warn")
            .args(args)
            .env_remove("TOKENFLIGHT_ACCESS_TOKEN")
            .env_remove("TOKENFLIGHT_REFRESH_TOKEN")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let output = tokio::time::timeout(RUN_TIMEOUT, cmd.output()).await??;
        Ok(output.into())
    }
}

/// What the mock backend has seen.
#[derive(Default)]
pub struct BackendState {
    pub accepted_access: String,
    pub accepted_refresh: String,
    pub next_access: String,
    pub next_refresh: String,
    pub refresh_calls: u32,
}

pub type SharedBackend = Arc<Mutex<BackendState>>;

fn bearer(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name)?.to_str().ok()?.strip_prefix("Bearer ").map(str::to_owned)
}

async fn refresh(
    State(state): State<SharedBackend>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut backend = state.lock();
    backend.refresh_calls += 1;
    if bearer(&headers, "refresh").as_deref() != Some(backend.accepted_refresh.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "message": "expired" })));
    }
    backend.accepted_access = backend.next_access.clone();
    backend.accepted_refresh = backend.next_refresh.clone();
    let body = serde_json::json!({
        "accessToken": backend.next_access,
        "refreshToken": backend.next_refresh,
        "userId": 1
    });
    (StatusCode::OK, Json(body))
}

async fn profile(State(state): State<SharedBackend>, headers: HeaderMap) -> (StatusCode, String) {
    let backend = state.lock();
    if bearer(&headers, "authorization").as_deref() == Some(backend.accepted_access.as_str()) {
        (StatusCode::OK, r#"{"user":"ada"}"#.to_owned())
    } else {
        (StatusCode::UNAUTHORIZED, r#"{"message":"unauthorized"}"#.to_owned())
    }
}

/// Start a mock API with `/auth/refresh` and `/profile` on an ephemeral port.
pub async fn start_backend(state: BackendState) -> anyhow::Result<(SocketAddr, SharedBackend)> {
    let shared = Arc::new(Mutex::new(state));
    let app = Router::new()
        .route("/auth/refresh", post(refresh))
        .route("/profile", get(profile))
        .with_state(Arc::clone(&shared));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((addr, shared))
}
