// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `tokenflight` binary.

use tokenflight::test_support::token_expiring_in;
use tokenflight_specs::{start_backend, BackendState, Cli};

const UNUSED_API: &str = "http://127.0.0.1:9";

#[tokio::test]
async fn inspect_prints_claims_and_status() -> anyhow::Result<()> {
    let cli = Cli::new(UNUSED_API)?;
    let token = token_expiring_in(42, 3600);

    let run = cli.run(&["inspect", &token]).await?;

    assert_eq!(run.code, Some(0), "stderr: {}", run.stderr);
    let report = run.json()?;
    assert_eq!(report["status"], "valid");
    assert_eq!(report["claims"]["userId"], 42);
    assert!(report["remainingSecs"].as_i64().is_some_and(|s| s > 3500));
    Ok(())
}

#[tokio::test]
async fn inspect_rejects_malformed_token() -> anyhow::Result<()> {
    let cli = Cli::new(UNUSED_API)?;
    let run = cli.run(&["inspect", "definitely-not-a-token"]).await?;
    assert_eq!(run.code, Some(1));
    assert!(run.stderr.contains("malformed token"), "stderr: {}", run.stderr);
    Ok(())
}

#[tokio::test]
async fn invalid_flags_exit_with_usage_code() -> anyhow::Result<()> {
    let cli = Cli::new(UNUSED_API)?;
    let run = cli.run(&["--max-retries", "0", "status"]).await?;
    assert_eq!(run.code, Some(2));
    assert!(run.stderr.contains("--max-retries"), "stderr: {}", run.stderr);
    Ok(())
}

#[tokio::test]
async fn login_status_logout_lifecycle() -> anyhow::Result<()> {
    let cli = Cli::new(UNUSED_API)?;
    let access = token_expiring_in(7, 120);

    let status = cli.run(&["status"]).await?;
    assert_eq!(status.json()?["status"], "no_token");

    let login =
        cli.run(&["login", "--access-token", &access, "--refresh-token", "refresh-1"]).await?;
    assert_eq!(login.code, Some(0), "stderr: {}", login.stderr);
    assert!(cli.session_file().exists());

    let status = cli.run(&["status"]).await?;
    assert_eq!(status.json()?["status"], "soon_expiring");

    let logout = cli.run(&["logout"]).await?;
    assert_eq!(logout.json()?["loggedOut"], true);
    assert!(!cli.session_file().exists());

    let again = cli.run(&["logout"]).await?;
    assert_eq!(again.json()?["loggedOut"], false);
    Ok(())
}

#[tokio::test]
async fn get_refreshes_stale_session() -> anyhow::Result<()> {
    let stale = token_expiring_in(1, 60);
    let fresh = token_expiring_in(1, 3600);
    let (addr, backend) = start_backend(BackendState {
        accepted_access: stale.clone(),
        accepted_refresh: "refresh-1".to_owned(),
        next_access: fresh.clone(),
        next_refresh: "refresh-2".to_owned(),
        refresh_calls: 0,
    })
    .await?;
    let cli = Cli::new(&format!("http://{addr}"))?;
    cli.run(&["login", "--access-token", &stale, "--refresh-token", "refresh-1"]).await?;

    let run = cli.run(&["get", "/profile"]).await?;

    assert_eq!(run.code, Some(0), "stderr: {}", run.stderr);
    assert_eq!(run.json()?["user"], "ada");
    assert_eq!(backend.lock().refresh_calls, 1);
    let session: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(cli.session_file())?)?;
    assert_eq!(session["accessToken"], fresh.as_str());
    assert_eq!(session["refreshToken"], "refresh-2");
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_logs_out() -> anyhow::Result<()> {
    let (addr, _backend) = start_backend(BackendState {
        accepted_refresh: "something-else".to_owned(),
        ..Default::default()
    })
    .await?;
    let cli = Cli::new(&format!("http://{addr}"))?;
    let expired = token_expiring_in(2, -30);
    cli.run(&["login", "--access-token", &expired, "--refresh-token", "refresh-1"]).await?;

    let run = cli.run(&["get", "/profile"]).await?;

    assert_eq!(run.code, Some(1));
    assert!(run.stderr.contains("session expired"), "stderr: {}", run.stderr);
    assert!(!cli.session_file().exists());
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_command_clears_session() -> anyhow::Result<()> {
    let (addr, backend) = start_backend(BackendState {
        accepted_refresh: "something-else".to_owned(),
        ..Default::default()
    })
    .await?;
    let cli = Cli::new(&format!("http://{addr}"))?;
    let valid = token_expiring_in(3, 3600);
    cli.run(&["login", "--access-token", &valid, "--refresh-token", "refresh-1"]).await?;

    let run = cli.run(&["refresh"]).await?;

    assert_eq!(run.code, Some(1));
    assert!(run.stderr.contains("session expired"), "stderr: {}", run.stderr);
    assert_eq!(backend.lock().refresh_calls, 1);
    assert!(!cli.session_file().exists());
    Ok(())
}
