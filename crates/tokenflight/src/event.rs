// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Session lifecycle events broadcast to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new token pair was persisted.
    Refreshed {
        /// Expiry of the new access token (epoch seconds), if it decodes.
        expires_at: Option<i64>,
    },
    /// A refresh attempt failed terminally.
    #[serde(rename = "refresh:failed")]
    RefreshFailed { error: String },
    /// Tokens were cleared after a terminal refresh failure.
    LoggedOut { reason: String },
}

/// Create the session event channel.
pub fn channel() -> (broadcast::Sender<SessionEvent>, broadcast::Receiver<SessionEvent>) {
    broadcast::channel(64)
}
