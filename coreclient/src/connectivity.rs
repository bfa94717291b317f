// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Network reachability signal.
//!
//! A platform adapter feeds raw reachability reports into
//! [`ConnectivityMonitor::report`]; the monitor de-duplicates them and
//! publishes transitions on a watch channel. An offline→online transition
//! additionally fires the reconnect hook (draining the offline queue),
//! fire-and-forget.
//!
//! Without a platform source the monitor stays at its optimistic default
//! (online) and simply never fires transitions; a missing or broken
//! reachability API must not take the app down.

use std::sync::OnceLock;

use futures_util::{Stream, StreamExt};
use tokio::sync::watch;
use tracing::debug;

/// Hook fired on every offline→online transition.
pub type ReconnectHook = Box<dyn Fn() + Send + Sync>;

/// Tracks the last reported reachability state.
pub struct ConnectivityMonitor {
    online_tx: watch::Sender<bool>,
    on_reconnect: OnceLock<ReconnectHook>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    /// Creates a monitor with the optimistic initial state: online until the
    /// platform reports otherwise.
    pub fn new() -> Self {
        Self {
            online_tx: watch::channel(true).0,
            on_reconnect: OnceLock::new(),
        }
    }

    /// Installs the hook fired on offline→online transitions. Later calls
    /// are ignored; the queue drain is wired exactly once at startup.
    pub fn set_reconnect_hook(&self, hook: ReconnectHook) {
        let _ = self.on_reconnect.set(hook);
    }

    /// Last known reachability state.
    pub fn is_online(&self) -> bool {
        *self.online_tx.borrow()
    }

    /// Subscribes to state transitions. Raw duplicate reports are already
    /// de-duplicated; subscribers only wake on actual changes. Dropping the
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }

    /// Feeds one raw platform report into the monitor.
    pub fn report(&self, online: bool) {
        let changed = self.online_tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return;
        }
        debug!(online, "connectivity changed");
        if online {
            if let Some(hook) = self.on_reconnect.get() {
                hook();
            }
        }
    }

    /// Drives the monitor from a platform reachability stream until the
    /// stream ends. When it ends the monitor keeps reporting the last known
    /// value.
    pub async fn run_source(&self, source: impl Stream<Item = bool>) {
        let mut source = std::pin::pin!(source);
        while let Some(online) = source.next().await {
            self.report(online);
        }
        debug!("connectivity source ended; keeping last known state");
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("is_online", &self.is_online())
            .finish_non_exhaustive()
    }
}
