// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The offline action queue.
//!
//! A mutating API call made while offline, or whose immediate attempt never
//! reaches the server, is persisted here and replayed in enqueue order once
//! connectivity returns. Replay is at-most-[`MAX_RETRIES`]-attempts: an
//! action that keeps failing is eventually dropped without notifying anyone.
//!
//! Only transport-level failures queue an immediate call; a completed
//! response with an error status is handed back to the caller as a completed
//! attempt. During replay the rule differs: a non-2xx response counts as a
//! failed attempt and is retried. Both behaviors are load-bearing for
//! callers and covered by tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, warn};
use uptendcommon::{identifiers::ActionId, time::TimeStamp};

use crate::store::{KeyValueStore, OFFLINE_QUEUE_KEY};

mod transport;

pub use transport::{NetworkFailure, ReplayResponse, ReplayTransport};

/// Maximum number of replay attempts before an action is dropped.
pub const MAX_RETRIES: u32 = 5;

/// A deferred mutating API call awaiting replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: ActionId,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Enqueue time, milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Failed replay attempts so far.
    pub retries: u32,
}

impl QueuedAction {
    fn new(method: String, path: String, body: Option<Value>) -> Self {
        let created_at = TimeStamp::now();
        Self {
            id: ActionId::generate(created_at),
            method,
            path,
            body,
            created_at: created_at.as_millis(),
            retries: 0,
        }
    }
}

/// Result of [`OfflineActionQueue::execute_or_queue`].
#[derive(Debug)]
pub enum Executed {
    /// The call reached the server and completed, with whatever status.
    Completed(ReplayResponse),
    /// The call was persisted for later replay.
    Queued,
}

/// Aggregate counts of one replay pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub synced: usize,
    pub failed: usize,
}

/// Durable FIFO queue of deferred API calls.
///
/// Storage and transport are injected; the queue persists itself as a single
/// JSON array rewritten whole after every mutation.
pub struct OfflineActionQueue {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn ReplayTransport>,
    online: watch::Receiver<bool>,
    sync_in_flight: AtomicBool,
}

impl OfflineActionQueue {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn ReplayTransport>,
        online: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            transport,
            online,
            sync_in_flight: AtomicBool::new(false),
        }
    }

    fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Appends a new action to the persisted queue.
    ///
    /// Never fails: a storage write failure is logged and swallowed, there
    /// is no secondary durability store to fall back to.
    pub async fn enqueue(
        &self,
        method: impl Into<String>,
        path: impl Into<String>,
        body: Option<Value>,
    ) {
        let action = QueuedAction::new(method.into(), path.into(), body);
        debug!(id = %action.id, method = %action.method, path = %action.path, "queueing offline action");
        let mut queue = self.load_queue().await;
        queue.push(action);
        self.persist_queue(&queue).await;
    }

    /// Attempts the call immediately when online, falling back to the queue
    /// on a transport failure; skips the attempt entirely when offline.
    pub async fn execute_or_queue(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Executed {
        if self.is_online() {
            match self.transport.replay(method, path, body.as_ref()).await {
                Ok(response) => return Executed::Completed(response),
                Err(failure) => {
                    warn!(%failure, method, path, "immediate attempt failed; queueing for replay");
                }
            }
        }
        self.enqueue(method, path, body).await;
        Executed::Queued
    }

    /// Replays the queue once, in enqueue order.
    ///
    /// Returns zero counts without touching the queue when offline or when
    /// another replay pass is already running. Once started, the pass runs
    /// to completion over its snapshot.
    pub async fn sync_queue(&self) -> SyncOutcome {
        if !self.is_online() {
            return SyncOutcome::default();
        }
        if self.sync_in_flight.swap(true, Ordering::SeqCst) {
            debug!("replay pass already in progress");
            return SyncOutcome::default();
        }
        let outcome = self.replay_snapshot().await;
        self.sync_in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    async fn replay_snapshot(&self) -> SyncOutcome {
        let snapshot = self.load_queue().await;
        if snapshot.is_empty() {
            return SyncOutcome::default();
        }
        debug!(pending = snapshot.len(), "replaying offline actions");

        let mut outcome = SyncOutcome::default();
        let mut remaining = Vec::new();
        for mut action in snapshot {
            let completed_ok = match self
                .transport
                .replay(&action.method, &action.path, action.body.as_ref())
                .await
            {
                Ok(response) => {
                    if !response.is_success() {
                        debug!(id = %action.id, status = response.status(), "replay completed with error status");
                    }
                    response.is_success()
                }
                Err(failure) => {
                    debug!(id = %action.id, %failure, "replay attempt failed");
                    false
                }
            };

            if completed_ok {
                debug!(id = %action.id, "replayed offline action");
                outcome.synced += 1;
            } else {
                outcome.failed += 1;
                action.retries += 1;
                if action.retries < MAX_RETRIES {
                    remaining.push(action);
                } else {
                    warn!(id = %action.id, attempts = action.retries, "dropping offline action after retry budget");
                }
            }
        }

        self.persist_queue(&remaining).await;
        outcome
    }

    /// Number of actions currently persisted.
    pub async fn queue_size(&self) -> usize {
        self.load_queue().await.len()
    }

    /// Unconditionally empties the persisted queue.
    pub async fn clear_queue(&self) {
        self.persist_queue(&[]).await;
    }

    async fn load_queue(&self) -> Vec<QueuedAction> {
        let raw = match self.store.get(OFFLINE_QUEUE_KEY).await {
            Ok(raw) => raw,
            Err(error) => {
                error!(%error, "failed to read offline queue; treating as empty");
                return Vec::new();
            }
        };
        let Some(raw) = raw else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(queue) => queue,
            Err(error) => {
                error!(%error, "offline queue is corrupted; treating as empty");
                Vec::new()
            }
        }
    }

    async fn persist_queue(&self, queue: &[QueuedAction]) {
        let raw = match serde_json::to_string(queue) {
            Ok(raw) => raw,
            Err(error) => {
                error!(%error, "failed to serialize offline queue");
                return;
            }
        };
        if let Err(error) = self.store.set(OFFLINE_QUEUE_KEY, &raw).await {
            error!(%error, "failed to persist offline queue");
        }
    }
}

impl std::fmt::Debug for OfflineActionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineActionQueue")
            .field("sync_in_flight", &self.sync_in_flight)
            .finish_non_exhaustive()
    }
}
