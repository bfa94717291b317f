// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Client-side core of the UpTend app.
//!
//! Implements the pieces of the mobile/offline experience that must survive
//! bad networks: a durable offline action queue replayed in order when
//! connectivity returns, a connectivity monitor driving those replays, and a
//! per-job tracking session that keeps a WebSocket subscription alive with
//! exponential backoff.
//!
//! [`CoreClient`] wires the parts together over a SQLite-backed store and the
//! [`uptendapiclient::ApiClient`] network boundary.

mod client;
pub mod connectivity;
pub mod offline_queue;
pub mod store;
pub mod sync_service;
pub mod tracking;
pub(crate) mod utils;

pub use client::{CoreClient, CoreClientConfig, CoreClientError};
pub use connectivity::ConnectivityMonitor;
pub use offline_queue::{Executed, OfflineActionQueue, QueuedAction, SyncOutcome};
pub use tracking::{JobTrackingHandle, JobTrackingState};
