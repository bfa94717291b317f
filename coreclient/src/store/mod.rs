// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Durable client-side storage.
//!
//! Everything this crate persists lives in a single string key-value table:
//! the offline action queue (one JSON array under one key) and the auth
//! token. Values are always read and written whole, so a reader never
//! observes a partially updated record.

use async_trait::async_trait;
use thiserror::Error;

mod auth_token;
mod memory;
mod sqlite;

pub use auth_token::StoredAuthToken;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage key of the serialized offline action queue.
pub const OFFLINE_QUEUE_KEY: &str = "offline_action_queue";

/// Storage key of the bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A durable string key-value store.
///
/// Injected into the components that persist state so tests can substitute
/// [`MemoryStore`] for the SQLite-backed production store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
