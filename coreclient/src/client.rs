// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The assembled client core.

use std::{path::PathBuf, str::FromStr, sync::Arc};

use serde::Deserialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;
use uptendapiclient::{ApiClient, ApiClientInitError};
use uptendcommon::identifiers::JobId;
use url::Url;

use crate::{
    connectivity::ConnectivityMonitor,
    offline_queue::{Executed, OfflineActionQueue, SyncOutcome},
    store::{KeyValueStore, SqliteStore, StoreError, StoredAuthToken},
    sync_service::SyncService,
    tracking::{self, JobTrackingHandle},
};

/// Configuration of the client core, typically deserialized from the host
/// app's settings layer.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreClientConfig {
    /// Origin of the UpTend API, e.g. `https://uptend.app`.
    pub api_url: Url,
    /// Path of the SQLite database file. `None` keeps all state in memory,
    /// which drops the offline queue on exit; only useful for tests and
    /// ephemeral sessions.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum CoreClientError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    ApiClient(#[from] ApiClientInitError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Facade over the client core: durable store, API client, offline queue,
/// sync service and connectivity monitor, wired together.
///
/// The pieces are connected at construction: a platform adapter reports
/// reachability into [`CoreClient::connectivity`], an offline→online
/// transition notifies the sync service, the sync service drains the queue
/// over the API client, and the API client signs requests with the stored
/// auth token.
#[derive(Debug)]
pub struct CoreClient {
    api_client: ApiClient,
    auth_token: StoredAuthToken,
    queue: Arc<OfflineActionQueue>,
    sync_service: Arc<SyncService>,
    connectivity: Arc<ConnectivityMonitor>,
}

impl CoreClient {
    /// Opens the SQLite store and assembles the client core.
    pub async fn open(config: CoreClientConfig) -> Result<Self, CoreClientError> {
        let options = match &config.db_path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
            None => SqliteConnectOptions::from_str("sqlite::memory:")?,
        };
        // An in-memory database exists per connection; a second connection
        // would see an empty store.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Arc::new(SqliteStore::open(pool).await?);
        Self::with_store(&config.api_url, store)
    }

    /// Assembles the client core over an already opened store.
    pub fn with_store(
        api_url: &Url,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, CoreClientError> {
        let auth_token = StoredAuthToken::new(store.clone());
        let api_client = ApiClient::builder(api_url)?
            .auth_provider(Arc::new(auth_token.clone()))
            .build()?;

        let connectivity = Arc::new(ConnectivityMonitor::new());
        let queue = Arc::new(OfflineActionQueue::new(
            store,
            Arc::new(api_client.clone()),
            connectivity.subscribe(),
        ));
        let sync_service = Arc::new(SyncService::new(queue.clone()));

        let drain_target = sync_service.clone();
        connectivity.set_reconnect_hook(Box::new(move || {
            // Fire-and-forget: the transition path must not block on the
            // drain.
            drain_target.notify_work();
        }));

        // Replay whatever survived the last session.
        sync_service.start();
        info!(url = %api_url, "client core assembled");

        Ok(Self {
            api_client,
            auth_token,
            queue,
            sync_service,
            connectivity,
        })
    }

    pub fn api_client(&self) -> &ApiClient {
        &self.api_client
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// See [`OfflineActionQueue::execute_or_queue`].
    pub async fn execute_or_queue(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Executed {
        self.queue.execute_or_queue(method, path, body).await
    }

    /// Runs one replay pass immediately, outside the sync service schedule.
    pub async fn sync_now(&self) -> SyncOutcome {
        self.queue.sync_queue().await
    }

    pub async fn queue_size(&self) -> usize {
        self.queue.queue_size().await
    }

    pub async fn clear_queue(&self) {
        self.queue.clear_queue().await
    }

    /// Starts a live tracking subscription for a job.
    pub fn track_job(&self, job_id: JobId) -> Result<JobTrackingHandle, CoreClientError> {
        let transport = self.api_client.tracking_transport(&job_id)?;
        Ok(tracking::spawn(Arc::new(transport), job_id))
    }

    pub async fn set_auth_token(&self, token: &str) -> Result<(), StoreError> {
        self.auth_token.set(token).await
    }

    pub async fn clear_auth_token(&self) -> Result<(), StoreError> {
        self.auth_token.clear().await
    }

    /// Stops the sync service; a running replay pass finishes first.
    pub async fn close(&self) {
        self.sync_service.stop().await;
    }
}

#[cfg(test)]
mod test {
    use crate::store::MemoryStore;

    use super::*;

    fn core_client() -> CoreClient {
        let api_url: Url = "http://127.0.0.1:9".parse().unwrap();
        CoreClient::with_store(&api_url, Arc::new(MemoryStore::new())).unwrap()
    }

    #[tokio::test]
    async fn queue_round_trip_through_the_facade() {
        let client = core_client();

        // Nothing listens on the endpoint, so the immediate attempt fails at
        // the transport level and falls back to the queue.
        let executed = client
            .execute_or_queue("POST", "/api/bookings", None)
            .await;
        assert!(matches!(executed, Executed::Queued));
        assert_eq!(client.queue_size().await, 1);

        client.clear_queue().await;
        assert_eq!(client.queue_size().await, 0);

        client.close().await;
    }

    #[tokio::test]
    async fn offline_transition_is_reported() {
        let client = core_client();
        assert!(client.connectivity().is_online());
        client.connectivity().report(false);
        assert!(!client.connectivity().is_online());
        client.close().await;
    }

    #[tokio::test]
    async fn auth_token_round_trip() {
        let client = core_client();
        client.set_auth_token("jwt").await.unwrap();
        client.clear_auth_token().await.unwrap();
        client.close().await;
    }

    #[tokio::test]
    async fn open_with_a_database_file_persists_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreClientConfig {
            api_url: "http://127.0.0.1:9".parse().unwrap(),
            db_path: Some(dir.path().join("client.sqlite")),
        };

        let client = CoreClient::open(config.clone()).await.unwrap();
        client.execute_or_queue("POST", "/api/bookings", None).await;
        assert_eq!(client.queue_size().await, 1);
        client.close().await;
        drop(client);

        let reopened = CoreClient::open(config).await.unwrap();
        assert_eq!(
            reopened.queue_size().await,
            1,
            "the queue survives a restart"
        );
        reopened.close().await;
    }
}
