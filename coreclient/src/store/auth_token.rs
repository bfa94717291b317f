// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::warn;
use uptendapiclient::auth::AuthTokenProvider;

use super::{AUTH_TOKEN_KEY, KeyValueStore, StoreError};

/// Bearer token persisted in the client store, with an in-memory cache.
///
/// The cache holds the token once it has been seen; a missing token is
/// re-checked against the store on every read, so a login from another part
/// of the app becomes visible without an explicit cache refresh.
#[derive(Clone)]
pub struct StoredAuthToken {
    store: Arc<dyn KeyValueStore>,
    cached: Arc<Mutex<Option<String>>>,
}

impl StoredAuthToken {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn get(&self) -> Option<String> {
        if let Some(token) = self.cached.lock().unwrap().clone() {
            return Some(token);
        }
        let token = match self.store.get(AUTH_TOKEN_KEY).await {
            Ok(token) => token,
            Err(error) => {
                warn!(%error, "failed to load auth token; sending unauthenticated");
                None
            }
        };
        if let Some(token) = &token {
            *self.cached.lock().unwrap() = Some(token.clone());
        }
        token
    }

    pub async fn set(&self, token: &str) -> Result<(), StoreError> {
        *self.cached.lock().unwrap() = Some(token.to_owned());
        self.store.set(AUTH_TOKEN_KEY, token).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        *self.cached.lock().unwrap() = None;
        self.store.remove(AUTH_TOKEN_KEY).await
    }
}

impl std::fmt::Debug for StoredAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredAuthToken").finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthTokenProvider for StoredAuthToken {
    async fn auth_token(&self) -> Option<String> {
        self.get().await
    }
}
