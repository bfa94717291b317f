// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Client for the UpTend server API.
//!
//! The server exposes two surfaces this crate covers: a JSON-over-HTTP API
//! for all mutating and querying calls, and a per-job WebSocket stream for
//! live tracking updates. [`ApiClient`] wraps both behind a single handle
//! that is cheap to clone.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use url::Url;

pub mod auth;
pub mod http;
pub mod tracking;

use auth::{AuthTokenProvider, NoAuth, UnauthorizedHook};

/// User agent sent with every HTTP request and WebSocket handshake.
const USER_AGENT: &str = concat!("uptend-client/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur when creating an API client.
#[derive(Error, Debug)]
pub enum ApiClientInitError {
    #[error("Invalid URL {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

/// ApiClient is a thin wrapper around the HTTP client and the tracking
/// stream endpoint.
///
/// It holds the API origin, attaches bearer auth to every request when a
/// token is available, and derives the WebSocket endpoint from the same
/// origin.
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    auth_provider: Arc<dyn AuthTokenProvider>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl std::fmt::Debug for ApiClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClientInner")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client for the given API origin without authentication.
    pub fn with_endpoint(url: &Url) -> Result<Self, ApiClientInitError> {
        Self::builder(url)?.build()
    }

    pub fn builder(url: &Url) -> Result<ApiClientBuilder, ApiClientInitError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiClientInitError::InvalidUrl(url.to_string()));
        }
        Ok(ApiClientBuilder {
            base_url: url.clone(),
            auth_provider: None,
            on_unauthorized: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }
}

pub struct ApiClientBuilder {
    base_url: Url,
    auth_provider: Option<Arc<dyn AuthTokenProvider>>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl ApiClientBuilder {
    /// Source of the bearer token attached to every request.
    pub fn auth_provider(mut self, provider: Arc<dyn AuthTokenProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    /// Invoked whenever the server answers 401; the response is still
    /// returned to the caller as a completed attempt.
    pub fn on_unauthorized(mut self, hook: UnauthorizedHook) -> Self {
        self.on_unauthorized = Some(hook);
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiClientInitError> {
        let http_client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        info!(url = %self.base_url, "Created API client");
        Ok(ApiClient {
            inner: Arc::new(ApiClientInner {
                http_client,
                base_url: self.base_url,
                auth_provider: self.auth_provider.unwrap_or_else(|| Arc::new(NoAuth)),
                on_unauthorized: self.on_unauthorized,
            }),
        })
    }
}
