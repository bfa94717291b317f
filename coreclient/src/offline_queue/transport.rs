// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use uptendapiclient::{ApiClient, http::ApiRequestError};

/// The request never completed at the transport level.
///
/// This is the only failure that makes an action eligible for queueing and
/// retry; see the module documentation of [`crate::offline_queue`].
#[derive(Debug, Error)]
#[error("network failure: {reason}")]
pub struct NetworkFailure {
    reason: String,
}

impl NetworkFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A completed HTTP response, reduced to what replay decisions need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayResponse {
    status: u16,
}

impl ReplayResponse {
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// True for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport used for immediate attempts and queue replay.
#[async_trait]
pub trait ReplayTransport: Send + Sync {
    async fn replay(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ReplayResponse, NetworkFailure>;
}

#[async_trait]
impl ReplayTransport for ApiClient {
    async fn replay(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ReplayResponse, NetworkFailure> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| NetworkFailure::new(format!("invalid HTTP method {method:?}")))?;
        match self.send(method, path, body).await {
            Ok(response) => Ok(ReplayResponse::new(response.status().as_u16())),
            Err(ApiRequestError::Network(error)) => Err(NetworkFailure::new(error.to_string())),
            // `send` only fails at the transport level, but stay total.
            Err(other) => Err(NetworkFailure::new(other.to_string())),
        }
    }
}
