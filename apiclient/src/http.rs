// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The JSON-over-HTTP surface of the server API.
//!
//! Error taxonomy matters here: a request that never completed (connection
//! refused, DNS failure, dropped mid-flight) is [`ApiRequestError::Network`],
//! while any completed response, whatever its status code, is returned as an
//! [`ApiResponse`]. The offline queue relies on this split to decide what to
//! queue for replay.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uptendcommon::identifiers::JobId;

use crate::ApiClient;

/// Errors surfaced by HTTP calls.
#[derive(Debug, Error)]
pub enum ApiRequestError {
    /// The request did not complete at the transport level.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// A completed response carried an unusable status. Only returned by
    /// typed convenience calls; [`ApiClient::send`] never classifies status
    /// codes.
    #[error("unexpected response status {0}")]
    Status(StatusCode),
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A completed HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// True for 2xx responses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiRequestError> {
        serde_json::from_str(&self.body).map_err(ApiRequestError::Decode)
    }
}

impl ApiClient {
    /// Sends a request to a relative API path.
    ///
    /// Attaches the bearer token when the auth provider has one. A completed
    /// response is always `Ok`, including 4xx/5xx; only transport failures
    /// are errors.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiRequestError> {
        let url = self.request_url(path);
        debug!(%method, %url, "sending API request");

        let mut request = self.inner.http_client.request(method, url);
        if let Some(token) = self.inner.auth_provider.auth_token().await {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "API request was unauthorized");
            if let Some(hook) = &self.inner.on_unauthorized {
                hook();
            }
        }

        Ok(ApiResponse { status, body })
    }

    /// Fetches the HTTP tracking snapshot for a job.
    ///
    /// The tracking UI polls this endpoint alongside the WebSocket stream to
    /// recover state after long disconnects.
    pub async fn fetch_tracking_snapshot(&self, job_id: &JobId) -> Result<Value, ApiRequestError> {
        let response = self
            .send(Method::GET, &format!("/api/jobs/{job_id}/track"), None)
            .await?;
        if !response.is_success() {
            return Err(ApiRequestError::Status(response.status()));
        }
        response.json()
    }

    fn request_url(&self, path: &str) -> String {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use serde_json::json;
    use url::Url;

    use crate::auth::StaticToken;

    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> ApiClient {
        let url: Url = server.url().parse().unwrap();
        ApiClient::with_endpoint(&url).unwrap()
    }

    #[tokio::test]
    async fn bearer_token_is_attached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/bookings")
            .match_header("authorization", "Bearer secret-token")
            .with_status(201)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let url: Url = server.url().parse().unwrap();
        let client = ApiClient::builder(&url)
            .unwrap()
            .auth_provider(Arc::new(StaticToken("secret-token".into())))
            .build()
            .unwrap();

        let response = client
            .send(Method::POST, "/api/bookings", Some(&json!({"kind": "junk_removal"})))
            .await
            .unwrap();
        assert!(response.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn completed_error_status_is_not_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/jobs/j1/track")
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client
            .send(Method::GET, "/api/jobs/j1/track", None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn transport_failure_is_a_network_error() {
        // Nothing listens on this port.
        let url: Url = "http://127.0.0.1:9".parse().unwrap();
        let client = ApiClient::with_endpoint(&url).unwrap();
        let result = client.send(Method::POST, "/api/bookings", None).await;
        assert!(matches!(result, Err(ApiRequestError::Network(_))));
    }

    #[tokio::test]
    async fn unauthorized_response_invokes_hook_and_still_completes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/me")
            .with_status(401)
            .create_async()
            .await;

        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = calls.clone();
        let url: Url = server.url().parse().unwrap();
        let client = ApiClient::builder(&url)
            .unwrap()
            .on_unauthorized(Arc::new(move || {
                hook_calls.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .unwrap();

        let response = client.send(Method::GET, "/api/me", None).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tracking_snapshot_decodes_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/jobs/j42/track")
            .with_status(200)
            .with_body(r#"{"job":{"id":"j42","status":"en_route"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let snapshot = client
            .fetch_tracking_snapshot(&JobId::new("j42"))
            .await
            .unwrap();
        assert_eq!(snapshot["job"]["status"], "en_route");
    }
}
