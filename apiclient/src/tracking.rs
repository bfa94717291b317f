// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The per-job tracking stream.
//!
//! The stream is receive-only: the server pushes JSON text frames and the
//! client never sends. Connection lifecycle (reconnects, backoff, teardown)
//! is owned by the consumer; this module only opens a single connection and
//! yields its frames until it closes.

use async_trait::async_trait;
use futures_util::{StreamExt, stream::BoxStream};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, warn};
use uptendcommon::identifiers::JobId;
use url::Url;

use crate::{ApiClient, ApiClientInitError};

/// Role query parameter sent with every tracking subscription.
const TRACKING_ROLE: &str = "customer";

/// Failure to open a tracking stream.
#[derive(Debug, Error)]
#[error("failed to open tracking stream: {reason}")]
pub struct TransportError {
    reason: String,
}

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A source of inbound tracking frames.
///
/// One `open` call corresponds to one transport connection; the returned
/// stream yields text frames and terminates when the connection closes or
/// errors. Implemented by [`WebSocketTransport`] in production and by
/// scripted fakes in tests.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn open(&self) -> Result<BoxStream<'static, String>, TransportError>;
}

/// Opens WebSocket connections to a fixed tracking URL.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: Url,
}

impl WebSocketTransport {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl EventTransport for WebSocketTransport {
    async fn open(&self) -> Result<BoxStream<'static, String>, TransportError> {
        debug!(url = %self.url, "opening tracking stream");
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|error| TransportError::new(error.to_string()))?;
        let (_write, read) = stream.split();

        // The stream ends at the first close frame or protocol error; both
        // look the same to the consumer.
        let frames = read
            .take_while(|message| {
                let open = match message {
                    Ok(Message::Close(_)) => false,
                    Ok(_) => true,
                    Err(error) => {
                        warn!(%error, "tracking stream transport error");
                        false
                    }
                };
                futures_util::future::ready(open)
            })
            .filter_map(|message| {
                let frame = match message {
                    Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                    // Pings are answered by the protocol layer; binary frames
                    // are not part of the tracking contract.
                    _ => None,
                };
                futures_util::future::ready(frame)
            })
            .boxed();

        Ok(frames)
    }
}

impl ApiClient {
    /// Derives the tracking stream URL for a job from the API origin.
    pub fn tracking_url(&self, job_id: &JobId) -> Result<Url, ApiClientInitError> {
        let mut url = self.base_url().clone();
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| ApiClientInitError::InvalidUrl(url.to_string()))?;
        url.set_path("/ws");
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .append_pair("jobId", job_id.as_str())
            .append_pair("role", TRACKING_ROLE);
        Ok(url)
    }

    /// Creates a transport for a job's tracking stream.
    pub fn tracking_transport(
        &self,
        job_id: &JobId,
    ) -> Result<WebSocketTransport, ApiClientInitError> {
        Ok(WebSocketTransport::new(self.tracking_url(job_id)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn client(origin: &str) -> ApiClient {
        let url: Url = origin.parse().unwrap();
        ApiClient::with_endpoint(&url).unwrap()
    }

    #[test]
    fn tracking_url_uses_ws_scheme_for_http_origin() {
        let url = client("http://localhost:5000")
            .tracking_url(&JobId::new("job-1"))
            .unwrap();
        assert_eq!(url.as_str(), "ws://localhost:5000/ws?jobId=job-1&role=customer");
    }

    #[test]
    fn tracking_url_uses_wss_scheme_for_https_origin() {
        let url = client("https://uptend.app")
            .tracking_url(&JobId::new("job-1"))
            .unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("uptend.app"));
    }

    #[test]
    fn tracking_url_replaces_base_path_and_query() {
        let url = client("https://uptend.app/api/?debug=1")
            .tracking_url(&JobId::new("j 7"))
            .unwrap();
        assert_eq!(url.path(), "/ws");
        assert_eq!(
            url.query(),
            Some("jobId=j+7&role=customer"),
            "query is rebuilt from scratch"
        );
    }
}
