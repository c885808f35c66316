// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use crate::exporters::webhook::client::{WebhookHttpClient, build_hyper_client};

const DEFAULT_USER_AGENT: &str = concat!("minecraft-webhook/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid webhook endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("unable to connect to webhook endpoint: {0}")]
    Connect(String),

    #[error("webhook request timed out after {0:?}")]
    Timeout(Duration),

    #[error("webhook request failed: {0}")]
    Request(String),

    #[error("failed reading webhook response: {0}")]
    Body(String),

    #[error("failed to encode webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of a request that reached the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Status in 200..=300
    Delivered { status: StatusCode },
    /// Any other status, with the full response body
    Rejected { status: StatusCode, body: String },
}

impl DeliveryOutcome {
    fn from_response(status: StatusCode, body: &[u8]) -> Self {
        if (200..=300).contains(&status.as_u16()) {
            DeliveryOutcome::Delivered { status }
        } else {
            DeliveryOutcome::Rejected {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts messages to a webhook as `{"content": "<message>"}`.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: WebhookHttpClient,
    endpoint: Uri,
    request_timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, NotifyError> {
        let endpoint = parse_endpoint(endpoint)?;
        let client = build_hyper_client().map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            request_timeout,
        })
    }

    /// Send one message. A response of any status is an outcome; only a
    /// failure to complete the exchange is an error.
    pub async fn deliver(&self, message: &str) -> Result<DeliveryOutcome, NotifyError> {
        let body = serde_json::to_vec(&WebhookPayload { content: message })?;

        let req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        match timeout(self.request_timeout, self.perform_request(req)).await {
            Ok(res) => res,
            Err(_) => Err(NotifyError::Timeout(self.request_timeout)),
        }
    }

    async fn perform_request(
        &self,
        req: Request<Full<Bytes>>,
    ) -> Result<DeliveryOutcome, NotifyError> {
        let resp = self.client.request(req).await.map_err(|e| {
            if e.is_connect() {
                NotifyError::Connect(e.to_string())
            } else {
                NotifyError::Request(e.to_string())
            }
        })?;

        let (head, body) = resp.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| NotifyError::Body(e.to_string()))?
            .to_bytes();

        Ok(DeliveryOutcome::from_response(head.status, &body))
    }
}

/// Validate a webhook URL: `http` or `https` scheme and a non-empty host.
pub fn parse_endpoint(endpoint: &str) -> Result<Uri, NotifyError> {
    let invalid = |reason: &str| NotifyError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = endpoint
        .trim()
        .parse()
        .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(_) => return Err(invalid("scheme must be http or https")),
        None => return Err(invalid("missing scheme")),
    }

    if uri.host().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }

    Ok(uri)
}
