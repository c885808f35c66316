// SPDX-License-Identifier: Apache-2.0

//! Webhook exporter: drains matched messages from the receiver and posts
//! each one to the configured endpoint, strictly one at a time and in the
//! order they were queued.

mod client;
mod notifier;

pub use notifier::{DeliveryOutcome, NotifyError, WebhookNotifier, parse_endpoint};

use std::time::Duration;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{error, info, warn};

use crate::bounded_channel::BoundedReceiver;

#[derive(Debug, Clone)]
pub struct WebhookExporterConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
    /// Stop the exporter, and with it the process, on the first transport
    /// failure instead of moving on to the next message.
    pub exit_on_transport_error: bool,
}

impl WebhookExporterConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: Duration::from_secs(10),
            exit_on_transport_error: false,
        }
    }
}

pub struct WebhookExporter {
    notifier: WebhookNotifier,
    rx: BoundedReceiver<String>,
    exit_on_transport_error: bool,
}

impl WebhookExporter {
    pub fn new(
        config: &WebhookExporterConfig,
        rx: BoundedReceiver<String>,
    ) -> Result<Self, NotifyError> {
        let notifier = WebhookNotifier::new(&config.endpoint, config.request_timeout)?;
        Ok(Self::with_notifier(
            notifier,
            rx,
            config.exit_on_transport_error,
        ))
    }

    pub fn with_notifier(
        notifier: WebhookNotifier,
        rx: BoundedReceiver<String>,
        exit_on_transport_error: bool,
    ) -> Self {
        Self {
            notifier,
            rx,
            exit_on_transport_error,
        }
    }

    /// Run until the channel closes or `cancel` fires. A delivery that has
    /// already started is allowed to finish; queued messages are dropped on
    /// cancellation.
    pub async fn start(mut self, cancel: CancellationToken) -> Result<(), BoxError> {
        loop {
            select! {
                biased;

                _ = cancel.cancelled() => {
                    let pending = self.rx.len();
                    if pending > 0 {
                        warn!(pending, "Dropping undelivered messages on shutdown");
                    }
                    break;
                },
                msg = self.rx.next() => match msg {
                    Some(message) => self.export(&message).await?,
                    None => break,
                },
            }
        }

        info!("Webhook exporter stopped");
        Ok(())
    }

    async fn export(&self, message: &str) -> Result<(), NotifyError> {
        match self.notifier.deliver(message).await {
            Ok(DeliveryOutcome::Delivered { .. }) => {
                info!("Sent message '{}' successfully.", message);
            }
            Ok(DeliveryOutcome::Rejected { status, body }) => {
                error!(
                    status = status.as_u16(),
                    "Failed to send message '{}' with code {}.\n{}",
                    message,
                    status.as_u16(),
                    body
                );
            }
            Err(e) => {
                error!(error = %e, "Failed to send message '{}'.", message);
                if self.exit_on_transport_error {
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded_channel::bounded;
    use httpmock::prelude::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn exporter(endpoint: String, rx: BoundedReceiver<String>, fail_fast: bool) -> WebhookExporter {
        let mut config = WebhookExporterConfig::new(endpoint);
        config.request_timeout = Duration::from_secs(5);
        config.exit_on_transport_error = fail_fast;
        WebhookExporter::new(&config, rx).unwrap()
    }

    fn closed_port_endpoint() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}/webhook", port)
    }

    #[tokio::test]
    async fn test_exporter_delivers_in_order() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(POST)
                .path("/webhook")
                .json_body(json!({"content": "Steve joined the game"}));
            then.status(204);
        });
        let second = server.mock(|when, then| {
            when.method(POST)
                .path("/webhook")
                .json_body(json!({"content": "Steve left the game"}));
            then.status(204);
        });

        let (tx, rx) = bounded(10);
        tx.send("Steve joined the game".to_string()).await.unwrap();
        tx.send("Steve left the game".to_string()).await.unwrap();
        drop(tx);

        let res = exporter(server.url("/webhook"), rx, false)
            .start(CancellationToken::new())
            .await;
        assert_ok!(res);

        first.assert();
        second.assert();
    }

    #[tokio::test]
    async fn test_exporter_continues_after_rejection() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/webhook");
            then.status(500).body("internal error");
        });

        let (tx, rx) = bounded(10);
        tx.send("<Steve> one".to_string()).await.unwrap();
        tx.send("<Steve> two".to_string()).await.unwrap();
        drop(tx);

        let res = exporter(server.url("/webhook"), rx, false)
            .start(CancellationToken::new())
            .await;
        assert_ok!(res);
        mock.assert_hits(2);
    }

    #[tokio::test]
    async fn test_exporter_continues_after_transport_error() {
        let (tx, rx) = bounded(10);
        tx.send("Steve joined the game".to_string()).await.unwrap();
        tx.send("Steve left the game".to_string()).await.unwrap();
        drop(tx);

        let res = exporter(closed_port_endpoint(), rx, false)
            .start(CancellationToken::new())
            .await;
        assert_ok!(res);
    }

    #[tokio::test]
    async fn test_exporter_fail_fast_on_transport_error() {
        let (tx, rx) = bounded(10);
        tx.send("Steve joined the game".to_string()).await.unwrap();
        tx.send("Steve left the game".to_string()).await.unwrap();

        let res = exporter(closed_port_endpoint(), rx, true)
            .start(CancellationToken::new())
            .await;
        assert_err!(res);

        // The second message was never attempted
        assert_eq!(tx.len(), 1);
    }

    #[tokio::test]
    async fn test_exporter_stops_on_cancel() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/webhook");
            then.status(204);
        });

        let (tx, rx) = bounded(10);
        tx.send("Steve joined the game".to_string()).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let res = exporter(server.url("/webhook"), rx, false)
            .start(cancel)
            .await;
        assert_ok!(res);
        mock.assert_hits(0);
    }
}
