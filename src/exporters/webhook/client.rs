// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use http_body_util::Full;
use hyper_rustls::{ConfigBuilderExt, HttpsConnector};
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::ClientConfig;
use std::time::Duration;
use tower::BoxError;
use tracing::warn;

use crate::crypto::init_crypto_provider;

pub(crate) type WebhookHttpClient = HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Root store from the platform, or the bundled webpki roots when the
/// platform has none (slim containers).
fn tls_client_config() -> Result<ClientConfig, BoxError> {
    init_crypto_provider()?;

    let config = match ClientConfig::builder().with_native_roots() {
        Ok(builder) => builder.with_no_client_auth(),
        Err(e) => {
            warn!("Unable to load native root certificates, using bundled roots: {}", e);
            ClientConfig::builder()
                .with_webpki_roots()
                .with_no_client_auth()
        }
    };

    Ok(config)
}

pub(crate) fn build_hyper_client() -> Result<WebhookHttpClient, BoxError> {
    let client_config = tls_client_config()?;

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(client_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    let client = HyperClient::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(2)
        .timer(TokioTimer::new())
        .build::<_, Full<Bytes>>(https);

    Ok(client)
}
