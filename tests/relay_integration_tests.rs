// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use httpmock::prelude::*;
use minecraft_webhook::bounded_channel::{BoundedReceiver, bounded};
use minecraft_webhook::exporters::webhook::{
    DeliveryOutcome, WebhookExporter, WebhookExporterConfig, WebhookNotifier,
};
use minecraft_webhook::init::wait::wait_for_tasks_with_timeout;
use minecraft_webhook::receivers::log_file::{
    IncrementalReader, LogFileReceiver, LogFileReceiverConfig, PatternMatcher, Relay, WatchMode,
    WatcherConfig,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::task::JoinSet;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use tower::BoxError;

fn empty_log() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("latest.log");
    fs::write(&path, "").unwrap();
    (dir, path)
}

fn append(path: &Path, content: &str) {
    let mut f = OpenOptions::new().append(true).open(path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.flush().unwrap();
}

fn exporter(server: &MockServer, rx: BoundedReceiver<String>) -> WebhookExporter {
    let mut config = WebhookExporterConfig::new(server.url("/webhook"));
    config.request_timeout = Duration::from_secs(5);
    WebhookExporter::new(&config, rx).unwrap()
}

#[tokio::test]
async fn test_join_line_is_posted() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/webhook")
            .header("content-type", "application/json")
            .json_body(json!({"content": "Steve joined the game"}));
        then.status(204);
    });

    let (_dir, path) = empty_log();
    let (tx, rx) = bounded(10);
    let mut relay = Relay::new(
        IncrementalReader::new(&path).unwrap(),
        PatternMatcher::new().unwrap(),
        tx,
    );

    append(&path, "[12:00:00] [Server thread/INFO]: Steve joined the game\n");
    assert_eq!(1, relay.handle_change(&path).unwrap());

    // Closing the sender lets the exporter drain and return
    drop(relay);
    assert_ok!(exporter(&server, rx).start(CancellationToken::new()).await);

    mock.assert_hits(1);
}

#[tokio::test]
async fn test_only_matching_lines_are_posted() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/webhook");
        then.status(204);
    });

    let (_dir, path) = empty_log();
    let (tx, rx) = bounded(10);
    let mut relay = Relay::new(
        IncrementalReader::new(&path).unwrap(),
        PatternMatcher::new().unwrap(),
        tx,
    );

    append(
        &path,
        "[12:00:00] [Server thread/INFO]: Alex has made the advancement [Stone Age]\n\
         [12:00:01] [Server thread/WARN]: Can't keep up! Is the server overloaded?\n",
    );
    relay.handle_change(&path).unwrap();
    drop(relay);

    assert_ok!(exporter(&server, rx).start(CancellationToken::new()).await);
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_rejected_delivery_reports_status_and_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/webhook");
        then.status(500).body("internal error");
    });

    let notifier = WebhookNotifier::new(&server.url("/webhook"), Duration::from_secs(5)).unwrap();
    let outcome = notifier.deliver("Steve left the game").await.unwrap();
    assert_eq!(
        DeliveryOutcome::Rejected {
            status: http::StatusCode::INTERNAL_SERVER_ERROR,
            body: "internal error".to_string(),
        },
        outcome
    );

    // The exporter keeps going after a rejection
    let (_dir, path) = empty_log();
    let (tx, rx) = bounded(10);
    let mut relay = Relay::new(
        IncrementalReader::new(&path).unwrap(),
        PatternMatcher::new().unwrap(),
        tx,
    );
    append(
        &path,
        "[12:00:00] [Server thread/INFO]: Steve joined the game\n\
         [12:00:01] [Server thread/INFO]: Steve left the game\n",
    );
    relay.handle_change(&path).unwrap();
    drop(relay);

    assert_ok!(exporter(&server, rx).start(CancellationToken::new()).await);
    mock.assert_hits(3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pipeline_follows_appends() {
    let server = MockServer::start();
    let joined = server.mock(|when, then| {
        when.method(POST)
            .path("/webhook")
            .json_body(json!({"content": "Steve joined the game"}));
        then.status(204);
    });
    let chat = server.mock(|when, then| {
        when.method(POST)
            .path("/webhook")
            .json_body(json!({"content": "<Steve> hello"}));
        then.status(204);
    });

    let (_dir, path) = empty_log();
    append(&path, "[11:59:00] [Server thread/INFO]: Steve joined the game\n");

    let reader = IncrementalReader::new(&path).unwrap();
    let (tx, rx) = bounded(10);
    let mut tasks: JoinSet<Result<(), BoxError>> = JoinSet::new();
    let cancel = CancellationToken::new();

    let exporter = exporter(&server, rx);
    tasks.spawn(exporter.start(cancel.clone()));

    let config = LogFileReceiverConfig::new(reader.path()).with_watcher(WatcherConfig {
        mode: WatchMode::Poll,
        poll_interval: Duration::from_millis(50),
    });
    let relay = Relay::new(reader, PatternMatcher::new().unwrap(), tx);
    LogFileReceiver::new(config)
        .start(relay, &mut tasks, &cancel)
        .unwrap();

    append(
        &path,
        "[12:00:00] [Server thread/INFO]: Steve joined the game\n\
         [12:00:01] [Server thread/INFO]: <Steve> hello\n",
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while chat.hits_async().await < 1 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    cancel.cancel();
    assert_ok!(wait_for_tasks_with_timeout(&mut tasks, Duration::from_secs(5)).await);

    // The line present before startup is never sent
    joined.assert_hits(1);
    chat.assert_hits(1);
}
