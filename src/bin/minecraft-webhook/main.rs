// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use std::process::ExitCode;
use std::time::Duration;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use minecraft_webhook::bounded_channel::bounded;
use minecraft_webhook::crypto::init_crypto_provider;
use minecraft_webhook::exporters::webhook::{WebhookExporter, WebhookExporterConfig};
use minecraft_webhook::init::args::RunArgs;
use minecraft_webhook::init::config::{WebhookConfig, resolve_webhook_config};
use minecraft_webhook::init::logging::split_by_level;
use minecraft_webhook::init::wait;
use minecraft_webhook::receivers::log_file::{
    IncrementalReader, LogFileReceiver, LogFileReceiverConfig, PatternMatcher, Relay,
};

const SENDING_QUEUE_SIZE: usize = 1_000;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "minecraft-webhook")]
#[command(bin_name = "minecraft-webhook")]
#[command(version, about, long_about = None)]
struct Arguments {
    #[arg(value_enum, long, env = "MINECRAFT_WEBHOOK_LOG_FORMAT", default_value = "text")]
    /// Log format
    log_format: LogFormatArg,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = match Arguments::try_parse() {
        Ok(opt) => opt,
        Err(e) => {
            // --help and --version are reported through the same path
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let config = match resolve_webhook_config(&opt.run) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::from(1);
        }
    };

    // Validates the target and positions the offset at its current end
    let reader = match IncrementalReader::new(&opt.run.log_file) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::from(1);
        }
    };

    if let Err(e) = init_crypto_provider() {
        eprintln!("ERROR: {}", e);
        return ExitCode::from(1);
    }

    let _logger = match setup_logging(&opt.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: failed to setup logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(opt.run, config, reader) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "Failed to run minecraft-webhook.");
            ExitCode::from(1)
        }
    }
}

#[tokio::main]
async fn run(
    args: RunArgs,
    config: WebhookConfig,
    reader: IncrementalReader,
) -> Result<(), BoxError> {
    let mut task_join_set = JoinSet::new();
    let cancel_token = CancellationToken::new();

    let (msg_tx, msg_rx) = bounded::<String>(SENDING_QUEUE_SIZE);

    let exporter_config = WebhookExporterConfig {
        endpoint: config.url.clone(),
        request_timeout: args.webhook_timeout(),
        exit_on_transport_error: args.exit_on_transport_error,
    };
    let exporter = WebhookExporter::new(&exporter_config, msg_rx)?;

    info!(
        log_file = %reader.path().display(),
        webhook_host = config_host(&config),
        config_file = config
            .config_file
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
        offset = reader.offset(),
        "Starting minecraft-webhook {}",
        env!("CARGO_PKG_VERSION")
    );

    {
        let token = cancel_token.clone();
        task_join_set.spawn(async move { exporter.start(token).await });
    }

    let receiver_config =
        LogFileReceiverConfig::new(reader.path()).with_watcher(args.watcher_config());
    let relay = Relay::new(reader, PatternMatcher::new()?, msg_tx);
    if let Err(e) = LogFileReceiver::new(receiver_config).start(
        relay,
        &mut task_join_set,
        &cancel_token,
    ) {
        cancel_token.cancel();
        wait::wait_for_tasks_with_timeout(&mut task_join_set, SHUTDOWN_TIMEOUT).await?;
        return Err(e.into());
    }

    let result = select! {
        r = signal_wait() => r.map(|_| info!("Shutdown signal received.")),
        e = wait::wait_for_any_task(&mut task_join_set) => match e {
            Ok(()) => {
                warn!("Unexpected early exit of task.");
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    cancel_token.cancel();
    wait::wait_for_tasks_with_timeout(&mut task_join_set, SHUTDOWN_TIMEOUT).await?;

    result
}

/// Webhook URLs usually embed a secret token, so only the host is logged.
fn config_host(config: &WebhookConfig) -> String {
    config
        .url
        .parse::<http::Uri>()
        .ok()
        .and_then(|uri| uri.host().map(str::to_string))
        .unwrap_or_default()
}

type LoggerGuard = (WorkerGuard, WorkerGuard);

fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init()?;

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let writer = split_by_level(stdout_writer, stderr_writer);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive("hyper_util=warn".parse()?)
        .add_directive("rustls=warn".parse()?);

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        use std::io;
        use std::io::IsTerminal;

        // Skip color codes when not in a terminal
        let use_ansi = io::stdout().is_terminal();

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok((stdout_guard, stderr_guard))
}

async fn signal_wait() -> Result<(), BoxError> {
    let mut sig_term = signal(SignalKind::terminate())?;
    let mut sig_int = signal(SignalKind::interrupt())?;

    select! {
        _ = sig_term.recv() => {},
        _ = sig_int.recv() => {},
    }
    Ok(())
}
