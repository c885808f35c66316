// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::receivers::log_file::{WatchMode, WatcherConfig};

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Minecraft server log file to follow, usually logs/latest.log
    pub log_file: PathBuf,

    /// Webhook URL that matched messages are posted to
    #[arg(long, env = "MINECRAFT_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// TOML file providing the `webhook` key when no URL is given directly
    #[arg(long = "config", env = "MINECRAFT_WEBHOOK_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Timeout for a single webhook request
    #[arg(long, env = "MINECRAFT_WEBHOOK_TIMEOUT_SECS", default_value = "10")]
    pub webhook_timeout_secs: u64,

    /// File change notification backend
    #[arg(
        value_enum,
        long,
        env = "MINECRAFT_WEBHOOK_WATCH_MODE",
        default_value = "auto"
    )]
    pub watch_mode: WatchModeArg,

    /// Scan interval used by the polling backend
    #[arg(long, env = "MINECRAFT_WEBHOOK_POLL_INTERVAL_MS", default_value = "250")]
    pub poll_interval_ms: u64,

    /// Exit when a message cannot be delivered because the endpoint is unreachable
    #[arg(long, env = "MINECRAFT_WEBHOOK_EXIT_ON_TRANSPORT_ERROR", default_value = "false")]
    pub exit_on_transport_error: bool,
}

impl RunArgs {
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            mode: self.watch_mode.into(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum WatchModeArg {
    Auto,
    Native,
    Poll,
}

impl From<WatchModeArg> for WatchMode {
    fn from(value: WatchModeArg) -> Self {
        match value {
            WatchModeArg::Auto => WatchMode::Auto,
            WatchModeArg::Native => WatchMode::Native,
            WatchModeArg::Poll => WatchMode::Poll,
        }
    }
}
