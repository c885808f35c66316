// SPDX-License-Identifier: Apache-2.0

//! Resolution of the webhook URL from the command line, the environment and
//! the TOML config file.

use std::path::PathBuf;

use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use serde::Deserialize;
use thiserror::Error;

use crate::exporters::webhook::parse_endpoint;
use crate::init::args::RunArgs;

pub const DEFAULT_CONFIG_FILE: &str = "minecraft-webhook.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file '{}' does not exist", .0.display())]
    MissingConfigFile(PathBuf),

    #[error("unable to load config file '{}': {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<figment::Error>,
    },

    #[error(
        "no webhook URL configured. Pass --webhook-url (or set MINECRAFT_WEBHOOK_URL), \
         or add `webhook = \"<url>\"` to {}",
        .0.display()
    )]
    MissingWebhookUrl(PathBuf),

    #[error("invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    webhook: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Config file that was consulted, if any
    pub config_file: Option<PathBuf>,
}

/// Resolve the webhook URL. A URL from the command line or environment
/// takes precedence over the `webhook` key of the config file.
pub fn resolve_webhook_config(args: &RunArgs) -> Result<WebhookConfig, ConfigError> {
    let (config_path, explicit) = match &args.config_file {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let config_file = if config_path.is_file() {
        Some(config_path.clone())
    } else if explicit {
        return Err(ConfigError::MissingConfigFile(config_path));
    } else {
        None
    };

    let mut figment = Figment::new();
    if let Some(path) = &config_file {
        figment = figment.merge(Toml::file(path));
    }
    if let Some(url) = args.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        figment = figment.merge(Serialized::default("webhook", url));
    }

    let file_config: FileConfig = figment.extract().map_err(|e| ConfigError::Load {
        path: config_path.clone(),
        source: Box::new(e),
    })?;

    let url = match file_config.webhook {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => return Err(ConfigError::MissingWebhookUrl(config_path)),
    };

    validate_url(&url)?;

    Ok(WebhookConfig { url, config_file })
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    parse_endpoint(url)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidWebhookUrl(e.to_string()))
}
