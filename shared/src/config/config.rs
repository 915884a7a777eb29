use std::fs;
use tracing::{debug, error, info};

use crate::types::server_config::{AppConfig, ConfigError};

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    parse_config(&contents)
}

/// Parse and validate configuration from an in-memory TOML document.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(contents)?;

    info!("Configuration loaded successfully");

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.request_timeout_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "request_timeout_secs must be greater than 0".into(),
        ));
    }

    if config.auth.signing_key_env.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "signing_key_env cannot be empty".into(),
        ));
    }

    if config.database.url.trim().is_empty() {
        return Err(ConfigError::InvalidConfig("database url cannot be empty".into()));
    }

    let google = &config.google;

    if google.client_id.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "google.client_id cannot be empty".into(),
        ));
    }

    if google.redirect_uri.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "google.redirect_uri cannot be empty".into(),
        ));
    }

    if google.scopes.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "google.scopes must list at least one scope".into(),
        ));
    }

    if google.timeout_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "google.timeout_secs must be greater than 0".into(),
        ));
    }

    // A request may spend one Google timeout on the call, one on the refresh
    // and one on the retry.
    let google_budget = google.timeout_secs.saturating_mul(3);
    if config.server.request_timeout_secs <= google_budget {
        return Err(ConfigError::InvalidConfig(format!(
            "request_timeout_secs ({}) must exceed three google.timeout_secs ({})",
            config.server.request_timeout_secs, google_budget
        )));
    }

    // Needed for every code exchange and refresh.
    if google.resolved_client_secret().is_none() {
        return Err(ConfigError::InvalidConfig(
            "google client secret must be set via GOOGLE_CLIENT_SECRET or google.client_secret"
                .into(),
        ));
    }

    Ok(())
}
