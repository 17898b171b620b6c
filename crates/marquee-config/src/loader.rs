//! Loading settings from the process environment.
//!
//! # Design
//! - `.env` is optional; a present but unreadable file is an error.
//! - Loaders take a lookup function so tests never mutate process state.

use std::env;
use std::path::PathBuf;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    DispatchSettings, FetchSettings, LoggingSettings, ReconcileStrategy, SearchSettings,
    ServiceConfig, WorkerConfig,
};
use crate::validate::{
    Lookup, optional, parse_bounded_usize, parse_chat_id, parse_http_url, parse_socket_addr,
    require, split_args,
};

/// Front-end bot token.
pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
/// Uploading identity token; defaults to the bot token.
pub const ENV_UPLOADER_TOKEN: &str = "UPLOADER_TOKEN";
/// Storage location chat id.
pub const ENV_STORAGE_CHANNEL_ID: &str = "STORAGE_CHANNEL_ID";
/// Authorized uploading identity.
pub const ENV_UPLOADER_ID: &str = "UPLOADER_ID";
/// Job record store URL.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// Bot API base URL.
pub const ENV_TELEGRAM_API_URL: &str = "TELEGRAM_API_URL";
/// Search aggregator base URL.
pub const ENV_SEARCH_API_URL: &str = "SEARCH_API_URL";
/// Search aggregator key.
pub const ENV_SEARCH_API_KEY: &str = "SEARCH_API_KEY";
/// Search category.
pub const ENV_SEARCH_CATEGORY: &str = "SEARCH_CATEGORY";
/// Search result limit.
pub const ENV_SEARCH_LIMIT: &str = "SEARCH_LIMIT";
/// Worker scratch directory.
pub const ENV_DOWNLOAD_DIR: &str = "DOWNLOAD_DIR";
/// Worker executable path.
pub const ENV_WORKER_BIN: &str = "WORKER_BIN";
/// Concurrency gate size.
pub const ENV_MAX_CONCURRENT_WORKERS: &str = "MAX_CONCURRENT_WORKERS";
/// Fetch client program.
pub const ENV_FETCH_COMMAND: &str = "FETCH_COMMAND";
/// Fetch client arguments.
pub const ENV_FETCH_ARGS: &str = "FETCH_ARGS";
/// Reconciliation strategy.
pub const ENV_RECONCILE_STRATEGY: &str = "RECONCILE_STRATEGY";
/// Default log level.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Log output style.
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
/// Ops listener bind address.
pub const ENV_HTTP_ADDR: &str = "MARQUEE_HTTP_ADDR";

/// Load variables from a `.env` file in the working directory, if one exists.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be parsed.
pub fn load_dotenv() -> ConfigResult<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(source) => Err(ConfigError::Dotenv { path: None, source }),
    }
}

/// Load the service configuration from the process environment.
///
/// # Errors
///
/// Returns an error when a required variable is missing or invalid.
pub fn load_service_config() -> ConfigResult<ServiceConfig> {
    load_dotenv()?;
    service_config_from(&|name| env::var(name).ok())
}

/// Load the worker configuration from the process environment.
///
/// # Errors
///
/// Returns an error when a required variable is missing or invalid.
pub fn load_worker_config() -> ConfigResult<WorkerConfig> {
    load_dotenv()?;
    worker_config_from(&|name| env::var(name).ok())
}

/// Build the service configuration from an arbitrary lookup.
///
/// # Errors
///
/// Returns an error when a required variable is missing or invalid.
pub fn service_config_from(lookup: &dyn Fn(&str) -> Option<String>) -> ConfigResult<ServiceConfig> {
    let bot_token = require(lookup, ENV_BOT_TOKEN)?;
    let storage_channel_id =
        parse_chat_id(ENV_STORAGE_CHANNEL_ID, &require(lookup, ENV_STORAGE_CHANNEL_ID)?)?;
    let uploader_id = optional(lookup, ENV_UPLOADER_ID)
        .map(|value| parse_chat_id(ENV_UPLOADER_ID, &value))
        .transpose()?;
    let database_url = require(lookup, ENV_DATABASE_URL)?;

    let search = SearchSettings {
        api_url: parse_http_url(ENV_SEARCH_API_URL, &require(lookup, ENV_SEARCH_API_URL)?)?,
        api_key: optional(lookup, ENV_SEARCH_API_KEY),
        category: optional(lookup, ENV_SEARCH_CATEGORY)
            .unwrap_or_else(|| defaults::SEARCH_CATEGORY.to_string()),
        limit: optional(lookup, ENV_SEARCH_LIMIT)
            .map(|value| parse_bounded_usize(ENV_SEARCH_LIMIT, &value, defaults::MAX_SEARCH_LIMIT))
            .transpose()?
            .unwrap_or(defaults::SEARCH_LIMIT),
    };

    let dispatch = DispatchSettings {
        worker_bin: optional(lookup, ENV_WORKER_BIN).map_or_else(default_worker_bin, PathBuf::from),
        max_concurrent_workers: optional(lookup, ENV_MAX_CONCURRENT_WORKERS)
            .map(|value| {
                parse_bounded_usize(
                    ENV_MAX_CONCURRENT_WORKERS,
                    &value,
                    defaults::MAX_CONCURRENT_WORKERS_CEILING,
                )
            })
            .transpose()?
            .unwrap_or(defaults::MAX_CONCURRENT_WORKERS),
    };

    let reconcile_strategy = optional(lookup, ENV_RECONCILE_STRATEGY)
        .map(|value| value.parse::<ReconcileStrategy>())
        .transpose()?
        .unwrap_or_default();

    let http_addr = optional(lookup, ENV_HTTP_ADDR)
        .map(|value| parse_socket_addr(ENV_HTTP_ADDR, &value))
        .transpose()?;

    Ok(ServiceConfig {
        telegram_api_url: telegram_api_url(lookup)?,
        bot_token,
        storage_channel_id,
        uploader_id,
        database_url,
        search,
        dispatch,
        reconcile_strategy,
        logging: logging_settings(lookup)?,
        http_addr,
    })
}

/// Build the worker configuration from an arbitrary lookup.
///
/// # Errors
///
/// Returns an error when a required variable is missing or invalid.
pub fn worker_config_from(lookup: &dyn Fn(&str) -> Option<String>) -> ConfigResult<WorkerConfig> {
    let uploader_token = optional(lookup, ENV_UPLOADER_TOKEN)
        .map_or_else(|| require(lookup, ENV_BOT_TOKEN), Ok)?;
    let storage_channel_id =
        parse_chat_id(ENV_STORAGE_CHANNEL_ID, &require(lookup, ENV_STORAGE_CHANNEL_ID)?)?;
    let database_url = require(lookup, ENV_DATABASE_URL)?;

    let fetch = FetchSettings {
        command: optional(lookup, ENV_FETCH_COMMAND)
            .unwrap_or_else(|| defaults::FETCH_COMMAND.to_string()),
        args: split_args(
            &optional(lookup, ENV_FETCH_ARGS).unwrap_or_else(|| defaults::FETCH_ARGS.to_string()),
        ),
    };

    Ok(WorkerConfig {
        telegram_api_url: telegram_api_url(lookup)?,
        uploader_token,
        storage_channel_id,
        database_url,
        download_dir: optional(lookup, ENV_DOWNLOAD_DIR)
            .map_or_else(|| PathBuf::from(defaults::DOWNLOAD_DIR), PathBuf::from),
        fetch,
        logging: logging_settings(lookup)?,
    })
}

fn telegram_api_url(lookup: Lookup<'_>) -> ConfigResult<String> {
    optional(lookup, ENV_TELEGRAM_API_URL).map_or_else(
        || Ok(defaults::TELEGRAM_API_URL.to_string()),
        |value| parse_http_url(ENV_TELEGRAM_API_URL, &value),
    )
}

fn logging_settings(lookup: Lookup<'_>) -> ConfigResult<LoggingSettings> {
    Ok(LoggingSettings {
        level: optional(lookup, ENV_LOG_LEVEL).unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
        style: optional(lookup, ENV_LOG_FORMAT)
            .map(|value| value.parse())
            .transpose()?,
    })
}

fn default_worker_bin() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(defaults::WORKER_BINARY)))
        .unwrap_or_else(|| PathBuf::from(defaults::WORKER_BINARY))
}
