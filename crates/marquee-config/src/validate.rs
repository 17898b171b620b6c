//! Parsing helpers for raw environment values.

use std::net::SocketAddr;

use crate::error::{ConfigError, ConfigResult};

/// Environment lookup used by the loaders.
pub(crate) type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn optional(lookup: Lookup<'_>, name: &'static str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn require(lookup: Lookup<'_>, name: &'static str) -> ConfigResult<String> {
    optional(lookup, name).ok_or(ConfigError::MissingEnv { name })
}

pub(crate) fn parse_chat_id(field: &'static str, value: &str) -> ConfigResult<i64> {
    value
        .parse::<i64>()
        .map_err(|_| ConfigError::invalid(field, "must be an integer chat id", value))
}

pub(crate) fn parse_bounded_usize(
    field: &'static str,
    value: &str,
    max: usize,
) -> ConfigResult<usize> {
    let parsed = value
        .parse::<usize>()
        .map_err(|_| ConfigError::invalid(field, "must be a positive integer", value))?;
    if parsed == 0 || parsed > max {
        return Err(ConfigError::invalid(field, "out of range", value));
    }
    Ok(parsed)
}

pub(crate) fn parse_socket_addr(field: &'static str, value: &str) -> ConfigResult<SocketAddr> {
    value
        .parse::<SocketAddr>()
        .map_err(|_| ConfigError::invalid(field, "must be a socket address", value))
}

pub(crate) fn parse_http_url(field: &'static str, value: &str) -> ConfigResult<String> {
    let lower = value.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(ConfigError::invalid(field, "must be an http(s) url", value));
    }
    Ok(value.trim_end_matches('/').to_string())
}

pub(crate) fn split_args(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}
