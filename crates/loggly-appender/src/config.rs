// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Appender configuration.
//!
//! A [`Config`] is built once at startup and shared immutably as
//! `Arc<Config>` by the formatter, the buffer and the client. Values come
//! from three layers, later layers overriding earlier ones:
//!
//! 1. [`Config::default`]
//! 2. A serde document (any format; missing keys keep their defaults)
//! 3. `LOGGLY_*` environment variables via [`Config::from_env`]
//!
//! # Environment Variables
//!
//! | Variable                               | Field                          |
//! |----------------------------------------|--------------------------------|
//! | `LOGGLY_ROOT_URL`                      | `root_url`                     |
//! | `LOGGLY_CUSTOMER_TOKEN`                | `customer_token`               |
//! | `LOGGLY_INPUT_KEY` (legacy alias)      | `customer_token`               |
//! | `LOGGLY_TAG`                           | `tag`                          |
//! | `LOGGLY_USER_AGENT`                    | `user_agent`                   |
//! | `LOGGLY_SEND_MODE`                     | `send_mode` (`single`/`bulk`)  |
//! | `LOGGLY_BUFFER_SIZE`                   | `buffer_size`                  |
//! | `LOGGLY_MAX_LOG_QUEUE_SIZE`            | `max_log_queue_size`           |
//! | `LOGGLY_SEND_INTERVAL_MS`              | `send_interval`                |
//! | `LOGGLY_MAX_BULK_SIZE_BYTES`           | `max_bulk_size_bytes`          |
//! | `LOGGLY_MAX_EVENT_SIZE_BYTES`          | `max_event_size_bytes`         |
//! | `LOGGLY_NUMBER_OF_INNER_EXCEPTIONS`    | `number_of_inner_exceptions`   |
//! | `LOGGLY_TIMEOUT_IN_SECONDS`            | `timeout_in_seconds`           |
//! | `LOGGLY_MAX_SEND_RETRIES`              | `max_send_retries`             |
//! | `LOGGLY_FINAL_FLUSH_WAIT_TIME_MS`      | `final_flush_wait_time`        |
//! | `LOGGLY_GLOBAL_CONTEXT_KEYS`           | `global_context_keys`          |
//! | `LOGGLY_LOGICAL_THREAD_CONTEXT_KEYS`   | `logical_thread_context_keys`  |

use serde::{Deserialize, Deserializer};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_ROOT_URL: &str = "https://logs-01.loggly.com/";
pub const DEFAULT_USER_AGENT: &str = "loggly-rust-appender";
pub const DEFAULT_TAG: &str = "default";

/// Max 5MB per bulk. The real 5 * 1024 * 1024 is still rejected, stay a bit under.
pub const DEFAULT_MAX_BULK_SIZE_BYTES: usize = 5_242_000;

/// 1024 * 1024 is still too much for the HTTP endpoint.
pub const DEFAULT_MAX_EVENT_SIZE_BYTES: usize = 1_000_000;

/// Delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// One event per request, sent as soon as it is queued.
    Single,
    /// Events batched and joined with newlines.
    #[default]
    Bulk,
}

impl SendMode {
    /// URL path segment of the endpoint for this mode.
    #[must_use]
    pub fn path_segment(self) -> &'static str {
        match self {
            SendMode::Single => "inputs",
            SendMode::Bulk => "bulk",
        }
    }
}

impl FromStr for SendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "inputs" => Ok(SendMode::Single),
            "bulk" => Ok(SendMode::Bulk),
            other => Err(format!("unknown send mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Loggly endpoints.
    pub root_url: String,
    /// Customer token used in the request path.
    #[serde(alias = "input_key")]
    pub customer_token: String,
    /// Tag or comma separated tags.
    pub tag: String,
    /// Sent as the `User-Agent` header and appended to the tag list.
    pub user_agent: String,
    pub send_mode: SendMode,
    /// Number of queued messages that triggers a send in bulk mode.
    pub buffer_size: usize,
    /// Bound on queued messages, oldest evicted first. 0 means unbounded.
    pub max_log_queue_size: usize,
    /// How often a partial buffer is sent.
    #[serde(
        rename = "send_interval_ms",
        deserialize_with = "deserialize_duration_from_millis"
    )]
    pub send_interval: Duration,
    pub max_bulk_size_bytes: usize,
    pub max_event_size_bytes: usize,
    /// How many nested causes of an error are serialized.
    pub number_of_inner_exceptions: usize,
    pub timeout_in_seconds: u64,
    /// Additional attempts after a transient failure. Negative retries forever.
    pub max_send_retries: i32,
    /// How long closing the appender waits for queued messages to go out.
    #[serde(
        rename = "final_flush_wait_time_ms",
        deserialize_with = "deserialize_duration_from_millis"
    )]
    pub final_flush_wait_time: Duration,
    /// Keys of the global context included in every event.
    #[serde(deserialize_with = "deserialize_comma_separated_keys")]
    pub global_context_keys: Vec<String>,
    /// Keys of the logical context included in every event.
    #[serde(deserialize_with = "deserialize_comma_separated_keys")]
    pub logical_thread_context_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            root_url: DEFAULT_ROOT_URL.to_string(),
            customer_token: String::new(),
            tag: DEFAULT_TAG.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            send_mode: SendMode::Bulk,
            buffer_size: 500,
            max_log_queue_size: 0,
            send_interval: Duration::from_secs(5),
            max_bulk_size_bytes: DEFAULT_MAX_BULK_SIZE_BYTES,
            max_event_size_bytes: DEFAULT_MAX_EVENT_SIZE_BYTES,
            number_of_inner_exceptions: 4,
            timeout_in_seconds: 30,
            max_send_retries: 3,
            final_flush_wait_time: Duration::from_secs(3),
            global_context_keys: Vec::new(),
            logical_thread_context_keys: Vec::new(),
        }
    }
}

impl Config {
    /// Defaults overridden by any `LOGGLY_*` variables that are set.
    pub fn from_env() -> Result<Config, Error> {
        let mut config = Config::default();

        if let Ok(root_url) = env::var("LOGGLY_ROOT_URL") {
            config.root_url = root_url;
        }
        // The legacy name loses when both are set.
        if let Ok(token) = env::var("LOGGLY_INPUT_KEY") {
            config.customer_token = token;
        }
        if let Ok(token) = env::var("LOGGLY_CUSTOMER_TOKEN") {
            config.customer_token = token;
        }
        if let Ok(tag) = env::var("LOGGLY_TAG") {
            config.tag = tag;
        }
        if let Ok(user_agent) = env::var("LOGGLY_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(mode) = parse_env::<SendMode>("LOGGLY_SEND_MODE")? {
            config.send_mode = mode;
        }
        if let Some(size) = parse_env("LOGGLY_BUFFER_SIZE")? {
            config.buffer_size = size;
        }
        if let Some(size) = parse_env("LOGGLY_MAX_LOG_QUEUE_SIZE")? {
            config.max_log_queue_size = size;
        }
        if let Some(ms) = parse_env("LOGGLY_SEND_INTERVAL_MS")? {
            config.send_interval = Duration::from_millis(ms);
        }
        if let Some(size) = parse_env("LOGGLY_MAX_BULK_SIZE_BYTES")? {
            config.max_bulk_size_bytes = size;
        }
        if let Some(size) = parse_env("LOGGLY_MAX_EVENT_SIZE_BYTES")? {
            config.max_event_size_bytes = size;
        }
        if let Some(depth) = parse_env("LOGGLY_NUMBER_OF_INNER_EXCEPTIONS")? {
            config.number_of_inner_exceptions = depth;
        }
        if let Some(secs) = parse_env("LOGGLY_TIMEOUT_IN_SECONDS")? {
            config.timeout_in_seconds = secs;
        }
        if let Some(retries) = parse_env("LOGGLY_MAX_SEND_RETRIES")? {
            config.max_send_retries = retries;
        }
        if let Some(ms) = parse_env("LOGGLY_FINAL_FLUSH_WAIT_TIME_MS")? {
            config.final_flush_wait_time = Duration::from_millis(ms);
        }
        if let Ok(keys) = env::var("LOGGLY_GLOBAL_CONTEXT_KEYS") {
            config.global_context_keys = split_keys(&keys);
        }
        if let Ok(keys) = env::var("LOGGLY_LOGICAL_THREAD_CONTEXT_KEYS") {
            config.logical_thread_context_keys = split_keys(&keys);
        }

        Ok(config)
    }

    /// Checks values the pipeline cannot run without.
    pub fn validate(&self) -> Result<(), Error> {
        if self.root_url.trim().is_empty() {
            return Err(Error::Config("root_url must not be empty".to_string()));
        }
        if self.customer_token.trim().is_empty() {
            return Err(Error::Config(
                "customer_token must not be empty".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(Error::Config(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.max_bulk_size_bytes == 0 {
            return Err(Error::Config(
                "max_bulk_size_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of messages that make a full batch.
    ///
    /// Single mode never holds messages back.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        match self.send_mode {
            SendMode::Single => 1,
            SendMode::Bulk => self.buffer_size.max(1),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_in_seconds)
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Splits `"a, b,,c"` into `["a", "b", "c"]`.
#[must_use]
pub fn split_keys(keys: &str) -> Vec<String> {
    keys.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// Accepts either `"a,b"` or `["a", "b"]`.
fn deserialize_comma_separated_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keys {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Keys::deserialize(deserializer)? {
        Keys::Joined(keys) => split_keys(&keys),
        Keys::List(keys) => keys
            .into_iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        "LOGGLY_ROOT_URL",
        "LOGGLY_CUSTOMER_TOKEN",
        "LOGGLY_INPUT_KEY",
        "LOGGLY_TAG",
        "LOGGLY_USER_AGENT",
        "LOGGLY_SEND_MODE",
        "LOGGLY_BUFFER_SIZE",
        "LOGGLY_MAX_LOG_QUEUE_SIZE",
        "LOGGLY_SEND_INTERVAL_MS",
        "LOGGLY_MAX_BULK_SIZE_BYTES",
        "LOGGLY_MAX_EVENT_SIZE_BYTES",
        "LOGGLY_NUMBER_OF_INNER_EXCEPTIONS",
        "LOGGLY_TIMEOUT_IN_SECONDS",
        "LOGGLY_MAX_SEND_RETRIES",
        "LOGGLY_FINAL_FLUSH_WAIT_TIME_MS",
        "LOGGLY_GLOBAL_CONTEXT_KEYS",
        "LOGGLY_LOGICAL_THREAD_CONTEXT_KEYS",
    ];

    fn clear_env() {
        for var in ALL_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.timeout_in_seconds, 30);
        assert_eq!(config.max_send_retries, 3);
        assert_eq!(config.buffer_size, 500);
        assert_eq!(config.number_of_inner_exceptions, 4);
        assert_eq!(config.send_interval, Duration::from_secs(5));
        assert_eq!(config.max_log_queue_size, 0);
        assert_eq!(config.final_flush_wait_time, Duration::from_secs(3));
        assert_eq!(config.max_bulk_size_bytes, 5_242_000);
        assert_eq!(config.max_event_size_bytes, 1_000_000);
        assert_eq!(config.send_mode, SendMode::Bulk);
    }

    #[test]
    fn test_batch_size_depends_on_mode() {
        let mut config = Config {
            buffer_size: 100,
            ..Default::default()
        };
        assert_eq!(config.batch_size(), 100);
        config.send_mode = SendMode::Single;
        assert_eq!(config.batch_size(), 1);
    }

    #[test]
    fn test_send_mode_path_segment() {
        assert_eq!(SendMode::Single.path_segment(), "inputs");
        assert_eq!(SendMode::Bulk.path_segment(), "bulk");
    }

    #[test]
    fn test_send_mode_from_str() {
        assert_eq!("Single".parse::<SendMode>().unwrap(), SendMode::Single);
        assert_eq!(" bulk ".parse::<SendMode>().unwrap(), SendMode::Bulk);
        assert!("batch".parse::<SendMode>().is_err());
    }

    #[test]
    fn test_split_keys() {
        assert_eq!(split_keys("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_keys(" , ").is_empty());
    }

    #[test]
    fn test_deserialize_partial_document() {
        let config: Config = serde_json::from_str(
            r#"{
                "customer_token": "token",
                "send_mode": "single",
                "send_interval_ms": 250,
                "global_context_keys": "user, request",
                "logical_thread_context_keys": ["flow"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.customer_token, "token");
        assert_eq!(config.send_mode, SendMode::Single);
        assert_eq!(config.send_interval, Duration::from_millis(250));
        assert_eq!(config.global_context_keys, vec!["user", "request"]);
        assert_eq!(config.logical_thread_context_keys, vec!["flow"]);
        // untouched fields keep defaults
        assert_eq!(config.buffer_size, 500);
        assert_eq!(config.tag, DEFAULT_TAG);
    }

    #[test]
    fn test_deserialize_legacy_input_key() {
        let config: Config = serde_json::from_str(r#"{"input_key": "legacy"}"#).unwrap();
        assert_eq!(config.customer_token, "legacy");
    }

    #[test]
    fn test_validate() {
        let mut config = Config {
            customer_token: "token".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.buffer_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.buffer_size = 10;
        config.customer_token = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.customer_token = "token".to_string();
        config.root_url = String::new();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_when_unset() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("LOGGLY_ROOT_URL", "http://127.0.0.1:3333");
        env::set_var("LOGGLY_CUSTOMER_TOKEN", "customer-token");
        env::set_var("LOGGLY_SEND_MODE", "single");
        env::set_var("LOGGLY_BUFFER_SIZE", "42");
        env::set_var("LOGGLY_SEND_INTERVAL_MS", "1500");
        env::set_var("LOGGLY_MAX_SEND_RETRIES", "-1");
        env::set_var("LOGGLY_GLOBAL_CONTEXT_KEYS", "user,tenant");

        let config = Config::from_env().unwrap();
        clear_env();

        assert_eq!(config.root_url, "http://127.0.0.1:3333");
        assert_eq!(config.customer_token, "customer-token");
        assert_eq!(config.send_mode, SendMode::Single);
        assert_eq!(config.buffer_size, 42);
        assert_eq!(config.send_interval, Duration::from_millis(1500));
        assert_eq!(config.max_send_retries, -1);
        assert_eq!(config.global_context_keys, vec!["user", "tenant"]);
    }

    #[test]
    #[serial]
    fn test_from_env_customer_token_wins_over_input_key() {
        clear_env();
        env::set_var("LOGGLY_INPUT_KEY", "legacy");
        assert_eq!(Config::from_env().unwrap().customer_token, "legacy");

        env::set_var("LOGGLY_CUSTOMER_TOKEN", "current");
        assert_eq!(Config::from_env().unwrap().customer_token, "current");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_number() {
        clear_env();
        env::set_var("LOGGLY_BUFFER_SIZE", "lots");
        let result = Config::from_env();
        clear_env();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("LOGGLY_BUFFER_SIZE"));
    }
}
