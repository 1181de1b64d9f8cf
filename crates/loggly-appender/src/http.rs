// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction.
//!
//! One pooled client is built per [`crate::client::LogglyClient`] and reused
//! for every request:
//!
//! - **Timeouts**: connect and overall request timeout from `timeout_in_seconds`
//! - **Connection pooling**: idle timeout and TCP keep-alive
//! - **User-Agent**: the configured `user_agent`

use core::time::Duration;

use crate::config::Config;

/// Builds the pooled HTTP client used for every request to Loggly.
pub fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .user_agent(config.user_agent.as_str())
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        // Detect dead connections
        .tcp_keepalive(Some(Duration::from_secs(120)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_defaults() {
        assert!(build_client(&Config::default()).is_ok());
    }
}
