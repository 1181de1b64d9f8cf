// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error as ThisError;

/// Errors raised while building the pipeline.
///
/// Once the appender is running no error is propagated to producers;
/// delivery and formatting problems go to the
/// [`ErrorReporter`](crate::error_reporter::ErrorReporter) instead.
#[derive(ThisError, Debug)]
pub enum Error {
    /// A configuration value is missing or out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The HTTP client could not be built (TLS backend, invalid header, ...).
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The sender thread or its runtime could not be started.
    #[error("failed to start sender thread: {0}")]
    SenderThread(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = Error::Config("buffer_size must be greater than zero".to_string());
        assert_eq!(
            error.to_string(),
            "invalid configuration: buffer_size must be greater than zero"
        );
    }

    #[test]
    fn test_sender_thread_error_from_io() {
        let error: Error = std::io::Error::new(std::io::ErrorKind::Other, "no threads").into();
        assert!(matches!(error, Error::SenderThread(_)));
        assert!(error.to_string().contains("no threads"));
    }
}
