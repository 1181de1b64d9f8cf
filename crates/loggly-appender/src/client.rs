// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of formatted batches to Loggly.
//!
//! # Endpoint
//!
//! ```text
//! {root_url}/{inputs|bulk}/{customer_token}/tag/{tag}[,{user_agent}]
//! ```
//!
//! Bulk mode posts the whole batch as one newline separated body. Single mode
//! posts every message on its own.
//!
//! # Failures
//!
//! - **403 Forbidden**: the customer token is invalid. This client stops
//!   sending for good and reports it once.
//! - **Any other status or transport error**: reported and retried with
//!   exponential backoff, up to `max_send_retries` additional attempts
//!   (negative retries forever). The batch is then discarded.
//!
//! # Stop
//!
//! Every send takes the buffer's stop token. Once it is cancelled an attempt
//! already on the wire completes, but no new attempt starts and a pending
//! backoff is cut short.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error as ThisError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{Config, SendMode};
use crate::error::Error;
use crate::error_reporter::ErrorReporter;
use crate::http::build_client;

const INITIAL_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 5_000;

/// Sends batches produced by the buffer.
///
/// Failures are never returned, they go to the [`ErrorReporter`]. No new
/// request may start once `stop` is cancelled.
#[async_trait]
pub trait LogClient: Send + Sync {
    async fn send(&self, batch: &[String], stop: &CancellationToken);
}

#[derive(Debug, ThisError)]
enum SendError {
    #[error("access denied ({0})")]
    Forbidden(StatusCode),
    #[error("unexpected response status {0}")]
    Status(StatusCode),
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

pub struct LogglyClient {
    client: reqwest::Client,
    url: String,
    send_mode: SendMode,
    max_send_retries: i32,
    reporter: Arc<dyn ErrorReporter>,
    token_valid: AtomicBool,
}

impl LogglyClient {
    pub fn new(config: &Config, reporter: Arc<dyn ErrorReporter>) -> Result<Self, Error> {
        let client = build_client(config)?;
        Ok(LogglyClient {
            client,
            url: endpoint_url(config),
            send_mode: config.send_mode,
            max_send_retries: config.max_send_retries,
            reporter,
            token_valid: AtomicBool::new(true),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `false` once Loggly has rejected the customer token.
    #[must_use]
    pub fn is_token_valid(&self) -> bool {
        self.token_valid.load(Ordering::Relaxed)
    }

    async fn send_with_retry(&self, body: String, stop: &CancellationToken) {
        let mut attempts: u32 = 0;

        loop {
            if !self.is_token_valid() || stop.is_cancelled() {
                return;
            }
            attempts += 1;
            let started = Instant::now();

            match self.post(body.clone()).await {
                Ok(()) => {
                    debug!(
                        "LOGGLY | Sent {} bytes in {} ms",
                        body.len(),
                        started.elapsed().as_millis()
                    );
                    return;
                }
                Err(SendError::Forbidden(status)) => {
                    debug!("LOGGLY | Loggly answered {status}, disabling client");
                    if self.token_valid.swap(false, Ordering::Relaxed) {
                        self.reporter.report(
                            "LogglyClient: Provided Loggly customer token is invalid. \
                             No logs will be sent to Loggly.",
                        );
                    }
                    return;
                }
                Err(e) => {
                    self.reporter
                        .report(&format!("LogglyClient: Failed to send logs to Loggly: {e}"));
                    if !may_retry(self.max_send_retries, attempts) {
                        self.reporter.report(&format!(
                            "LogglyClient: Maximal number of retries ({}) reached. \
                             Discarding current batch of logs and moving on to the next one.",
                            self.max_send_retries
                        ));
                        return;
                    }
                }
            }

            tokio::select! {
                () = stop.cancelled() => {
                    debug!("LOGGLY | Stopped after {attempts} attempts, discarding batch");
                    return;
                }
                () = tokio::time::sleep(backoff(attempts)) => {}
            }
        }
    }

    async fn post(&self, body: String) -> Result<(), SendError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(SendError::Forbidden(status));
        }
        if status.is_success() || status.is_redirection() {
            return Ok(());
        }
        Err(SendError::Status(status))
    }
}

#[async_trait]
impl LogClient for LogglyClient {
    async fn send(&self, batch: &[String], stop: &CancellationToken) {
        if batch.is_empty() || !self.is_token_valid() {
            return;
        }
        match self.send_mode {
            SendMode::Bulk => self.send_with_retry(batch.join("\n"), stop).await,
            SendMode::Single => {
                for message in batch {
                    if stop.is_cancelled() {
                        return;
                    }
                    self.send_with_retry(message.clone(), stop).await;
                }
            }
        }
    }
}

fn endpoint_url(config: &Config) -> String {
    let mut tag = config.tag.clone();
    if !config.user_agent.trim().is_empty() {
        tag.push(',');
        tag.push_str(&config.user_agent);
    }
    format!(
        "{}/{}/{}/tag/{}",
        config.root_url.trim_end_matches('/'),
        config.send_mode.path_segment(),
        config.customer_token,
        tag
    )
}

/// `attempts` counts the attempts made so far, the first one included.
fn may_retry(max_send_retries: i32, attempts: u32) -> bool {
    // Negative means no limit
    u32::try_from(max_send_retries).map_or(true, |max| attempts <= max)
}

fn backoff(attempts: u32) -> Duration {
    let factor = 2_u64.saturating_pow(attempts.saturating_sub(1));
    Duration::from_millis(INITIAL_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}
