// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer-facing queue and the background sender.
//!
//! Producers push formatted messages with
//! [`AsyncBuffer::buffer_for_send`] and never wait on the network. One
//! dedicated thread (`loggly-send`) owns dequeueing and delivery:
//!
//! ```text
//!   producers ──push──► ┌───────────────────┐
//!                       │ Mutex<VecDeque>   │ ◄──pop── sender thread ──► LogClient
//!   flush() ──wait────► │ Condvar (idle)    │ ◄──notify──┘
//!                       └───────────────────┘
//! ```
//!
//! # Wake Reasons
//!
//! The sender sleeps until one of these happens, in priority order:
//!
//! 1. **Stop**: [`AsyncBuffer::dispose`] was called. Terminal.
//! 2. **Threshold**: a producer saw a full batch pending.
//! 3. **Flush**: a caller is blocked in [`AsyncBuffer::flush`].
//! 4. **Interval**: `send_interval` elapsed, whatever is pending goes out.
//!
//! # Batches
//!
//! A batch is taken from the head of the queue and holds at most
//! `batch_size` messages and at most `max_bulk_size_bytes` bytes. A message
//! larger than `max_bulk_size_bytes` on its own can never be sent and is
//! dropped.
//!
//! # Eviction
//!
//! With `max_log_queue_size > 0` the oldest queued messages are dropped once
//! the queue grows past the bound. Messages already taken into a batch are
//! not affected. The threshold is checked before evicting, so a queue bounded
//! below `batch_size` still wakes the sender.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::LogClient;
use crate::config::Config;
use crate::error::Error;

const SENDER_THREAD_NAME: &str = "loggly-send";

/// Used when `send_interval` is too large to be added to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Non-blocking hand-off between producers and the network.
pub trait AsyncBuffer: Send + Sync {
    /// Queues a formatted message. Never blocks on I/O.
    fn buffer_for_send(&self, message: String);

    /// Blocks until nothing is queued and no send is in flight.
    ///
    /// Returns `false` if that was not observed within `max_wait`.
    fn flush(&self, max_wait: Duration) -> bool;

    /// Stops the sender. A send in flight finishes its current attempt and
    /// is not retried.
    fn dispose(&self);
}

#[derive(Debug, Default)]
struct Pending {
    messages: VecDeque<String>,
    send_in_progress: bool,
}

impl Pending {
    fn is_idle(&self) -> bool {
        self.messages.is_empty() && !self.send_in_progress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Stop,
    Threshold,
    Flush,
    Interval,
}

struct Shared {
    pending: Mutex<Pending>,
    idle: Condvar,
    flush_waiters: AtomicUsize,
    threshold: Notify,
    flush_requested: Notify,
    cancel: CancellationToken,
    batch_size: usize,
    max_bulk_size_bytes: usize,
    max_log_queue_size: usize,
    send_interval: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A wake reason that is already satisfied, so the sender must not sleep.
    fn ready_without_waiting(&self) -> Option<Wake> {
        let pending = self.lock();
        if pending.messages.len() >= self.batch_size {
            Some(Wake::Threshold)
        } else if !pending.messages.is_empty() && self.flush_waiters.load(Ordering::SeqCst) > 0 {
            Some(Wake::Flush)
        } else {
            None
        }
    }

    /// Queue length a threshold wake must still find. Eviction can leave at
    /// most `max_log_queue_size` messages behind a signal.
    fn wake_threshold(&self) -> usize {
        if self.max_log_queue_size > 0 {
            self.batch_size.min(self.max_log_queue_size)
        } else {
            self.batch_size
        }
    }

    fn take_batch(&self) -> Vec<String> {
        let mut pending = self.lock();
        let mut batch = Vec::new();
        let mut bytes = 0;

        while batch.len() < self.batch_size {
            let Some(next) = pending.messages.front() else {
                break;
            };
            if next.len() > self.max_bulk_size_bytes {
                if batch.is_empty() {
                    let dropped = pending.messages.pop_front().as_ref().map_or(0, String::len);
                    warn!(
                        "LOGGLY | Dropping message of {dropped} bytes, larger than max_bulk_size_bytes ({})",
                        self.max_bulk_size_bytes
                    );
                    continue;
                }
                break;
            }
            if bytes + next.len() > self.max_bulk_size_bytes {
                break;
            }
            bytes += next.len();
            if let Some(message) = pending.messages.pop_front() {
                batch.push(message);
            }
        }

        pending.send_in_progress = !batch.is_empty();
        batch
    }

    fn finish_send(&self) {
        self.lock().send_in_progress = false;
        self.idle.notify_all();
    }

    async fn send_batch(&self, client: &dyn LogClient) {
        let batch = self.take_batch();
        if !batch.is_empty() {
            debug!("LOGGLY | Sending batch of {} messages", batch.len());
            client.send(&batch, &self.cancel).await;
        }
        self.finish_send();
    }

    fn next_interval(&self) -> tokio::time::Instant {
        let now = tokio::time::Instant::now();
        now.checked_add(self.send_interval)
            .unwrap_or_else(|| now + FAR_FUTURE)
    }

    async fn run(self: Arc<Self>, client: Arc<dyn LogClient>) {
        debug!("LOGGLY | Sender started");
        let mut next_send = self.next_interval();

        loop {
            let wake = match self.ready_without_waiting() {
                Some(wake) => wake,
                None => tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => Wake::Stop,
                    () = self.threshold.notified() => Wake::Threshold,
                    () = self.flush_requested.notified() => Wake::Flush,
                    () = sleep_until(next_send) => Wake::Interval,
                },
            };

            if wake == Wake::Stop || self.cancel.is_cancelled() {
                break;
            }
            if wake == Wake::Threshold && self.lock().messages.len() < self.wake_threshold() {
                continue;
            }

            self.send_batch(client.as_ref()).await;
            next_send = self.next_interval();
        }

        debug!("LOGGLY | Sender stopped");
    }
}

/// [`AsyncBuffer`] backed by a dedicated sender thread.
pub struct LogglyAsyncBuffer {
    shared: Arc<Shared>,
}

impl LogglyAsyncBuffer {
    /// Starts the sender thread.
    pub fn new(config: &Config, client: Arc<dyn LogClient>) -> Result<Self, Error> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            idle: Condvar::new(),
            flush_waiters: AtomicUsize::new(0),
            threshold: Notify::new(),
            flush_requested: Notify::new(),
            cancel: CancellationToken::new(),
            batch_size: config.batch_size(),
            max_bulk_size_bytes: config.max_bulk_size_bytes,
            max_log_queue_size: config.max_log_queue_size,
            send_interval: config.send_interval,
        });

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let sender = Arc::clone(&shared);
        thread::Builder::new()
            .name(SENDER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(sender.run(client)))?;

        Ok(LogglyAsyncBuffer { shared })
    }

    /// Number of queued messages, not counting a batch in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.lock().messages.len()
    }
}

impl AsyncBuffer for LogglyAsyncBuffer {
    fn buffer_for_send(&self, message: String) {
        let shared = &self.shared;
        let reached_threshold = {
            let mut pending = shared.lock();
            pending.messages.push_back(message);
            let reached_threshold = pending.messages.len() >= shared.batch_size;
            if shared.max_log_queue_size > 0 {
                while pending.messages.len() > shared.max_log_queue_size {
                    pending.messages.pop_front();
                    debug!(
                        "LOGGLY | Queue over {} messages, evicted the oldest one",
                        shared.max_log_queue_size
                    );
                }
            }
            reached_threshold
        };

        if reached_threshold {
            shared.threshold.notify_one();
        }
    }

    fn flush(&self, max_wait: Duration) -> bool {
        let shared = &self.shared;
        let deadline = Instant::now().checked_add(max_wait);

        shared.flush_waiters.fetch_add(1, Ordering::SeqCst);
        shared.flush_requested.notify_one();

        let mut pending = shared.lock();
        let flushed = loop {
            if pending.is_idle() {
                break true;
            }
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break false;
                    }
                    pending = shared
                        .idle
                        .wait_timeout(pending, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
                None => {
                    pending = shared
                        .idle
                        .wait(pending)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        };
        drop(pending);

        shared.flush_waiters.fetch_sub(1, Ordering::SeqCst);
        flushed
    }

    fn dispose(&self) {
        self.shared.cancel.cancel();
    }
}

impl Drop for LogglyAsyncBuffer {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}
