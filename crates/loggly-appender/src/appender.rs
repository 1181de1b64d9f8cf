// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entry point for host logging frameworks.
//!
//! ```rust,ignore
//! use loggly_appender::{Config, LogEvent, LogglyAppender, Message};
//!
//! let appender = LogglyAppender::new(Config::from_env()?)?;
//! appender.append(&LogEvent::new("INFO", "orders", Message::Rendered), "order 42 shipped");
//! appender.close();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::buffer::{AsyncBuffer, LogglyAsyncBuffer};
use crate::client::{LogClient, LogglyClient};
use crate::config::Config;
use crate::context::{ContextSource, ScopedContext};
use crate::error::Error;
use crate::error_reporter::{ErrorReporter, TracingErrorReporter};
use crate::event::LogEvent;
use crate::formatter::{EventFormatter, LogglyFormatter};

pub struct LogglyAppender {
    config: Arc<Config>,
    formatter: Arc<dyn EventFormatter>,
    buffer: Arc<dyn AsyncBuffer>,
    context: Arc<dyn ContextSource>,
    closed: AtomicBool,
}

impl LogglyAppender {
    /// Validates `config` and starts the pipeline, reporting through `tracing`.
    pub fn new(config: Config) -> Result<Self, Error> {
        LogglyAppender::with_reporter(config, Arc::new(TracingErrorReporter))
    }

    pub fn with_reporter(config: Config, reporter: Arc<dyn ErrorReporter>) -> Result<Self, Error> {
        config.validate()?;
        let config = Arc::new(config);

        let client: Arc<dyn LogClient> = Arc::new(LogglyClient::new(&config, Arc::clone(&reporter))?);
        let buffer = Arc::new(LogglyAsyncBuffer::new(&config, client)?);
        let formatter = Arc::new(LogglyFormatter::new(Arc::clone(&config), reporter));
        debug!(
            "LOGGLY | Appender started in {:?} mode, batches of {}",
            config.send_mode,
            config.batch_size()
        );

        Ok(LogglyAppender::with_components(
            config,
            formatter,
            buffer,
            Arc::new(ScopedContext),
        ))
    }

    /// Assembles an appender from already built parts.
    #[must_use]
    pub fn with_components(
        config: Arc<Config>,
        formatter: Arc<dyn EventFormatter>,
        buffer: Arc<dyn AsyncBuffer>,
        context: Arc<dyn ContextSource>,
    ) -> Self {
        LogglyAppender {
            config,
            formatter,
            buffer,
            context,
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Formats `event` on the calling thread and queues it.
    ///
    /// Context is read here so thread and task scoped properties belong to
    /// the producer. Events appended after [`LogglyAppender::close`] are ignored.
    pub fn append(&self, event: &LogEvent, rendered: &str) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let context = self.context.snapshot(&self.config);
        if let Some(message) = self.formatter.format(event, rendered, &context) {
            self.buffer.buffer_for_send(message);
        }
    }

    pub fn flush(&self, timeout: Duration) -> bool {
        self.buffer.flush(timeout)
    }

    /// Flushes for at most `final_flush_wait_time`, then stops the sender.
    ///
    /// Only the first call has an effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.buffer.flush(self.config.final_flush_wait_time) {
            warn!(
                "LOGGLY | Not all logs were sent within {} ms, remaining logs are dropped",
                self.config.final_flush_wait_time.as_millis()
            );
        }
        self.buffer.dispose();
    }
}

impl Drop for LogglyAppender {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextSnapshot, NoContext};
    use crate::event::{Message, PropertyValue};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct MockBuffer {
        messages: Mutex<Vec<String>>,
        flushes: Mutex<Vec<Duration>>,
        disposed: AtomicUsize,
        flush_result: bool,
    }

    impl AsyncBuffer for MockBuffer {
        fn buffer_for_send(&self, message: String) {
            self.messages.lock().expect("lock").push(message);
        }

        fn flush(&self, max_wait: Duration) -> bool {
            self.flushes.lock().expect("lock").push(max_wait);
            self.flush_result
        }

        fn dispose(&self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Echoes the rendered message and the number of context entries, drops "skip".
    struct EchoFormatter;

    impl EventFormatter for EchoFormatter {
        fn format(&self, _event: &LogEvent, rendered: &str, context: &ContextSnapshot) -> Option<String> {
            (rendered != "skip").then(|| format!("{rendered}:{}", context.thread.len()))
        }
    }

    struct OneThreadProperty;

    impl ContextSource for OneThreadProperty {
        fn snapshot(&self, _config: &Config) -> ContextSnapshot {
            ContextSnapshot {
                thread: vec![("user".to_string(), PropertyValue::from("u-1"))],
                ..Default::default()
            }
        }
    }

    fn appender(buffer: &Arc<MockBuffer>, context: Arc<dyn ContextSource>) -> LogglyAppender {
        LogglyAppender::with_components(
            Arc::new(Config {
                final_flush_wait_time: Duration::from_millis(1500),
                ..Default::default()
            }),
            Arc::new(EchoFormatter),
            Arc::clone(buffer) as Arc<dyn AsyncBuffer>,
            context,
        )
    }

    fn event() -> LogEvent {
        LogEvent::new("INFO", "test", Message::Rendered)
    }

    #[test]
    fn test_append_formats_with_context_and_queues() {
        let buffer = Arc::new(MockBuffer::default());
        let appender = appender(&buffer, Arc::new(OneThreadProperty));

        appender.append(&event(), "first");
        appender.append(&event(), "skip");
        appender.append(&event(), "second");

        assert_eq!(*buffer.messages.lock().expect("lock"), vec!["first:1", "second:1"]);
    }

    #[test]
    fn test_close_flushes_then_disposes_once() {
        let buffer = Arc::new(MockBuffer {
            flush_result: true,
            ..Default::default()
        });
        let appender = appender(&buffer, Arc::new(NoContext));

        appender.close();
        appender.close();
        appender.append(&event(), "after close");
        drop(appender);

        assert_eq!(*buffer.flushes.lock().expect("lock"), vec![Duration::from_millis(1500)]);
        assert_eq!(buffer.disposed.load(Ordering::SeqCst), 1);
        assert!(buffer.messages.lock().expect("lock").is_empty());
    }

    #[test]
    #[traced_test]
    fn test_close_warns_when_flush_times_out() {
        let buffer = Arc::new(MockBuffer::default());
        let appender = appender(&buffer, Arc::new(NoContext));

        appender.close();

        assert!(logs_contain("Not all logs were sent within 1500 ms"));
        assert_eq!(buffer.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes() {
        let buffer = Arc::new(MockBuffer {
            flush_result: true,
            ..Default::default()
        });
        drop(appender(&buffer, Arc::new(NoContext)));
        assert_eq!(buffer.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = LogglyAppender::new(Config::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
