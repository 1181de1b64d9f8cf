// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Event to JSON rendering.
//!
//! Every event becomes one compact JSON document:
//!
//! ```text
//! {"timestamp":"2024-05-01T10:00:00.000+02:00","level":"INFO","hostName":"web-1",
//!  "process":"api","threadName":"main","loggerName":"orders","message":"hello",
//!  "exception":{...},"user":"u-1"}
//! ```
//!
//! # Message Resolution
//!
//! - Text whose first non-whitespace character is `{` is parsed and merged
//!   into the document. Nested objects merge recursively and arrays are
//!   unioned. Anything that fails to parse is sent as a plain message.
//! - A structured payload contributes its fields directly, no `message` key.
//! - Otherwise `message` is the rendered text, or `"null"` when empty.
//!
//! # Size Limit
//!
//! Documents larger than `max_event_size_bytes` get their `message` cut from
//! the end. If that is not enough the event is dropped and reported.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::context::ContextSnapshot;
use crate::error_reporter::ErrorReporter;
use crate::event::{ErrorInfo, LogEvent, Message, PropertyValue};
use crate::host;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";
const EMPTY_MESSAGE: &str = "null";
const DROPPED_EVENT_PREVIEW_BYTES: usize = 500;

/// Turns a [`LogEvent`] into the document sent to Loggly.
pub trait EventFormatter: Send + Sync {
    /// Returns `None` when the event cannot fit within the size limit.
    fn format(&self, event: &LogEvent, rendered: &str, context: &ContextSnapshot) -> Option<String>;
}

pub struct LogglyFormatter {
    config: Arc<Config>,
    host_name: String,
    process_name: String,
    reporter: Arc<dyn ErrorReporter>,
}

impl LogglyFormatter {
    /// Formatter stamping events with the detected host and process names.
    #[must_use]
    pub fn new(config: Arc<Config>, reporter: Arc<dyn ErrorReporter>) -> Self {
        LogglyFormatter::with_host(config, reporter, host::hostname(), host::process_name())
    }

    #[must_use]
    pub fn with_host(
        config: Arc<Config>,
        reporter: Arc<dyn ErrorReporter>,
        host_name: impl Into<String>,
        process_name: impl Into<String>,
    ) -> Self {
        LogglyFormatter {
            config,
            host_name: host_name.into(),
            process_name: process_name.into(),
            reporter,
        }
    }

    fn base(&self, event: &LogEvent) -> Map<String, Value> {
        let mut document = Map::new();
        document.insert(
            "timestamp".to_string(),
            Value::from(event.timestamp.format(TIMESTAMP_FORMAT).to_string()),
        );
        document.insert("level".to_string(), Value::from(event.level.as_str()));
        document.insert("hostName".to_string(), Value::from(self.host_name.as_str()));
        document.insert("process".to_string(), Value::from(self.process_name.as_str()));
        document.insert("threadName".to_string(), Value::from(event.thread_name.as_str()));
        document.insert("loggerName".to_string(), Value::from(event.logger_name.as_str()));
        document
    }

    fn add_context(&self, document: &mut Map<String, Value>, event: &LogEvent, context: &ContextSnapshot) {
        let global = context
            .global
            .iter()
            .filter(|(key, _)| self.config.global_context_keys.contains(key));
        let logical = context
            .logical
            .iter()
            .filter(|(key, _)| self.config.logical_thread_context_keys.contains(key));

        let mut properties: Vec<_> = event.properties.iter().collect();
        properties.sort_by(|a, b| a.0.cmp(b.0));

        let entries = global
            .chain(context.thread.iter())
            .chain(logical)
            .map(|(key, value)| (key, value))
            .chain(properties);

        for (key, value) in entries {
            if let Some(value) = PropertyValue::resolve(value) {
                document.insert(key.clone(), value);
            }
        }
    }

    fn enforce_size(&self, mut document: Map<String, Value>) -> Option<String> {
        let max = self.config.max_event_size_bytes;
        let serialized = serialize(&document)?;
        if serialized.len() <= max {
            return Some(serialized);
        }

        if let Some(Value::String(message)) = document.get_mut("message") {
            let excess = serialized.len() - max;
            let mut cut = message.len().saturating_sub(excess);
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
            let truncated = serialize(&document)?;
            if truncated.len() <= max {
                return Some(truncated);
            }
        }

        // report the event as it was before truncation
        self.reporter.report(&format!(
            "LogglyFormatter: Dropping log event exceeding allowed limit of {max} bytes. \
             First {DROPPED_EVENT_PREVIEW_BYTES} bytes of dropped event are: {}",
            prefix(&serialized, DROPPED_EVENT_PREVIEW_BYTES)
        ));
        None
    }
}

impl EventFormatter for LogglyFormatter {
    fn format(&self, event: &LogEvent, rendered: &str, context: &ContextSnapshot) -> Option<String> {
        let mut document = self.base(event);

        match &event.message {
            Message::Text(text) if can_be_json(text) => {
                match serde_json::from_str::<Value>(text) {
                    Ok(Value::Object(fields)) => merge_union(&mut document, fields),
                    Ok(_) => set_message(&mut document, rendered),
                    Err(e) => {
                        debug!("LOGGLY | Message looked like JSON but did not parse: {e}");
                        set_message(&mut document, rendered);
                    }
                }
            }
            Message::Object(object) => match object.to_json() {
                Value::Object(fields) => merge_union(&mut document, fields),
                _ => set_message(&mut document, rendered),
            },
            Message::Text(_) | Message::Rendered | Message::None => {
                set_message(&mut document, rendered);
            }
        }

        if let Some(error) = &event.error {
            document.insert(
                "exception".to_string(),
                exception_info(error, self.config.number_of_inner_exceptions),
            );
        }

        self.add_context(&mut document, event, context);
        self.enforce_size(document)
    }
}

fn serialize(document: &Map<String, Value>) -> Option<String> {
    match serde_json::to_string(document) {
        Ok(serialized) => Some(serialized),
        Err(e) => {
            debug!("LOGGLY | Failed to serialize event: {e}");
            None
        }
    }
}

fn can_be_json(text: &str) -> bool {
    text.trim_start().starts_with('{')
}

fn set_message(document: &mut Map<String, Value>, rendered: &str) {
    let message = if rendered.is_empty() {
        EMPTY_MESSAGE
    } else {
        rendered
    };
    document.insert("message".to_string(), Value::from(message));
}

/// Nests at most `depth` causes under `innerException`.
fn exception_info(error: &ErrorInfo, depth: usize) -> Value {
    let mut info = Map::new();
    info.insert("exceptionType".to_string(), Value::from(error.error_type.as_str()));
    info.insert("exceptionMessage".to_string(), Value::from(error.message.as_str()));
    info.insert(
        "stacktrace".to_string(),
        error.stacktrace.as_deref().map_or(Value::Null, Value::from),
    );
    if depth > 0 {
        if let Some(cause) = &error.cause {
            info.insert("innerException".to_string(), exception_info(cause, depth - 1));
        }
    }
    Value::Object(info)
}

/// Merges `source` into `target`.
///
/// Objects merge recursively, arrays keep existing items and append the
/// new ones, a null never replaces an existing value and everything else
/// overwrites.
fn merge_union(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        let Some(existing) = target.get_mut(&key) else {
            target.insert(key, value);
            continue;
        };
        match (existing, value) {
            (_, Value::Null) => {}
            (Value::Object(existing), Value::Object(incoming)) => {
                merge_union(existing, incoming);
            }
            (Value::Array(existing), Value::Array(incoming)) => {
                for item in incoming {
                    if !existing.contains(&item) {
                        existing.push(item);
                    }
                }
            }
            (existing, value) => *existing = value,
        }
    }
}

fn prefix(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
