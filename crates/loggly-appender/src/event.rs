// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log event data model.
//!
//! A [`LogEvent`] is what the host logging framework hands to the appender.
//! The core only reads it.

use chrono::{DateTime, FixedOffset, Local};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::object::{ObjectNode, ObjectValue};

/// Message carried by an event.
#[derive(Debug, Clone, Default)]
pub enum Message {
    /// Plain text. Text starting with `{` is tried as a JSON object.
    Text(String),
    /// The message was already rendered by the host (layout or format call).
    Rendered,
    /// A structured payload whose fields become event keys.
    Object(ObjectValue),
    #[default]
    None,
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<ObjectValue> for Message {
    fn from(object: ObjectValue) -> Self {
        Message::Object(object)
    }
}

impl From<Arc<ObjectNode>> for Message {
    fn from(node: Arc<ObjectNode>) -> Self {
        Message::Object(ObjectValue::Node(node))
    }
}

/// A value whose live form is unstable over time (e.g. derived from "now").
///
/// When the formatter finds one it prefers the fixed snapshot.
pub trait FixedValue: Send + Sync + Debug {
    /// Stable snapshot, if one has been taken.
    fn fixed(&self) -> Option<Value>;

    /// Current form of the value.
    fn live(&self) -> Value;
}

/// A context or event property.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Value(Value),
    Object(ObjectValue),
    Volatile(Arc<dyn FixedValue>),
}

impl PropertyValue {
    /// Value to serialize, `None` when it resolves to null.
    #[must_use]
    pub fn resolve(&self) -> Option<Value> {
        let value = match self {
            PropertyValue::Value(value) => value.clone(),
            PropertyValue::Object(object) => object.to_json(),
            PropertyValue::Volatile(volatile) => volatile
                .fixed()
                .filter(|fixed| !fixed.is_null())
                .unwrap_or_else(|| volatile.live()),
        };
        (!value.is_null()).then_some(value)
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        PropertyValue::Value(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Value(Value::from(value))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Value(Value::from(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Value(Value::from(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Value(Value::from(value))
    }
}

impl From<ObjectValue> for PropertyValue {
    fn from(object: ObjectValue) -> Self {
        PropertyValue::Object(object)
    }
}

impl From<Arc<ObjectNode>> for PropertyValue {
    fn from(node: Arc<ObjectNode>) -> Self {
        PropertyValue::Object(ObjectValue::Node(node))
    }
}

impl From<Arc<dyn FixedValue>> for PropertyValue {
    fn from(volatile: Arc<dyn FixedValue>) -> Self {
        PropertyValue::Volatile(volatile)
    }
}

pub type PropertyMap = HashMap<String, PropertyValue>;

/// An error and its chain of causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Fully qualified type name.
    pub error_type: String,
    pub message: String,
    pub stacktrace: Option<String>,
    pub cause: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
    #[must_use]
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorInfo {
            error_type: error_type.into(),
            message: message.into(),
            stacktrace: None,
            cause: None,
        }
    }

    #[must_use]
    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.stacktrace = Some(stacktrace.into());
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: ErrorInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Captures `err` and its `source()` chain.
    ///
    /// The outer type name comes from the type system. Causes are only
    /// available as trait objects, their names are taken from `Debug` output.
    #[must_use]
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(ErrorInfo::new(debug_type_name(cause), cause.to_string()));
            source = cause.source();
        }

        let mut info = ErrorInfo::new(std::any::type_name::<E>(), err.to_string());
        info.cause = causes
            .into_iter()
            .rev()
            .fold(None, |inner, mut cause| {
                cause.cause = inner.map(Box::new);
                Some(cause)
            })
            .map(Box::new);
        info
    }

    /// Number of errors in the chain, this one included.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.cause.as_ref().map_or(0, |cause| cause.depth())
    }
}

/// `ParseIntError { kind: Empty }` gives `ParseIntError`.
fn debug_type_name(value: &dyn Debug) -> String {
    let debug = format!("{value:?}");
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "std::error::Error".to_string()
    } else {
        name
    }
}

/// One application log event.
#[derive(Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub level: String,
    pub logger_name: String,
    pub thread_name: String,
    pub message: Message,
    pub error: Option<ErrorInfo>,
    pub properties: PropertyMap,
}

impl LogEvent {
    /// Event stamped with the local time and the current thread's name.
    #[must_use]
    pub fn new(level: impl Into<String>, logger_name: impl Into<String>, message: Message) -> Self {
        LogEvent {
            timestamp: Local::now().into(),
            level: level.into(),
            logger_name: logger_name.into(),
            thread_name: current_thread_name(),
            message,
            error: None,
            properties: PropertyMap::new(),
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl Debug for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEvent")
            .field("timestamp", &self.timestamp)
            .field("level", &self.level)
            .field("logger_name", &self.logger_name)
            .field("thread_name", &self.thread_name)
            .field("message", &self.message)
            .field("error", &self.error)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn current_thread_name() -> String {
    let thread = std::thread::current();
    thread
        .name()
        .map_or_else(|| format!("{:?}", thread.id()), str::to_string)
}
