// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Loggly Appender
//!
//! Ships structured application log events to the Loggly HTTP (`inputs`) and
//! bulk (`bulk`) endpoints without blocking the logging thread.
//!
//! ## Pipeline
//!
//! ```text
//!   producer threads
//!         │  LogEvent + rendered message
//!         v
//!   ┌──────────────┐
//!   │  Formatter   │  (JSON document, size bounded)
//!   └──────┬───────┘
//!          │  String
//!          v
//!   ┌──────────────┐
//!   │ Async Buffer │  (FIFO queue, batching, flush)
//!   └──────┬───────┘
//!          │  Vec<String>      dedicated sender thread
//!          v
//!   ┌──────────────┐
//!   │    Client    │  (HTTP POST, retry, token check)
//!   └──────┬───────┘
//!          v
//!       Loggly
//! ```
//!
//! - [`formatter`]: renders a [`event::LogEvent`] into a compact JSON document
//! - [`buffer`]: decouples producers from network I/O and decides when to send
//! - [`client`]: delivers batches with retry and permanent-failure detection
//! - [`appender`]: wires the three together for a host logging framework
//!
//! Nothing in this pipeline returns errors to the producing caller. Failures
//! are routed to an [`error_reporter::ErrorReporter`].

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

/// Façade binding configuration, formatter, buffer and context scopes
pub mod appender;

/// Producer-facing queue and the background sender loop
pub mod buffer;

/// HTTP delivery to the Loggly endpoints
pub mod client;

/// Appender configuration with defaults, serde and environment loading
pub mod config;

/// Global, thread and logical context property scopes
pub mod context;

/// Construction-time error type
pub mod error;

/// Sink for runtime failures that never reach the caller
pub mod error_reporter;

/// Log event data model
pub mod event;

/// Event to JSON rendering
pub mod formatter;

/// Host name and process name detection
pub mod host;

/// HTTP client construction
pub mod http;

/// Structured payload graphs with cycle tolerant serialization
pub mod object;

pub use appender::LogglyAppender;
pub use buffer::{AsyncBuffer, LogglyAsyncBuffer};
pub use client::{LogClient, LogglyClient};
pub use config::{Config, SendMode};
pub use context::{ContextSnapshot, ContextSource, ScopedContext};
pub use error::Error;
pub use error_reporter::{ErrorReporter, TracingErrorReporter};
pub use event::{ErrorInfo, FixedValue, LogEvent, Message, PropertyMap, PropertyValue};
pub use formatter::{EventFormatter, LogglyFormatter};
pub use object::{ObjectNode, ObjectValue};
