// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::error;

/// Fire-and-forget sink for pipeline failures.
///
/// Used for "token invalid", "send failed", "retries exhausted" and
/// "event dropped for size" notifications.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Reports through the `tracing` facade at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, message: &str) {
        error!("LOGGLY | {message}");
    }
}
