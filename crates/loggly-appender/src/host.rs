// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Host name and process name detection

use std::env;
use tracing::warn;

const UNKNOWN: &str = "unknown";

/// Get the host name reported in every event.
///
/// Resolution order:
/// 1. `LOGGLY_HOSTNAME` environment variable
/// 2. `HOSTNAME` (`COMPUTERNAME` on Windows) environment variable
/// 3. The system host name
/// 4. `"unknown"`
#[must_use]
pub fn hostname() -> String {
    for var in ["LOGGLY_HOSTNAME", HOSTNAME_VAR] {
        if let Ok(hostname) = env::var(var) {
            if !hostname.is_empty() {
                return hostname;
            }
        }
    }

    if let Some(hostname) = system_hostname() {
        return hostname;
    }

    warn!("LOGGLY | Could not determine hostname, using '{UNKNOWN}'");
    UNKNOWN.to_string()
}

#[cfg(windows)]
const HOSTNAME_VAR: &str = "COMPUTERNAME";
#[cfg(not(windows))]
const HOSTNAME_VAR: &str = "HOSTNAME";

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(hostname) => hostname
            .to_str()
            .filter(|hostname| !hostname.is_empty())
            .map(str::to_string),
        Err(e) => {
            warn!("LOGGLY | Failed to get system hostname: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    None
}

/// Name of the running executable without its extension.
#[must_use]
pub fn process_name() -> String {
    env::current_exe()
        .ok()
        .and_then(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}
