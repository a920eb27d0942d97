// SPDX-License-Identifier: AGPL-3.0

//! Leveled logging for the pipeline stages
//!
//! A [`Logger`] is created by the caller and handed to each stateful component.
//! Deduplication state lives inside the logger family, never in a global.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Warnings base URL
pub const WARNINGS_BASE_URL: &str = "https://github.com/soloptic/soloptic/wiki/warnings";

/// Error codes for warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CompilerWarning,
    NoReceipt,
    TraceUnavailable,
    InvalidTrace,
    SeedFailed,
    InvocationFailed,
    UnmappedBytecode,
    LibraryPlaceholder,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::CompilerWarning => "compiler-warning",
            ErrorCode::NoReceipt => "no-receipt",
            ErrorCode::TraceUnavailable => "trace-unavailable",
            ErrorCode::InvalidTrace => "invalid-trace",
            ErrorCode::SeedFailed => "seed-failed",
            ErrorCode::InvocationFailed => "invocation-failed",
            ErrorCode::UnmappedBytecode => "unmapped-bytecode",
            ErrorCode::LibraryPlaceholder => "library-placeholder",
        }
    }

    pub fn url(&self) -> String {
        format!("{}#{}", WARNINGS_BASE_URL, self.code())
    }
}

/// Handle for component-scoped logging.
///
/// Clones and children share the same dedupe set.
#[derive(Debug, Clone)]
pub struct Logger {
    component: &'static str,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("soloptic")
    }
}

impl Logger {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Logger for a sub-component, sharing dedupe state with its parent
    pub fn child(&self, component: &'static str) -> Self {
        Self {
            component,
            seen: Arc::clone(&self.seen),
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn debug(&self, text: &str) {
        tracing::debug!(component = self.component, "{}", text);
    }

    pub fn info(&self, text: &str) {
        tracing::info!(component = self.component, "{}", text);
    }

    pub fn warn(&self, text: &str) {
        tracing::warn!(component = self.component, "{}", text);
    }

    pub fn error(&self, text: &str) {
        tracing::error!(component = self.component, "{}", text);
    }

    /// Log a warning with an error code.
    ///
    /// Unless `allow_duplicate`, a message already seen by the logger family is
    /// dropped. Returns whether the warning was emitted.
    pub fn warn_code(&self, error_code: ErrorCode, msg: &str, allow_duplicate: bool) -> bool {
        let full_msg = format!("{}\n(see {})", msg, error_code.url());
        if !allow_duplicate && !self.mark_logged(&full_msg) {
            return false;
        }
        tracing::warn!(component = self.component, code = error_code.code(), "{}", full_msg);
        true
    }

    // true if the text was not seen before
    fn mark_logged(&self, text: &str) -> bool {
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(text.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(text.to_string()),
        }
    }
}

/// Default filter directive for a `-v` count
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global fmt subscriber. `RUST_LOG` overrides the verbosity level.
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing(verbosity: u8, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
