// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for the gas attribution pipeline
//!
//! Fatal errors abort a profiling run and surface to the caller with their full
//! diagnostic text. Recoverable errors are absorbed at the fuzz-iteration level.

use thiserror::Error;

/// Raised when a bytecode byte sequence cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Empty bytecode")]
    Empty,

    #[error("Odd-length hex bytecode ({0} characters)")]
    OddLength(usize),

    #[error("Invalid hex character {ch:?} at position {index}")]
    InvalidHex { ch: char, index: usize },
}

/// Raised when a position-map field is present but not parseable.
///
/// An absent (empty) field is never an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed source map field `{field}` in record {record}: {value:?}")]
pub struct MapFormatError {
    pub record: usize,
    pub field: &'static str,
    pub value: String,
}

impl MapFormatError {
    pub fn new(record: usize, field: &'static str, value: impl Into<String>) -> Self {
        Self {
            record,
            field,
            value: value.into(),
        }
    }
}

/// Raised when an execution trace lacks its step list or a step is malformed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid trace format: {0}")]
pub struct InvalidTraceError(pub String);

impl InvalidTraceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Raised by the compiler collaborator. Carries the compiler's diagnostics verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Compilation failed:\n{diagnostics}")]
pub struct CompilationError {
    pub diagnostics: String,
}

impl CompilationError {
    pub fn new(diagnostics: impl Into<String>) -> Self {
        Self {
            diagnostics: diagnostics.into(),
        }
    }
}

/// Umbrella error for every pipeline stage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolopticException {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    MapFormat(#[from] MapFormatError),

    #[error(transparent)]
    InvalidTrace(#[from] InvalidTraceError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error("No receipt for {function} within {timeout_ms}ms")]
    NoReceipt { function: String, timeout_ms: u64 },

    #[error("Transaction {tx_id} not yet mined")]
    TraceNotMined { tx_id: String },

    #[error("Trace unavailable for {tx_id}: {reason}")]
    TraceUnavailable { tx_id: String, reason: String },

    #[error("Deployment failed: {0}")]
    Deploy(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid contract report: {0}")]
    InvalidReport(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SolopticException {
    /// Whether the error must abort the whole run rather than a single iteration.
    pub fn is_fatal(&self) -> bool {
        match self {
            SolopticException::Decode(_)
            | SolopticException::MapFormat(_)
            | SolopticException::Compilation(_)
            | SolopticException::Deploy(_)
            | SolopticException::InvalidReport(_)
            | SolopticException::Unsupported(_)
            | SolopticException::Internal(_) => true,
            SolopticException::InvalidTrace(_)
            | SolopticException::NoReceipt { .. }
            | SolopticException::TraceNotMined { .. }
            | SolopticException::TraceUnavailable { .. }
            | SolopticException::Rpc(_) => false,
        }
    }

    /// Whether fetching a trace again could succeed.
    pub fn is_retryable_trace_failure(&self) -> bool {
        matches!(
            self,
            SolopticException::TraceNotMined { .. }
                | SolopticException::TraceUnavailable { .. }
                | SolopticException::Rpc(_)
        )
    }
}

/// Result type for pipeline operations
pub type SolopticResult<T> = Result<T, SolopticException>;
