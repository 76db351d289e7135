//! Shared types and errors for the signal pipeline.
//!
//! This crate provides the foundational types used across the other crates:
//! - `SignalError` — unified error taxonomy
//! - `SignalTable` — header-plus-rows time series flowing between nodes
//! - `ExecutionState` — per-node status of the last attempted operation
//! - `SignalType` — physiological signal family understood by the backend

use serde::{Deserialize, Serialize};

mod table;

pub use table::{ColumnSelection, Header, Row, SignalTable, TimestampColumn};

/// Unified error type for all pipeline subsystems.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    // === Gateway Errors ===
    #[error("Gateway operation '{operation}' returned HTTP {status}: {message}")]
    Gateway {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("Request to '{operation}' timed out after {timeout_ms}ms")]
    RequestTimeout { operation: String, timeout_ms: u64 },

    #[error("Transport error calling '{operation}': {message}")]
    Transport { operation: String, message: String },

    #[error("Malformed response from '{operation}': {message}")]
    MalformedResponse { operation: String, message: String },

    // === Data Errors ===
    #[error("Invalid signal table: {0}")]
    InvalidTable(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // === Graph Errors ===
    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    #[error("Cannot connect '{from}' -> '{to}': {reason}")]
    InvalidConnection {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Pipeline is busy: {0}")]
    Busy(String),

    #[error("Node '{node}' has no input table")]
    MissingInput { node: String },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl SignalError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SignalError::RequestTimeout { .. } | SignalError::Transport { .. } => true,
            SignalError::Gateway { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` for failures of a single remote operation. These are contained
    /// by the node that issued the request and never abort the whole pipeline.
    pub fn is_node_local(&self) -> bool {
        matches!(
            self,
            SignalError::Gateway { .. }
                | SignalError::RequestTimeout { .. }
                | SignalError::Transport { .. }
                | SignalError::MalformedResponse { .. }
        )
    }

    /// Maps the error to an HTTP status code.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SignalError::Gateway { status, .. } => Some(*status),
            SignalError::RequestTimeout { .. } => Some(504),
            SignalError::MalformedResponse { .. } => Some(502),
            SignalError::Validation(_)
            | SignalError::InvalidTable(_)
            | SignalError::InvalidConnection { .. } => Some(400),
            SignalError::UnknownNode(_) => Some(404),
            SignalError::Busy(_) => Some(409),
            _ => None,
        }
    }
}

/// A convenience alias for `Result<T, SignalError>`.
pub type Result<T> = std::result::Result<T, SignalError>;

// ---------------------------------------------------------------------------
// ExecutionState — status of a processing node
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Waiting,
    Running,
    Executed,
    Error,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Waiting => "waiting",
            ExecutionState::Running => "running",
            ExecutionState::Executed => "executed",
            ExecutionState::Error => "error",
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SignalType — signal family sent with filter and metrics requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignalType {
    #[default]
    #[serde(rename = "EDA")]
    Eda,
    #[serde(rename = "PPG")]
    Ppg,
    #[serde(untagged)]
    Other(String),
}

impl SignalType {
    /// The wire name expected by the backend form fields.
    pub fn as_str(&self) -> &str {
        match self {
            SignalType::Eda => "EDA",
            SignalType::Ppg => "PPG",
            SignalType::Other(name) => name,
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
