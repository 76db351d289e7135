//! Processing node capability shared by the Resampling, Outliers and Filtering
//! kinds.

use async_trait::async_trait;

use signal_gateway::{Operation, ProcessingGateway};
use signal_types::{Result, Row, SignalError, SignalTable, SignalType};

use crate::steps::TechniqueSummary;

// ---------------------------------------------------------------------------
// ProcessingNode trait
// ---------------------------------------------------------------------------

/// Everything a processing kind needs while its request is in flight.
pub struct ExecutionContext<'a> {
    pub node_id: &'a str,
    pub gateway: &'a dyn ProcessingGateway,
    pub signal_type: &'a SignalType,
}

#[async_trait]
pub trait ProcessingNode: Send + Sync {
    /// The remote operation this kind issues.
    fn operation(&self) -> Operation;

    /// Synchronous parameter checks. Must not touch any state.
    fn validate(&self) -> Result<()>;

    /// Technique name and parameters as shown in the pipeline step list.
    fn summary(&self) -> TechniqueSummary;

    /// Send `input` (header stripped) to the gateway and return the response rows.
    async fn execute(&self, input: &SignalTable, ctx: &ExecutionContext<'_>) -> Result<Vec<Row>>;
}

/// Upstream sampling rate, or a local refusal when it cannot be inferred.
pub(crate) fn inferred_rate(input: &SignalTable, node_id: &str) -> Result<f64> {
    input.sampling_rate().ok_or_else(|| {
        SignalError::InvalidTable(format!(
            "node '{node_id}': cannot infer a sampling rate from {} row(s)",
            input.len()
        ))
    })
}

pub(crate) fn check_positive(name: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !(v > 0.0 && v.is_finite()) => Err(SignalError::Validation(format!(
            "{name} must be a positive number, got {v}"
        ))),
        _ => Ok(()),
    }
}
