use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use signal_gateway::{InterpolationTechnique, Operation, ResampleRequest};
use signal_types::{Result, Row, SignalTable};

use crate::handler::{check_positive, inferred_rate, ExecutionContext, ProcessingNode};
use crate::steps::TechniqueSummary;

/// Resample the upstream signal to a new rate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResamplingParams {
    pub technique: InterpolationTechnique,
    /// `None` keeps the upstream rate inferred at execution time.
    #[serde(default)]
    pub target_sampling_rate: Option<f64>,
}

impl ResamplingParams {
    pub fn new(technique: InterpolationTechnique, target_sampling_rate: f64) -> Self {
        Self {
            technique,
            target_sampling_rate: Some(target_sampling_rate),
        }
    }
}

#[async_trait]
impl ProcessingNode for ResamplingParams {
    fn operation(&self) -> Operation {
        Operation::Resampling
    }

    fn validate(&self) -> Result<()> {
        check_positive("target sampling rate", self.target_sampling_rate)
    }

    fn summary(&self) -> TechniqueSummary {
        let rate = self
            .target_sampling_rate
            .map(|r| r.to_string())
            .unwrap_or_else(|| "inferred".into());
        TechniqueSummary::new(self.technique.as_str()).field("target_sampling_rate", rate)
    }

    async fn execute(&self, input: &SignalTable, ctx: &ExecutionContext<'_>) -> Result<Vec<Row>> {
        let source = inferred_rate(input, ctx.node_id)?;
        let request = ResampleRequest {
            signal: input.rows().to_vec(),
            interpolation_technique: self.technique,
            source_sampling_rate: source,
            target_sampling_rate: self.target_sampling_rate.unwrap_or(source),
        };
        ctx.gateway.resample(&request).await
    }
}

#[cfg(test)]
mod tests {
    use signal_types::{Header, SignalError, SignalType};

    use super::*;
    use crate::handlers::testing::EchoGateway;

    fn table(rows: Vec<Row>) -> SignalTable {
        SignalTable::new(Header::new("t", "v"), rows)
    }

    #[tokio::test]
    async fn target_defaults_to_inferred_rate() {
        let gateway = EchoGateway::default();
        let ctx = ExecutionContext {
            node_id: "3",
            gateway: &gateway,
            signal_type: &SignalType::Eda,
        };
        let params = ResamplingParams::default();
        params
            .execute(&table(vec![[0.0, 1.0], [0.5, 2.0], [1.0, 3.0]]), &ctx)
            .await
            .unwrap();

        let sent = gateway.resample.lock().unwrap().clone().unwrap();
        assert_eq!(sent.source_sampling_rate, 2.0);
        assert_eq!(sent.target_sampling_rate, 2.0);
        assert_eq!(sent.signal.len(), 3);
    }

    #[tokio::test]
    async fn single_row_is_refused_without_a_call() {
        let gateway = EchoGateway::default();
        let ctx = ExecutionContext {
            node_id: "3",
            gateway: &gateway,
            signal_type: &SignalType::Eda,
        };
        let err = ResamplingParams::new(InterpolationTechnique::Spline, 4.0)
            .execute(&table(vec![[0.0, 1.0]]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidTable(_)));
        assert_eq!(*gateway.calls.lock().unwrap(), 0);
    }

    #[test]
    fn rejects_non_positive_target() {
        let params = ResamplingParams::new(InterpolationTechnique::Interp1d, 0.0);
        assert!(matches!(params.validate(), Err(SignalError::Validation(_))));
        assert!(ResamplingParams::default().validate().is_ok());
    }

    #[test]
    fn summary_names_technique() {
        let summary = ResamplingParams::new(InterpolationTechnique::Interp1d, 8.0).summary();
        assert_eq!(summary.name, "1d");
        assert_eq!(
            summary.fields,
            vec![("target_sampling_rate".to_string(), "8".to_string())]
        );
    }
}
