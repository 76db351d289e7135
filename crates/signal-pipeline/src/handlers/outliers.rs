use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use signal_gateway::{Operation, OutlierRequest, OutlierTechnique};
use signal_types::{Result, Row, SignalTable};

use crate::handler::{ExecutionContext, ProcessingNode};
use crate::steps::TechniqueSummary;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutlierParams {
    pub technique: OutlierTechnique,
}

impl OutlierParams {
    pub fn new(technique: OutlierTechnique) -> Self {
        Self { technique }
    }
}

#[async_trait]
impl ProcessingNode for OutlierParams {
    fn operation(&self) -> Operation {
        Operation::Outliers
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn summary(&self) -> TechniqueSummary {
        TechniqueSummary::new(self.technique.as_str())
    }

    async fn execute(&self, input: &SignalTable, ctx: &ExecutionContext<'_>) -> Result<Vec<Row>> {
        ctx.gateway
            .remove_outliers(&OutlierRequest {
                signal: input.rows().to_vec(),
                technique: self.technique,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use signal_types::{Header, SignalType};

    use super::*;
    use crate::handlers::testing::EchoGateway;

    #[tokio::test]
    async fn sends_rows_without_header() {
        let gateway = EchoGateway::default();
        let ctx = ExecutionContext {
            node_id: "3",
            gateway: &gateway,
            signal_type: &SignalType::Eda,
        };
        let input = SignalTable::new(Header::new("t", "v"), vec![[0.0, 1.0], [1.0, 90.0]]);
        let rows = OutlierParams::new(OutlierTechnique::Iqr)
            .execute(&input, &ctx)
            .await
            .unwrap();

        assert_eq!(rows, input.rows());
        let sent = gateway.outliers.lock().unwrap().clone().unwrap();
        assert_eq!(sent.technique, OutlierTechnique::Iqr);
    }
}
