use async_trait::async_trait;

use signal_types::{Result, Row};

use crate::{FilterRequest, MetricsRequest, MetricsReport, OutlierRequest, ResampleRequest};

// ---------------------------------------------------------------------------
// ProcessingGateway
// ---------------------------------------------------------------------------

/// Stateless, single-shot remote signal operations.
///
/// The three table-producing operations return data rows only; callers
/// re-attach their own header.
#[async_trait]
pub trait ProcessingGateway: Send + Sync {
    async fn resample(&self, request: &ResampleRequest) -> Result<Vec<Row>>;
    async fn remove_outliers(&self, request: &OutlierRequest) -> Result<Vec<Row>>;
    async fn filter(&self, request: &FilterRequest) -> Result<Vec<Row>>;
    async fn compute_metrics(&self, request: &MetricsRequest) -> Result<MetricsReport>;
    fn name(&self) -> &str;
}
