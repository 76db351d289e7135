use std::time::Instant;

use async_trait::async_trait;

use signal_types::{Result, Row, SignalError};

use crate::types::{error_message, parse_metrics, parse_rows, FormField};
use crate::{
    FilterRequest, GatewayConfig, MetricsReport, MetricsRequest, Operation, OutlierRequest,
    ProcessingGateway, ResampleRequest,
};

// ---------------------------------------------------------------------------
// HttpGateway
// ---------------------------------------------------------------------------

/// [`ProcessingGateway`] backed by the HTTP processing API. Every operation is a
/// `POST` with a multipart form body and a JSON response.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SignalError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn post_form(
        &self,
        operation: Operation,
        fields: Vec<FormField>,
    ) -> Result<serde_json::Value> {
        let url = self.config.endpoint(operation.path());
        let form = fields
            .into_iter()
            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                form.text(name, value)
            });

        tracing::debug!(operation = %operation, url = %url, "gateway request");
        let started = Instant::now();

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_transport(operation, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| self.map_transport(operation, e))?;

        tracing::debug!(
            operation = %operation,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "gateway response"
        );

        let json: Option<serde_json::Value> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = json
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| body.trim().to_string());
            return Err(SignalError::Gateway {
                operation: operation.as_str().into(),
                status: status.as_u16(),
                message,
            });
        }

        let json = json.ok_or_else(|| SignalError::MalformedResponse {
            operation: operation.as_str().into(),
            message: "response body is not JSON".into(),
        })?;

        if let Some(message) = error_message(&json) {
            return Err(SignalError::Gateway {
                operation: operation.as_str().into(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(json)
    }

    fn map_transport(&self, operation: Operation, err: reqwest::Error) -> SignalError {
        if err.is_timeout() {
            SignalError::RequestTimeout {
                operation: operation.as_str().into(),
                timeout_ms: self.config.timeout_ms,
            }
        } else {
            SignalError::Transport {
                operation: operation.as_str().into(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ProcessingGateway for HttpGateway {
    async fn resample(&self, request: &ResampleRequest) -> Result<Vec<Row>> {
        let body = self
            .post_form(Operation::Resampling, request.form_fields()?)
            .await?;
        parse_rows(Operation::Resampling, body)
    }

    async fn remove_outliers(&self, request: &OutlierRequest) -> Result<Vec<Row>> {
        let body = self
            .post_form(Operation::Outliers, request.form_fields()?)
            .await?;
        parse_rows(Operation::Outliers, body)
    }

    async fn filter(&self, request: &FilterRequest) -> Result<Vec<Row>> {
        let body = self
            .post_form(Operation::Filtering, request.form_fields()?)
            .await?;
        parse_rows(Operation::Filtering, body)
    }

    async fn compute_metrics(&self, request: &MetricsRequest) -> Result<MetricsReport> {
        let body = self
            .post_form(Operation::Metrics, request.form_fields()?)
            .await?;
        parse_metrics(body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_base_url_overrides_config() {
        let gateway = HttpGateway::new(GatewayConfig::default())
            .unwrap()
            .with_base_url("/api");
        assert_eq!(gateway.config().endpoint("/outliers"), "/api/outliers");
        assert_eq!(gateway.name(), "http");
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let gateway = HttpGateway::new(GatewayConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_ms: 2_000,
        })
        .unwrap();
        let err = gateway
            .remove_outliers(&OutlierRequest {
                signal: vec![[0.0, 1.0]],
                technique: crate::OutlierTechnique::Hampel,
            })
            .await
            .unwrap_err();
        assert!(err.is_node_local(), "unexpected error: {err:?}");
    }
}
