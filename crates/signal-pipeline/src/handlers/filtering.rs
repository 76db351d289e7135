use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use signal_gateway::{FilterConfig, FilterMethod, FilterRequest, Operation};
use signal_types::{Result, Row, SignalError, SignalTable};

use crate::handler::{check_positive, inferred_rate, ExecutionContext, ProcessingNode};
use crate::steps::TechniqueSummary;

/// Filter parameters. Which of the numeric fields a method uses is up to the
/// backend; unset fields are sent as absent (or `null` for the cutoffs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub method: FilterMethod,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub lowcut: Option<f64>,
    #[serde(default)]
    pub highcut: Option<f64>,
    /// Savitzky-Golay window. Derived from the upstream rate when unset.
    #[serde(default)]
    pub window_size: Option<u32>,
    /// User code run on the raw value array instead of the standard algorithm.
    #[serde(default)]
    pub custom_code: Option<String>,
}

impl FilterParams {
    /// Defaults for `method`: butterworth and savgol start at order 2.
    pub fn for_method(method: FilterMethod) -> Self {
        let order = match method {
            FilterMethod::Butterworth | FilterMethod::Savgol => Some(2),
            FilterMethod::Bessel | FilterMethod::Fir => None,
        };
        Self {
            method,
            order,
            lowcut: None,
            highcut: None,
            window_size: None,
            custom_code: None,
        }
    }

    pub fn with_cutoffs(mut self, lowcut: Option<f64>, highcut: Option<f64>) -> Self {
        self.lowcut = lowcut;
        self.highcut = highcut;
        self
    }

    pub fn with_custom_code(mut self, code: impl Into<String>) -> Self {
        self.custom_code = Some(code.into());
        self
    }

    /// The override code, if any non-blank code was supplied.
    pub fn custom(&self) -> Option<&str> {
        self.custom_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// The `filter_config` document for a signal sampled at `rate`.
    pub fn config(&self, rate: f64) -> FilterConfig {
        let window_size = match self.method {
            FilterMethod::Savgol => Some(self.window_size.unwrap_or_else(|| savgol_window(rate))),
            _ => self.window_size,
        };
        FilterConfig {
            method: self.method,
            order: self.order,
            lowcut: self.lowcut,
            highcut: self.highcut,
            window_size,
            python: self.custom().unwrap_or_default().to_string(),
        }
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self::for_method(FilterMethod::default())
    }
}

/// Savitzky-Golay window for a sampling rate: a third of a second of samples,
/// odd, at least 3.
pub fn savgol_window(rate: f64) -> u32 {
    let window = (rate / 3.0).round().max(0.0) as u32;
    let window = if window % 2 == 0 { window + 1 } else { window };
    window.max(3)
}

#[async_trait]
impl ProcessingNode for FilterParams {
    fn operation(&self) -> Operation {
        Operation::Filtering
    }

    fn validate(&self) -> Result<()> {
        check_positive("lowcut", self.lowcut)?;
        check_positive("highcut", self.highcut)?;
        if let (Some(low), Some(high)) = (self.lowcut, self.highcut) {
            if low >= high {
                return Err(SignalError::Validation(format!(
                    "lowcut ({low}) must be below highcut ({high})"
                )));
            }
        }
        if self.order == Some(0) {
            return Err(SignalError::Validation("filter order must be at least 1".into()));
        }
        if let Some(window) = self.window_size {
            if window < 3 || window % 2 == 0 {
                return Err(SignalError::Validation(format!(
                    "window size must be odd and at least 3, got {window}"
                )));
            }
        }
        Ok(())
    }

    fn summary(&self) -> TechniqueSummary {
        let summary = TechniqueSummary::new(self.method.as_str());
        if let Some(code) = self.custom() {
            return summary.field("python", code);
        }
        summary
            .maybe_field("order", self.order)
            .maybe_field("lowcut", self.lowcut)
            .maybe_field("highcut", self.highcut)
            .maybe_field("window_size", self.window_size)
    }

    async fn execute(&self, input: &SignalTable, ctx: &ExecutionContext<'_>) -> Result<Vec<Row>> {
        let rate = inferred_rate(input, ctx.node_id)?;
        let request = FilterRequest {
            signal: input.rows().to_vec(),
            signal_type: ctx.signal_type.clone(),
            sampling_rate: rate.round() as u32,
            config: self.config(rate),
        };
        ctx.gateway.filter(&request).await
    }
}

#[cfg(test)]
mod tests {
    use signal_types::{Header, SignalType};

    use super::*;
    use crate::handlers::testing::EchoGateway;

    #[test]
    fn savgol_window_is_odd() {
        assert_eq!(savgol_window(64.0), 21);
        assert_eq!(savgol_window(4.0), 3);
        assert_eq!(savgol_window(30.0), 11);
        assert_eq!(savgol_window(0.5), 3);
    }

    #[test]
    fn method_defaults() {
        assert_eq!(FilterParams::for_method(FilterMethod::Butterworth).order, Some(2));
        assert_eq!(FilterParams::for_method(FilterMethod::Bessel).order, None);
        assert_eq!(FilterParams::default().method, FilterMethod::Butterworth);
    }

    #[test]
    fn validation_rules() {
        let ok = FilterParams::for_method(FilterMethod::Butterworth)
            .with_cutoffs(Some(0.05), Some(5.0));
        assert!(ok.validate().is_ok());

        let inverted = ok.clone().with_cutoffs(Some(5.0), Some(0.05));
        assert!(inverted.validate().is_err());

        let negative = ok.clone().with_cutoffs(Some(-1.0), None);
        assert!(negative.validate().is_err());

        let mut zero_order = ok.clone();
        zero_order.order = Some(0);
        assert!(zero_order.validate().is_err());

        let mut even_window = FilterParams::for_method(FilterMethod::Savgol);
        even_window.window_size = Some(4);
        assert!(even_window.validate().is_err());
    }

    #[test]
    fn blank_custom_code_is_ignored() {
        let params = FilterParams::default().with_custom_code("   ");
        assert_eq!(params.custom(), None);
        assert_eq!(params.config(4.0).python, "");
    }

    #[test]
    fn summary_with_override_lists_only_python() {
        let params = FilterParams::for_method(FilterMethod::Fir)
            .with_cutoffs(Some(1.0), None)
            .with_custom_code("signal * 2");
        let summary = params.summary();
        assert_eq!(summary.name, "fir");
        assert_eq!(
            summary.fields,
            vec![("python".to_string(), "signal * 2".to_string())]
        );
    }

    #[tokio::test]
    async fn savgol_request_derives_window_and_rounds_rate() {
        let gateway = EchoGateway::default();
        let ctx = ExecutionContext {
            node_id: "5",
            gateway: &gateway,
            signal_type: &SignalType::Ppg,
        };
        // 64 Hz, 3 samples.
        let input = SignalTable::new(
            Header::new("t", "bvp"),
            vec![[0.0, 1.0], [0.015625, 1.1], [0.03125, 1.2]],
        );
        FilterParams::for_method(FilterMethod::Savgol)
            .execute(&input, &ctx)
            .await
            .unwrap();

        let sent = gateway.filter.lock().unwrap().clone().unwrap();
        assert_eq!(sent.sampling_rate, 64);
        assert_eq!(sent.signal_type, SignalType::Ppg);
        assert_eq!(sent.config.window_size, Some(21));
        assert_eq!(sent.config.order, Some(2));
        assert_eq!(sent.config.python, "");
    }
}
