use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use signal_types::{Result, Row, SignalError, SignalType};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The four remote operations exposed by the processing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Resampling,
    Outliers,
    Filtering,
    Metrics,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Resampling => "resampling",
            Operation::Outliers => "outliers",
            Operation::Filtering => "filtering",
            Operation::Metrics => "metrics",
        }
    }

    /// Endpoint path relative to the gateway base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Operation::Resampling => "/resampling",
            Operation::Outliers => "/outliers",
            Operation::Filtering => "/filtering",
            Operation::Metrics => "/metrics",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Technique enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterpolationTechnique {
    #[default]
    #[serde(rename = "spline")]
    Spline,
    #[serde(rename = "1d")]
    Interp1d,
}

impl InterpolationTechnique {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationTechnique::Spline => "spline",
            InterpolationTechnique::Interp1d => "1d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierTechnique {
    #[default]
    Hampel,
    Iqr,
}

impl OutlierTechnique {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierTechnique::Hampel => "hampel",
            OutlierTechnique::Iqr => "iqr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMethod {
    #[default]
    Butterworth,
    Bessel,
    Fir,
    Savgol,
}

impl FilterMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMethod::Butterworth => "butterworth",
            FilterMethod::Bessel => "bessel",
            FilterMethod::Fir => "fir",
            FilterMethod::Savgol => "savgol",
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A multipart form field: `(name, value)`.
pub type FormField = (&'static str, String);

fn signal_field(signal: &[Row]) -> Result<FormField> {
    Ok(("signal", serde_json::to_string(signal)?))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleRequest {
    pub signal: Vec<Row>,
    pub interpolation_technique: InterpolationTechnique,
    pub source_sampling_rate: f64,
    pub target_sampling_rate: f64,
}

impl ResampleRequest {
    pub fn form_fields(&self) -> Result<Vec<FormField>> {
        Ok(vec![
            signal_field(&self.signal)?,
            (
                "interpolation_technique",
                self.interpolation_technique.as_str().to_string(),
            ),
            ("source_sampling_rate", self.source_sampling_rate.to_string()),
            ("target_sampling_rate", self.target_sampling_rate.to_string()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRequest {
    pub signal: Vec<Row>,
    pub technique: OutlierTechnique,
}

impl OutlierRequest {
    pub fn form_fields(&self) -> Result<Vec<FormField>> {
        Ok(vec![
            signal_field(&self.signal)?,
            ("outlier_technique", self.technique.as_str().to_string()),
        ])
    }
}

/// The `filter_config` JSON document. `python` is always present; an empty
/// string means the standard algorithm is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub method: FilterMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    pub lowcut: Option<f64>,
    pub highcut: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<u32>,
    #[serde(default)]
    pub python: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRequest {
    pub signal: Vec<Row>,
    pub signal_type: SignalType,
    pub sampling_rate: u32,
    pub config: FilterConfig,
}

impl FilterRequest {
    pub fn form_fields(&self) -> Result<Vec<FormField>> {
        Ok(vec![
            signal_field(&self.signal)?,
            ("signal_type", self.signal_type.as_str().to_string()),
            ("sampling_rate", self.sampling_rate.to_string()),
            ("filter_config", serde_json::to_string(&self.config)?),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRequest {
    pub signal: Vec<Row>,
    pub signal_type: SignalType,
    pub sampling_rate: u32,
}

impl MetricsRequest {
    pub fn form_fields(&self) -> Result<Vec<FormField>> {
        Ok(vec![
            signal_field(&self.signal)?,
            ("signal_type", self.signal_type.as_str().to_string()),
            ("sampling_rate", self.sampling_rate.to_string()),
        ])
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Success body of the three table-producing operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResponse {
    pub data: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub value: f64,
    pub description: String,
}

/// Metric name -> value and description.
pub type MetricsReport = BTreeMap<String, Metric>;

/// Interpret a decoded JSON body. A body carrying an `error` key is a failure
/// even on a 2xx status.
pub(crate) fn error_message(body: &serde_json::Value) -> Option<String> {
    body.get("error").map(|e| match e.as_str() {
        Some(s) => s.to_string(),
        None => e.to_string(),
    })
}

pub(crate) fn parse_rows(operation: Operation, body: serde_json::Value) -> Result<Vec<Row>> {
    serde_json::from_value::<SignalResponse>(body)
        .map(|r| r.data)
        .map_err(|e| SignalError::MalformedResponse {
            operation: operation.as_str().into(),
            message: e.to_string(),
        })
}

pub(crate) fn parse_metrics(body: serde_json::Value) -> Result<MetricsReport> {
    serde_json::from_value::<MetricsReport>(body).map_err(|e| SignalError::MalformedResponse {
        operation: Operation::Metrics.as_str().into(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Row> {
        vec![[0.0, 1.1], [1.0, 1.5]]
    }

    fn field<'a>(fields: &'a [FormField], name: &str) -> &'a str {
        fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or_else(|| panic!("missing field {name}"))
    }

    #[test]
    fn resample_form_fields() {
        let req = ResampleRequest {
            signal: rows(),
            interpolation_technique: InterpolationTechnique::Interp1d,
            source_sampling_rate: 1.0,
            target_sampling_rate: 2.5,
        };
        let fields = req.form_fields().unwrap();
        assert_eq!(field(&fields, "signal"), "[[0.0,1.1],[1.0,1.5]]");
        assert_eq!(field(&fields, "interpolation_technique"), "1d");
        assert_eq!(field(&fields, "source_sampling_rate"), "1");
        assert_eq!(field(&fields, "target_sampling_rate"), "2.5");
    }

    #[test]
    fn outlier_form_fields() {
        let req = OutlierRequest {
            signal: rows(),
            technique: OutlierTechnique::Iqr,
        };
        let fields = req.form_fields().unwrap();
        assert_eq!(field(&fields, "outlier_technique"), "iqr");
    }

    #[test]
    fn filter_config_always_carries_python_and_cutoffs() {
        let config = FilterConfig {
            method: FilterMethod::Bessel,
            order: None,
            lowcut: None,
            highcut: Some(5.0),
            window_size: None,
            python: String::new(),
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "method": "bessel",
                "lowcut": null,
                "highcut": 5.0,
                "python": ""
            })
        );
    }

    #[test]
    fn filter_form_fields() {
        let req = FilterRequest {
            signal: rows(),
            signal_type: SignalType::Ppg,
            sampling_rate: 64,
            config: FilterConfig {
                method: FilterMethod::Savgol,
                order: Some(2),
                lowcut: None,
                highcut: None,
                window_size: Some(21),
                python: String::new(),
            },
        };
        let fields = req.form_fields().unwrap();
        assert_eq!(field(&fields, "signal_type"), "PPG");
        assert_eq!(field(&fields, "sampling_rate"), "64");
        let config: serde_json::Value =
            serde_json::from_str(field(&fields, "filter_config")).unwrap();
        assert_eq!(config["method"], "savgol");
        assert_eq!(config["window_size"], 21);
        assert_eq!(config["order"], 2);
    }

    #[test]
    fn interpolation_technique_wire_names() {
        assert_eq!(
            serde_json::to_string(&InterpolationTechnique::Interp1d).unwrap(),
            "\"1d\""
        );
        let t: InterpolationTechnique = serde_json::from_str("\"spline\"").unwrap();
        assert_eq!(t, InterpolationTechnique::Spline);
    }

    #[test]
    fn error_message_extracts_string() {
        let body = serde_json::json!({"error": "Signal type not supported"});
        assert_eq!(
            error_message(&body).as_deref(),
            Some("Signal type not supported")
        );
        assert!(error_message(&serde_json::json!({"data": []})).is_none());
    }

    #[test]
    fn parse_rows_rejects_missing_data() {
        let err = parse_rows(Operation::Outliers, serde_json::json!({"rows": []})).unwrap_err();
        assert!(matches!(err, SignalError::MalformedResponse { .. }));
    }

    #[test]
    fn parse_metrics_report() {
        let body = serde_json::json!({
            "Maki et al. (2020)": {"value": 0.42, "description": "peak height variability"}
        });
        let report = parse_metrics(body).unwrap();
        assert_eq!(report["Maki et al. (2020)"].value, 0.42);
    }

    #[test]
    fn operation_paths() {
        assert_eq!(Operation::Resampling.path(), "/resampling");
        assert_eq!(Operation::Metrics.to_string(), "metrics");
    }
}
