//! End-to-end tests for `HttpGateway` against an in-process fake backend.
//!
//! The fake decodes the multipart form exactly like the real API would and
//! records every request so tests can assert on the wire fields.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use signal_gateway::{
    FilterConfig, FilterMethod, FilterRequest, GatewayConfig, HttpGateway,
    InterpolationTechnique, MetricsRequest, OutlierRequest, OutlierTechnique, ProcessingGateway,
    ResampleRequest,
};
use signal_types::{SignalError, SignalType};

// ---------------------------------------------------------------------------
// Fake backend
// ---------------------------------------------------------------------------

type Recorded = Arc<Mutex<Vec<(String, HashMap<String, String>)>>>;

async fn read_form(mut multipart: Multipart) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await.unwrap();
        fields.insert(name, value);
    }
    fields
}

fn record(state: &Recorded, path: &str, fields: &HashMap<String, String>) {
    state
        .lock()
        .unwrap()
        .push((path.to_string(), fields.clone()));
}

async fn resampling(State(state): State<Recorded>, multipart: Multipart) -> Json<Value> {
    let fields = read_form(multipart).await;
    record(&state, "/resampling", &fields);
    let target: f64 = fields["target_sampling_rate"].parse().unwrap();
    let signal: Vec<[f64; 2]> = serde_json::from_str(&fields["signal"]).unwrap();
    let last = signal.last().map(|r| r[0]).unwrap_or(0.0);
    let samples = (last * target).floor() as usize + 1;
    let data: Vec<[f64; 2]> = (0..samples)
        .map(|i| [i as f64 / target, 1.0])
        .collect();
    Json(json!({ "data": data }))
}

async fn outliers(
    State(state): State<Recorded>,
    multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let fields = read_form(multipart).await;
    record(&state, "/outliers", &fields);
    let signal: Vec<[f64; 2]> = serde_json::from_str(&fields["signal"]).unwrap();
    if signal.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Signal is empty" })),
        );
    }
    (StatusCode::OK, Json(json!({ "data": signal })))
}

async fn filtering(State(state): State<Recorded>, multipart: Multipart) -> Json<Value> {
    let fields = read_form(multipart).await;
    record(&state, "/filtering", &fields);
    let signal: Value = serde_json::from_str(&fields["signal"]).unwrap();
    Json(json!({ "data": signal }))
}

async fn metrics(State(state): State<Recorded>, multipart: Multipart) -> Json<Value> {
    let fields = read_form(multipart).await;
    record(&state, "/metrics", &fields);
    if fields["signal_type"] == "EDA" {
        Json(json!({
            "Kleckner et al. (2017)": {"value": 0.93, "description": "automated EDA heuristics"}
        }))
    } else {
        // The real backend answers unsupported types with a 200 and an error body.
        Json(json!({ "error": "Signal type not supported" }))
    }
}

async fn spawn_backend() -> (HttpGateway, Recorded) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/resampling", post(resampling))
        .route("/outliers", post(outliers))
        .route("/filtering", post(filtering))
        .route("/metrics", post(metrics))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let gateway = HttpGateway::new(GatewayConfig {
        base_url: format!("http://{addr}"),
        timeout_ms: 5_000,
    })
    .unwrap();
    (gateway, recorded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resample_sends_form_fields_and_parses_rows() {
    let (gateway, recorded) = spawn_backend().await;

    let rows = gateway
        .resample(&ResampleRequest {
            signal: vec![[0.0, 1.1], [1.0, 1.5], [2.0, 2.2]],
            interpolation_technique: InterpolationTechnique::Spline,
            source_sampling_rate: 1.0,
            target_sampling_rate: 2.0,
        })
        .await
        .expect("resample should succeed");

    assert_eq!(rows.len(), 5);
    assert_eq!(rows[1], [0.5, 1.0]);

    let recorded = recorded.lock().unwrap();
    let (path, fields) = &recorded[0];
    assert_eq!(path, "/resampling");
    assert_eq!(fields["interpolation_technique"], "spline");
    assert_eq!(fields["source_sampling_rate"], "1");
    assert_eq!(fields["target_sampling_rate"], "2");
    assert_eq!(fields["signal"], "[[0.0,1.1],[1.0,1.5],[2.0,2.2]]");
}

#[tokio::test]
async fn outliers_round_trip() {
    let (gateway, _recorded) = spawn_backend().await;

    let rows = gateway
        .remove_outliers(&OutlierRequest {
            signal: vec![[0.0, 1.0], [1.0, 50.0]],
            technique: OutlierTechnique::Iqr,
        })
        .await
        .unwrap();

    assert_eq!(rows, vec![[0.0, 1.0], [1.0, 50.0]]);
}

#[tokio::test]
async fn filter_sends_config_json() {
    let (gateway, recorded) = spawn_backend().await;

    gateway
        .filter(&FilterRequest {
            signal: vec![[0.0, 1.0], [0.25, 2.0]],
            signal_type: SignalType::Eda,
            sampling_rate: 4,
            config: FilterConfig {
                method: FilterMethod::Butterworth,
                order: Some(2),
                lowcut: Some(0.05),
                highcut: None,
                window_size: None,
                python: String::new(),
            },
        })
        .await
        .unwrap();

    let recorded = recorded.lock().unwrap();
    let (_, fields) = &recorded[0];
    assert_eq!(fields["sampling_rate"], "4");
    assert_eq!(fields["signal_type"], "EDA");
    let config: Value = serde_json::from_str(&fields["filter_config"]).unwrap();
    assert_eq!(
        config,
        json!({"method": "butterworth", "order": 2, "lowcut": 0.05, "highcut": null, "python": ""})
    );
}

#[tokio::test]
async fn metrics_report_decoded() {
    let (gateway, _recorded) = spawn_backend().await;

    let report = gateway
        .compute_metrics(&MetricsRequest {
            signal: vec![[0.0, 1.0], [0.25, 1.1]],
            signal_type: SignalType::Eda,
            sampling_rate: 4,
        })
        .await
        .unwrap();

    let metric = &report["Kleckner et al. (2017)"];
    assert_eq!(metric.value, 0.93);
    assert_eq!(metric.description, "automated EDA heuristics");
}

#[tokio::test]
async fn non_success_status_carries_backend_message() {
    let (gateway, _recorded) = spawn_backend().await;

    let err = gateway
        .remove_outliers(&OutlierRequest {
            signal: Vec::new(),
            technique: OutlierTechnique::Hampel,
        })
        .await
        .unwrap_err();

    match err {
        SignalError::Gateway {
            operation,
            status,
            message,
        } => {
            assert_eq!(operation, "outliers");
            assert_eq!(status, 400);
            assert_eq!(message, "Signal is empty");
        }
        other => panic!("expected Gateway error, got {other:?}"),
    }
}

#[tokio::test]
async fn error_body_on_success_status_is_an_error() {
    let (gateway, _recorded) = spawn_backend().await;

    let err = gateway
        .compute_metrics(&MetricsRequest {
            signal: vec![[0.0, 1.0], [1.0, 1.0]],
            signal_type: SignalType::Other("ECG".into()),
            sampling_rate: 1,
        })
        .await
        .unwrap_err();

    match err {
        SignalError::Gateway {
            status, message, ..
        } => {
            assert_eq!(status, 200);
            assert_eq!(message, "Signal type not supported");
        }
        other => panic!("expected Gateway error, got {other:?}"),
    }
}
