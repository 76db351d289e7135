//! Client contract for the remote signal-processing backend.
//!
//! Provides the `ProcessingGateway` trait, request/response value types for the
//! four operations (resample, remove outliers, filter, compute metrics), and
//! `HttpGateway`, which speaks multipart-form `POST`s to the HTTP API.

mod config;
mod gateway;
mod http;
mod types;

pub use config::*;
pub use gateway::*;
pub use http::HttpGateway;
pub use types::{
    FilterConfig, FilterMethod, FilterRequest, FormField, InterpolationTechnique, Metric,
    MetricsReport, MetricsRequest, Operation, OutlierRequest, OutlierTechnique, ResampleRequest,
    SignalResponse,
};
