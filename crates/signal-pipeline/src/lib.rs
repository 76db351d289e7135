//! Client-side signal pipeline.
//!
//! A pipeline is a chain of nodes: one Input holding the uploaded signal, any
//! number of processing nodes (resampling, outlier removal, filtering) that
//! each call the processing backend, and one Output mirroring the last table.
//! Nodes talk to each other only through the typed [`SignalBus`]: an
//! *invalidate* signal clears a node and cascades downstream, an *execute*
//! signal runs a node and, on success, forwards its table to the next one.

pub mod bus;
pub mod controller;
pub mod events;
pub mod export;
pub mod graph;
pub mod handler;
pub mod handlers;
pub mod node;
pub mod orchestrator;
pub mod steps;
pub mod store;
mod sync;
pub mod validation;

pub use bus::{Channel, Signal, SignalBus, SignalHandler, Subscription};
pub use controller::{LatestTable, NullSink, OutputView, TableSink, PREVIEW_ROWS};
pub use events::{EventEmitter, PipelineEvent};
pub use export::{export_file_name, export_table, write_export, ExportFormat, ExportOptions};
pub use graph::{
    Edge, GraphModel, GraphNode, Position, INPUT_NODE_ID, OUTPUT_NODE_ID, RESET_SENTINEL_ID,
};
pub use handler::{ExecutionContext, ProcessingNode};
pub use handlers::{savgol_window, FilterParams, OutlierParams, ResamplingParams};
pub use node::NodeKind;
pub use orchestrator::{Pipeline, PipelineConfig, RunReport, RunStatus};
pub use steps::{pipeline_steps, PipelineStep, TechniqueSummary};
pub use store::{NodeData, NodeStore, ObserverGuard, StoreObserver};
pub use validation::{check_connection, validate, ConnectionRule, Diagnostic, Severity};
