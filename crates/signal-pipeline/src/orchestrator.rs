//! The graph-wide orchestrator: owns the graph, the node store and the signal
//! bus, mounts a controller for every node, and exposes the operator actions
//! (edit, run, clean) to the UI shell.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use signal_gateway::{MetricsReport, MetricsRequest, ProcessingGateway};
use signal_types::{ExecutionState, Result, SignalError, SignalTable, SignalType};

use crate::bus::{Channel, Signal, SignalBus, Subscription};
use crate::controller::{
    InputController, OutputMirror, OutputView, ProcessingController, Shared, TableSink,
};
use crate::events::{EventEmitter, PipelineEvent};
use crate::export::{export_table, write_export, ExportOptions};
use crate::graph::{is_seed, GraphModel, INPUT_NODE_ID, OUTPUT_NODE_ID, RESET_SENTINEL_ID};
use crate::node::NodeKind;
use crate::steps::{pipeline_steps, PipelineStep};
use crate::store::{NodeData, NodeStore, ObserverGuard};
use crate::sync::{read, write};
use crate::validation::{validate, Diagnostic};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Configuration for a pipeline session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sent with filter and metrics requests.
    pub signal_type: SignalType,
    /// Capacity of the observability broadcast channel.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            signal_type: SignalType::default(),
            event_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Started { run_id: String },
    /// Nothing to run: no processing nodes or no edges.
    Skipped { reason: String },
}

/// Outcome of [`Pipeline::run_to_completion`].
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Execution state of every processing node.
    pub states: BTreeMap<String, ExecutionState>,
    pub output: Option<SignalTable>,
}

impl RunReport {
    pub fn failed_nodes(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, s)| **s == ExecutionState::Error)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    shared: Shared,
    sink: Arc<dyn TableSink>,
    output: Arc<OutputMirror>,
    _output_observer: ObserverGuard,
    _input_subscriptions: Vec<Subscription>,
    mounted: HashMap<String, Vec<Subscription>>,
}

impl Pipeline {
    /// A fresh session: seed Input (holding `input`) and Output nodes, no edges.
    pub fn new(
        input: SignalTable,
        gateway: Arc<dyn ProcessingGateway>,
        sink: Arc<dyn TableSink>,
        config: PipelineConfig,
    ) -> Self {
        let shared = Shared {
            graph: Arc::new(RwLock::new(GraphModel::new())),
            store: NodeStore::new(),
            bus: SignalBus::new(),
            gateway,
            events: EventEmitter::new(config.event_capacity),
            signal_type: config.signal_type,
        };
        shared.store.insert(INPUT_NODE_ID, NodeData::with_table(input));
        shared.store.insert(OUTPUT_NODE_ID, NodeData::default());

        let input_controller = Arc::new(InputController::new(shared.clone()));
        let input_subscriptions = vec![
            shared
                .bus
                .subscribe(Channel::StartExecution, input_controller.clone()),
            shared.bus.subscribe(
                Channel::Invalidate(RESET_SENTINEL_ID.into()),
                input_controller,
            ),
        ];

        let output = Arc::new(OutputMirror::new(OUTPUT_NODE_ID, shared.clone(), sink.clone()));
        let output_observer = shared.store.observe(output.clone());

        tracing::info!(
            gateway = shared.gateway.name(),
            signal_type = %shared.signal_type,
            "pipeline created"
        );

        Self {
            shared,
            sink,
            output,
            _output_observer: output_observer,
            _input_subscriptions: input_subscriptions,
            mounted: HashMap::new(),
        }
    }

    // -- Read access --------------------------------------------------------

    /// A snapshot of the graph.
    pub fn graph(&self) -> GraphModel {
        read(&self.shared.graph).clone()
    }

    pub fn store(&self) -> &NodeStore {
        &self.shared.store
    }

    pub fn signal_type(&self) -> &SignalType {
        &self.shared.signal_type
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    pub fn node_table(&self, id: &str) -> Option<SignalTable> {
        self.shared.store.table(id)
    }

    pub fn execution_state(&self, id: &str) -> Option<ExecutionState> {
        self.shared.store.execution_state(id)
    }

    /// The table the Output node currently mirrors.
    pub fn output_table(&self) -> Option<SignalTable> {
        self.output.current()
    }

    pub fn output_view(&self) -> OutputView {
        OutputView::of(self.output_table().as_ref())
    }

    pub fn steps(&self) -> Vec<PipelineStep> {
        pipeline_steps(&read(&self.shared.graph))
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        validate(&read(&self.shared.graph))
    }

    /// True while any node is running or any gateway call is in flight.
    pub fn is_busy(&self) -> bool {
        self.shared.store.any_running() || self.shared.bus.in_flight() > 0
    }

    // -- Graph editing ------------------------------------------------------

    /// Add a processing node and mount its controller.
    pub fn add_node(&mut self, kind: NodeKind) -> Result<String> {
        if let Some(processor) = kind.processor() {
            processor.validate()?;
        }
        let id = write(&self.shared.graph).add_node(kind)?;
        self.shared.store.insert(id.clone(), NodeData::default());
        self.mount(&id);
        tracing::debug!(node_id = %id, "node added");
        self.graph_changed();
        Ok(id)
    }

    /// Remove a processing node, its edges and its data. The node it fed is
    /// invalidated.
    pub fn delete_node(&mut self, id: &str) -> Result<()> {
        let former_target = {
            let mut graph = write(&self.shared.graph);
            let target = graph.target_of(id).map(str::to_string);
            graph.delete_node(id)?;
            target
        };
        self.mounted.remove(id);
        self.shared.store.remove(id);
        tracing::debug!(node_id = %id, "node deleted");

        if let Some(target) = former_target {
            self.shared.bus.publish(Signal::Invalidate { node_id: target });
        }
        self.output.refresh();
        self.graph_changed();
        Ok(())
    }

    /// Connect `source -> target`; the target chain is invalidated.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<String> {
        let edge_id = write(&self.shared.graph).connect(source, target)?;
        tracing::debug!(source, target, edge_id = %edge_id, "nodes connected");
        self.shared.bus.publish(Signal::Invalidate {
            node_id: target.to_string(),
        });
        self.output.refresh();
        self.graph_changed();
        Ok(edge_id)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Result<()> {
        let edge = write(&self.shared.graph).disconnect(edge_id)?;
        tracing::debug!(source = %edge.source, target = %edge.target, "edge removed");
        self.shared.bus.publish(Signal::Invalidate {
            node_id: edge.target,
        });
        self.output.refresh();
        self.graph_changed();
        Ok(())
    }

    /// Change a processing node's parameters. Invalid parameters are rejected
    /// without touching any state; a real change invalidates the node and its
    /// downstream chain.
    pub fn configure(&self, id: &str, kind: NodeKind) -> Result<()> {
        if let Some(processor) = kind.processor() {
            processor.validate()?;
        }
        {
            let mut graph = write(&self.shared.graph);
            if graph.node(id).map(|n| &n.kind) == Some(&kind) {
                return Ok(());
            }
            graph.set_kind(id, kind)?;
        }
        tracing::debug!(node_id = %id, "node reconfigured");
        self.shared.bus.publish(Signal::Invalidate {
            node_id: id.to_string(),
        });
        Ok(())
    }

    /// Replace the Input table. The whole chain is invalidated.
    pub fn set_input(&self, table: SignalTable) {
        self.shared
            .store
            .update(INPUT_NODE_ID, |d| d.table = Some(table));
        self.shared.bus.publish(Signal::Invalidate {
            node_id: RESET_SENTINEL_ID.into(),
        });
    }

    /// Back to the two seed nodes with no edges. Idempotent.
    pub fn clean(&mut self) {
        write(&self.shared.graph).reset();
        self.mounted.clear();
        self.shared.store.retain(is_seed);
        self.output.refresh();
        tracing::info!("pipeline cleaned");
        self.graph_changed();
    }

    // -- Execution ----------------------------------------------------------

    /// Invalidate the whole chain, then start it from Input. Returns as soon
    /// as the first request is issued; use [`settled`](Self::settled) to wait.
    pub fn run(&self) -> Result<RunStatus> {
        if self.is_busy() {
            tracing::warn!(
                in_flight = self.shared.bus.in_flight(),
                "run refused, pipeline busy"
            );
            return Err(SignalError::Busy(
                "a previous run is still in flight".into(),
            ));
        }

        let (processing, edges, nodes) = {
            let graph = read(&self.shared.graph);
            (
                graph.processing_node_count(),
                graph.edges().len(),
                graph.nodes().len(),
            )
        };
        if processing == 0 || edges == 0 {
            let reason = if processing == 0 {
                "no processing nodes"
            } else {
                "no connections"
            };
            tracing::info!(reason, "run skipped");
            self.shared.events.emit(PipelineEvent::RunSkipped {
                reason: reason.into(),
            });
            return Ok(RunStatus::Skipped {
                reason: reason.into(),
            });
        }

        if self.shared.store.table(INPUT_NODE_ID).is_none() {
            return Err(SignalError::MissingInput {
                node: INPUT_NODE_ID.into(),
            });
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(run_id = %run_id, nodes, edges, "pipeline run started");
        self.shared.events.emit(PipelineEvent::RunStarted {
            run_id: run_id.clone(),
            started_at: Utc::now(),
            node_count: nodes,
        });

        self.shared.bus.publish(Signal::Invalidate {
            node_id: RESET_SENTINEL_ID.into(),
        });
        self.shared.bus.publish(Signal::StartExecution);
        Ok(RunStatus::Started { run_id })
    }

    /// Wait until no gateway call is in flight.
    pub async fn settled(&self) {
        self.shared.bus.settled().await;
    }

    /// [`run`](Self::run) and wait for the wave to finish.
    pub async fn run_to_completion(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let status = self.run()?;
        self.settled().await;

        let graph = self.graph();
        let states = self
            .shared
            .store
            .states()
            .into_iter()
            .filter(|(id, _)| graph.node(id).is_some_and(|n| n.kind.is_processing()))
            .collect();
        Ok(RunReport {
            status,
            started_at,
            finished_at: Utc::now(),
            states,
            output: self.output_table(),
        })
    }

    /// Run a single processing node on its upstream table.
    pub fn execute_node(&self, id: &str) -> Result<()> {
        let (kind, source) = {
            let graph = read(&self.shared.graph);
            let node = graph
                .node(id)
                .ok_or_else(|| SignalError::UnknownNode(id.to_string()))?;
            (node.kind.clone(), graph.source_of(id).map(str::to_string))
        };
        if !kind.is_processing() {
            return Err(SignalError::Validation(format!(
                "{} node '{id}' cannot be executed",
                kind.label()
            )));
        }
        let table = source
            .and_then(|s| self.shared.store.table(&s))
            .ok_or_else(|| SignalError::MissingInput {
                node: id.to_string(),
            })?;
        self.shared.bus.publish(Signal::Execute {
            node_id: id.to_string(),
            table,
        });
        Ok(())
    }

    /// Push a node's own table to the view sink.
    pub fn view_node_output(&self, id: &str) -> Result<()> {
        if !read(&self.shared.graph).contains(id) {
            return Err(SignalError::UnknownNode(id.to_string()));
        }
        let table = self
            .shared
            .store
            .table(id)
            .ok_or_else(|| SignalError::MissingInput {
                node: id.to_string(),
            })?;
        self.sink.show(Some(&table));
        Ok(())
    }

    /// Compute the backend metrics for a node's current table.
    pub async fn compute_metrics(&self, id: &str) -> Result<MetricsReport> {
        let table = self
            .shared
            .store
            .table(id)
            .ok_or_else(|| SignalError::MissingInput {
                node: id.to_string(),
            })?;
        let rate = table.sampling_rate().ok_or_else(|| {
            SignalError::InvalidTable(format!(
                "node '{id}': cannot infer a sampling rate from {} row(s)",
                table.len()
            ))
        })?;
        let request = MetricsRequest {
            signal: table.rows().to_vec(),
            signal_type: self.shared.signal_type.clone(),
            sampling_rate: rate.round() as u32,
        };
        tracing::info!(node_id = %id, rows = table.len(), "computing metrics");
        self.shared.gateway.compute_metrics(&request).await
    }

    /// The Output node's table rendered for download.
    pub fn export_output(&self, options: &ExportOptions) -> Result<String> {
        let table = self.output_table().ok_or_else(|| SignalError::MissingInput {
            node: OUTPUT_NODE_ID.into(),
        })?;
        Ok(export_table(&table, options))
    }

    /// Write the Output node's table to `{dir}/{name}_signal.{ext}`.
    pub fn write_output(&self, dir: &Path, name: &str, options: &ExportOptions) -> Result<PathBuf> {
        let table = self.output_table().ok_or_else(|| SignalError::MissingInput {
            node: OUTPUT_NODE_ID.into(),
        })?;
        write_export(dir, name, &table, options)
    }

    // -- Internals ----------------------------------------------------------

    fn mount(&mut self, id: &str) {
        let controller = Arc::new(ProcessingController::new(id, self.shared.clone()));
        let subscriptions = vec![
            self.shared
                .bus
                .subscribe(Channel::Execute(id.to_string()), controller.clone()),
            self.shared
                .bus
                .subscribe(Channel::Invalidate(id.to_string()), controller),
        ];
        self.mounted.insert(id.to_string(), subscriptions);
    }

    fn graph_changed(&self) {
        let (nodes, edges) = {
            let graph = read(&self.shared.graph);
            (graph.nodes().len(), graph.edges().len())
        };
        self.shared
            .events
            .emit(PipelineEvent::GraphChanged { nodes, edges });
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("graph", &*read(&self.shared.graph))
            .field("mounted", &self.mounted.keys().collect::<Vec<_>>())
            .finish()
    }
}
