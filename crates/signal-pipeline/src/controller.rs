//! Per-node runtimes reacting to bus signals.
//!
//! - [`InputController`] turns "start execution" into the first execute signal
//!   and relays the reset sentinel into the chain.
//! - [`ProcessingController`] implements the invalidate/execute protocol for
//!   the three processing kinds.
//! - [`OutputMirror`] watches the store and mirrors the Output node's upstream
//!   table into a [`TableSink`].

use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use signal_gateway::ProcessingGateway;
use signal_types::{ExecutionState, Header, Result, Row, SignalError, SignalTable, SignalType};

use crate::bus::{Signal, SignalBus, SignalHandler};
use crate::events::{EventEmitter, PipelineEvent};
use crate::graph::{GraphModel, INPUT_NODE_ID};
use crate::handler::ExecutionContext;
use crate::node::NodeKind;
use crate::store::{NodeStore, StoreObserver};
use crate::sync::{lock, read};

/// Rows shown on node cards and in the Output preview.
pub const PREVIEW_ROWS: usize = 9;

// ---------------------------------------------------------------------------
// Shared handles
// ---------------------------------------------------------------------------

/// Handles every controller needs. Graph lookups return owned values so no
/// lock is held while a signal is delivered.
#[derive(Clone)]
pub(crate) struct Shared {
    pub graph: Arc<RwLock<GraphModel>>,
    pub store: NodeStore,
    pub bus: SignalBus,
    pub gateway: Arc<dyn ProcessingGateway>,
    pub events: EventEmitter,
    pub signal_type: SignalType,
}

impl Shared {
    pub fn source_of(&self, id: &str) -> Option<String> {
        read(&self.graph).source_of(id).map(str::to_string)
    }

    pub fn target_of(&self, id: &str) -> Option<String> {
        read(&self.graph).target_of(id).map(str::to_string)
    }

    pub fn kind_of(&self, id: &str) -> Option<NodeKind> {
        read(&self.graph).node(id).map(|n| n.kind.clone())
    }

    fn forward(&self, signal: Signal) {
        self.bus.publish(signal);
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

pub(crate) struct InputController {
    shared: Shared,
}

impl InputController {
    pub fn new(shared: Shared) -> Self {
        Self { shared }
    }
}

impl SignalHandler for InputController {
    fn handle(&self, signal: &Signal) {
        let Some(target) = self.shared.target_of(INPUT_NODE_ID) else {
            tracing::debug!("input has no target, signal ignored");
            return;
        };
        match signal {
            Signal::StartExecution => {
                let Some(table) = self.shared.store.table(INPUT_NODE_ID) else {
                    tracing::warn!("start requested but input has no table");
                    return;
                };
                tracing::debug!(target_id = %target, rows = table.len(), "input starting chain");
                self.shared.forward(Signal::Execute {
                    node_id: target,
                    table,
                });
            }
            Signal::Invalidate { .. } => {
                self.shared.forward(Signal::Invalidate { node_id: target });
            }
            Signal::Execute { .. } => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Processing nodes
// ---------------------------------------------------------------------------

pub(crate) struct ProcessingController {
    id: String,
    shared: Shared,
}

impl ProcessingController {
    pub fn new(id: impl Into<String>, shared: Shared) -> Self {
        Self {
            id: id.into(),
            shared,
        }
    }

    /// Clear the table, go back to waiting and cascade to the target.
    fn invalidate(&self) {
        let cleared = self.shared.store.advance(&self.id, |d| {
            d.table = None;
            d.execution_state = ExecutionState::Waiting;
        });
        if cleared.is_none() {
            return;
        }
        tracing::debug!(node_id = %self.id, "node invalidated");
        self.shared.events.emit(PipelineEvent::NodeInvalidated {
            node_id: self.id.clone(),
        });
        if let Some(target) = self.shared.target_of(&self.id) {
            self.shared.forward(Signal::Invalidate { node_id: target });
        }
    }

    fn execute(&self, input: SignalTable) {
        let Some(kind) = self.shared.kind_of(&self.id) else {
            return;
        };
        let Some(operation) = kind.processor().map(|p| p.operation()) else {
            return;
        };

        // Our output is about to change; invalidate what is ahead first.
        if let Some(target) = self.shared.target_of(&self.id) {
            self.shared.forward(Signal::Invalidate { node_id: target });
        }

        let Some((generation, prior)) = self.shared.store.advance(&self.id, |d| {
            d.execution_state = ExecutionState::Running;
            (d.generation, d.table.clone())
        }) else {
            return;
        };

        tracing::info!(
            node_id = %self.id,
            operation = %operation,
            rows = input.len(),
            generation,
            "issuing gateway request"
        );
        self.shared.events.emit(PipelineEvent::NodeStarted {
            node_id: self.id.clone(),
            operation: operation.as_str().to_string(),
            input_rows: input.len(),
        });

        let shared = self.shared.clone();
        let id = self.id.clone();
        self.shared.bus.spawn(async move {
            let started = Instant::now();
            let result = match kind.processor() {
                Some(processor) => {
                    let ctx = ExecutionContext {
                        node_id: &id,
                        gateway: shared.gateway.as_ref(),
                        signal_type: &shared.signal_type,
                    };
                    processor.execute(&input, &ctx).await
                }
                None => Err(SignalError::Other(format!("node '{id}' cannot execute"))),
            };
            let completion = Completion {
                shared: &shared,
                node_id: &id,
                generation,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            completion.apply(&input, prior, result);
        });
    }
}

impl SignalHandler for ProcessingController {
    fn handle(&self, signal: &Signal) {
        match signal {
            Signal::Invalidate { .. } => self.invalidate(),
            Signal::Execute { table, .. } => self.execute(table.clone()),
            Signal::StartExecution => {}
        }
    }
}

/// Commits a gateway response, unless a newer generation superseded it.
struct Completion<'a> {
    shared: &'a Shared,
    node_id: &'a str,
    generation: u64,
    elapsed_ms: u64,
}

impl Completion<'_> {
    fn apply(&self, input: &SignalTable, prior: Option<SignalTable>, result: Result<Vec<Row>>) {
        match result {
            Ok(rows) => {
                let table = input.with_rows(rows);
                let output_rows = table.len();
                let committed = self
                    .shared
                    .store
                    .update_if_generation(self.node_id, self.generation, |d| {
                        d.table = Some(table.clone());
                        d.execution_state = ExecutionState::Executed;
                    });
                if committed.is_none() {
                    return self.discard();
                }
                tracing::info!(
                    node_id = %self.node_id,
                    rows = output_rows,
                    elapsed_ms = self.elapsed_ms,
                    "node executed"
                );
                self.shared.events.emit(PipelineEvent::NodeExecuted {
                    node_id: self.node_id.to_string(),
                    output_rows,
                    duration_ms: self.elapsed_ms,
                });
                if let Some(target) = self.shared.target_of(self.node_id) {
                    self.shared.forward(Signal::Execute {
                        node_id: target,
                        table,
                    });
                }
            }
            Err(err) => {
                let committed = self
                    .shared
                    .store
                    .update_if_generation(self.node_id, self.generation, |d| {
                        d.table = prior;
                        d.execution_state = ExecutionState::Error;
                    });
                if committed.is_none() {
                    return self.discard();
                }
                tracing::warn!(node_id = %self.node_id, error = %err, "node execution failed");
                self.shared.events.emit(PipelineEvent::NodeFailed {
                    node_id: self.node_id.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    fn discard(&self) {
        tracing::debug!(
            node_id = %self.node_id,
            generation = self.generation,
            "stale response discarded"
        );
        self.shared.events.emit(PipelineEvent::StaleResponseDiscarded {
            node_id: self.node_id.to_string(),
            generation: self.generation,
        });
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Caller-supplied setter driving the chart and metrics panel.
pub trait TableSink: Send + Sync {
    /// `None` clears the display.
    fn show(&self, table: Option<&SignalTable>);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl TableSink for NullSink {
    fn show(&self, _table: Option<&SignalTable>) {}
}

/// Keeps the most recently shown table.
#[derive(Debug, Default)]
pub struct LatestTable(Mutex<Option<SignalTable>>);

impl LatestTable {
    pub fn get(&self) -> Option<SignalTable> {
        lock(&self.0).clone()
    }
}

impl TableSink for LatestTable {
    fn show(&self, table: Option<&SignalTable>) {
        *lock(&self.0) = table.cloned();
    }
}

/// What the Output node card displays.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputView {
    /// "Waiting for processed signal..."
    Placeholder,
    Table {
        header: Header,
        preview: Vec<[String; 2]>,
        total_rows: usize,
    },
}

impl OutputView {
    pub fn of(table: Option<&SignalTable>) -> Self {
        match table {
            None => OutputView::Placeholder,
            Some(t) => OutputView::Table {
                header: t.header().clone(),
                preview: t.preview(PREVIEW_ROWS),
                total_rows: t.len(),
            },
        }
    }
}

pub(crate) struct OutputMirror {
    id: String,
    shared: Shared,
    sink: Arc<dyn TableSink>,
    current: Mutex<Option<SignalTable>>,
}

impl OutputMirror {
    pub fn new(id: impl Into<String>, shared: Shared, sink: Arc<dyn TableSink>) -> Self {
        Self {
            id: id.into(),
            shared,
            sink,
            current: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<SignalTable> {
        lock(&self.current).clone()
    }

    /// Re-read the upstream table and push it to the sink if it changed.
    pub fn refresh(&self) {
        let table = self
            .shared
            .source_of(&self.id)
            .and_then(|source| self.shared.store.table(&source));
        {
            let mut current = lock(&self.current);
            if *current == table {
                return;
            }
            current.clone_from(&table);
        }
        self.sink.show(table.as_ref());
        self.shared.events.emit(PipelineEvent::OutputUpdated {
            node_id: self.id.clone(),
            rows: table.as_ref().map(SignalTable::len),
        });
    }
}

impl StoreObserver for OutputMirror {
    fn node_changed(&self, node_id: &str) {
        if self.shared.source_of(&self.id).as_deref() == Some(node_id) {
            self.refresh();
        }
    }
}
