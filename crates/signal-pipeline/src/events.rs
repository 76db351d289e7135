//! Pipeline event system for observability.
//!
//! Emits [`PipelineEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! external observers (toast notifications, loggers, UI status icons) can follow
//! a run without coupling to the node controllers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events emitted while editing and running a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
        started_at: DateTime<Utc>,
        node_count: usize,
    },
    RunSkipped {
        reason: String,
    },
    NodeInvalidated {
        node_id: String,
    },
    NodeStarted {
        node_id: String,
        operation: String,
        input_rows: usize,
    },
    NodeExecuted {
        node_id: String,
        output_rows: usize,
        duration_ms: u64,
    },
    /// The user-facing failure notification.
    NodeFailed {
        node_id: String,
        error: String,
    },
    StaleResponseDiscarded {
        node_id: String,
        generation: u64,
    },
    OutputUpdated {
        node_id: String,
        rows: Option<usize>,
    },
    GraphChanged {
        nodes: usize,
        edges: usize,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<PipelineEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
