//! Graph model: nodes, directed edges, and the seed Input/Output pair.

use serde::{Deserialize, Serialize};

use signal_types::{Result, SignalError};

use crate::node::NodeKind;
use crate::validation::check_connection;

/// Id of the permanent Input node.
pub const INPUT_NODE_ID: &str = "1";
/// Id of the permanent Output node.
pub const OUTPUT_NODE_ID: &str = "2";
/// Sentinel id the orchestrator invalidates to reset the whole chain; the
/// Input node relays it to its target.
pub const RESET_SENTINEL_ID: &str = "0";

const FIRST_DYNAMIC_ID: u64 = 3;
const NODE_SPACING: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub position: Position,
}

/// "Output of `source` feeds input of `target`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphModel {
    nodes: Vec<GraphNode>,
    edges: Vec<Edge>,
    next_id: u64,
}

pub fn is_seed(node_id: &str) -> bool {
    node_id == INPUT_NODE_ID || node_id == OUTPUT_NODE_ID
}

impl GraphModel {
    pub fn new() -> Self {
        Self {
            nodes: seed_nodes(),
            edges: Vec::new(),
            next_id: FIRST_DYNAMIC_ID,
        }
    }

    // -- Queries ------------------------------------------------------------

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Upstream node of `id`: the source of the first edge targeting it.
    pub fn source_of(&self, id: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| e.target == id)
            .map(|e| e.source.as_str())
    }

    /// Downstream node of `id`: the target of the first edge leaving it.
    pub fn target_of(&self, id: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|e| e.source == id)
            .map(|e| e.target.as_str())
    }

    pub fn processing_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.kind.is_processing()).count()
    }

    /// The id the next added node will receive.
    pub fn next_id(&self) -> String {
        self.next_id.to_string()
    }

    /// Node ids reached by following targets from `id` (exclusive), stopping
    /// at the first revisit.
    pub fn downstream_of(&self, id: &str) -> Vec<String> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = id;
        while let Some(next) = self.target_of(current) {
            if next == id || chain.iter().any(|c| c == next) {
                break;
            }
            chain.push(next.to_string());
            current = next;
        }
        chain
    }

    // -- Mutations ----------------------------------------------------------

    /// Add a processing node at a default position and return its id.
    pub fn add_node(&mut self, kind: NodeKind) -> Result<String> {
        if !kind.is_processing() {
            return Err(SignalError::Validation(format!(
                "{} nodes cannot be added; the graph has exactly one",
                kind.label()
            )));
        }
        let id = self.next_id.to_string();
        self.next_id += 1;
        let position = Position {
            x: NODE_SPACING * (self.nodes.len() as f64 - 1.0),
            y: 100.0,
        };
        self.nodes.push(GraphNode {
            id: id.clone(),
            kind,
            position,
        });
        Ok(id)
    }

    /// Remove a node and every edge touching it. Returns the removed edges.
    pub fn delete_node(&mut self, id: &str) -> Result<Vec<Edge>> {
        if is_seed(id) {
            return Err(SignalError::Validation(format!(
                "node '{id}' is permanent and cannot be deleted"
            )));
        }
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| SignalError::UnknownNode(id.to_string()))?;
        self.nodes.remove(index);

        let (removed, kept): (Vec<Edge>, Vec<Edge>) = self
            .edges
            .drain(..)
            .partition(|e| e.source == id || e.target == id);
        self.edges = kept;
        Ok(removed)
    }

    /// Connect `source -> target` after checking the connection rules.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<String> {
        check_connection(self, source, target)?;
        let id = format!("e{source}-{target}-{}", uuid::Uuid::new_v4().simple());
        self.edges.push(Edge {
            id: id.clone(),
            source: source.to_string(),
            target: target.to_string(),
        });
        Ok(id)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Result<Edge> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or_else(|| SignalError::Validation(format!("unknown edge '{edge_id}'")))?;
        Ok(self.edges.remove(index))
    }

    /// Replace a processing node's parameters. The kind itself cannot change.
    pub fn set_kind(&mut self, id: &str, kind: NodeKind) -> Result<()> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| SignalError::UnknownNode(id.to_string()))?;
        if !node.kind.is_processing() || !node.kind.same_kind(&kind) {
            return Err(SignalError::Validation(format!(
                "node '{id}' is a {} node and cannot be configured as {}",
                node.kind.label(),
                kind.label()
            )));
        }
        node.kind = kind;
        Ok(())
    }

    /// Back to the two seed nodes, no edges, id counter restarted.
    pub fn reset(&mut self) {
        self.nodes.retain(|n| is_seed(&n.id));
        if self.nodes.len() != 2 {
            self.nodes = seed_nodes();
        }
        self.edges.clear();
        self.next_id = FIRST_DYNAMIC_ID;
    }
}

impl Default for GraphModel {
    fn default() -> Self {
        Self::new()
    }
}

fn seed_nodes() -> Vec<GraphNode> {
    vec![
        GraphNode {
            id: INPUT_NODE_ID.into(),
            kind: NodeKind::Input,
            position: Position { x: 0.0, y: 100.0 },
        },
        GraphNode {
            id: OUTPUT_NODE_ID.into(),
            kind: NodeKind::Output,
            position: Position { x: 750.0, y: 100.0 },
        },
    ]
}
