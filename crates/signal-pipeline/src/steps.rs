//! Ordered summary of the pipeline as configured: one step per node reached
//! from Input.

use serde::{Deserialize, Serialize};

use crate::graph::{GraphModel, INPUT_NODE_ID};

/// A technique name plus the parameters worth showing next to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TechniqueSummary {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

impl TechniqueSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn maybe_field<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub node_id: String,
    pub label: String,
    pub technique: Option<TechniqueSummary>,
}

/// Walk from Input along declared targets, stopping at a revisit.
pub fn pipeline_steps(graph: &GraphModel) -> Vec<PipelineStep> {
    std::iter::once(INPUT_NODE_ID.to_string())
        .chain(graph.downstream_of(INPUT_NODE_ID))
        .filter_map(|id| graph.node(&id).cloned())
        .map(|node| PipelineStep {
            label: node.kind.label().to_string(),
            technique: node.kind.processor().map(|p| p.summary()),
            node_id: node.id,
        })
        .collect()
}
