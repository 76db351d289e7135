//! Graph validation: connection rules checked by `connect`, and advisory
//! diagnostics over the whole graph.
//!
//! The execution protocol only understands simple chains, so every rule here
//! exists to keep the graph one.

use std::collections::HashSet;

use signal_types::{Result, SignalError};

use crate::graph::{GraphModel, INPUT_NODE_ID, OUTPUT_NODE_ID};
use crate::node::NodeKind;

// ---------------------------------------------------------------------------
// Connection rules
// ---------------------------------------------------------------------------

pub trait ConnectionRule: Send + Sync {
    fn name(&self) -> &str;
    /// `Some(reason)` when `source -> target` must be rejected.
    fn check(&self, graph: &GraphModel, source: &str, target: &str) -> Option<String>;
}

struct NoSelfLoop;
impl ConnectionRule for NoSelfLoop {
    fn name(&self) -> &str { "no_self_loop" }
    fn check(&self, _graph: &GraphModel, source: &str, target: &str) -> Option<String> {
        (source == target).then(|| "a node cannot feed itself".into())
    }
}

struct Direction;
impl ConnectionRule for Direction {
    fn name(&self) -> &str { "direction" }
    fn check(&self, graph: &GraphModel, source: &str, target: &str) -> Option<String> {
        let source_kind = graph.node(source).map(|n| &n.kind);
        let target_kind = graph.node(target).map(|n| &n.kind);
        if matches!(source_kind, Some(NodeKind::Output)) {
            return Some("the Output node has no outgoing connection".into());
        }
        if matches!(target_kind, Some(NodeKind::Input)) {
            return Some("the Input node has no incoming connection".into());
        }
        None
    }
}

struct SingleUpstream;
impl ConnectionRule for SingleUpstream {
    fn name(&self) -> &str { "single_upstream" }
    fn check(&self, graph: &GraphModel, _source: &str, target: &str) -> Option<String> {
        graph
            .source_of(target)
            .map(|existing| format!("'{target}' already has an upstream node ('{existing}')"))
    }
}

struct SingleDownstream;
impl ConnectionRule for SingleDownstream {
    fn name(&self) -> &str { "single_downstream" }
    fn check(&self, graph: &GraphModel, source: &str, _target: &str) -> Option<String> {
        graph
            .target_of(source)
            .map(|existing| format!("'{source}' already feeds '{existing}'"))
    }
}

struct NoCycle;
impl ConnectionRule for NoCycle {
    fn name(&self) -> &str { "no_cycle" }
    fn check(&self, graph: &GraphModel, source: &str, target: &str) -> Option<String> {
        let mut seen = HashSet::new();
        let mut current = target;
        while let Some(next) = graph.target_of(current) {
            if next == source {
                return Some("the connection would create a cycle".into());
            }
            if !seen.insert(next) {
                break;
            }
            current = next;
        }
        None
    }
}

fn connection_rules() -> Vec<Box<dyn ConnectionRule>> {
    vec![
        Box::new(NoSelfLoop),
        Box::new(Direction),
        Box::new(SingleUpstream),
        Box::new(SingleDownstream),
        Box::new(NoCycle),
    ]
}

/// Check a prospective `source -> target` edge against every rule.
pub fn check_connection(graph: &GraphModel, source: &str, target: &str) -> Result<()> {
    for id in [source, target] {
        if !graph.contains(id) {
            return Err(SignalError::UnknownNode(id.to_string()));
        }
    }
    for rule in connection_rules() {
        if let Some(reason) = rule.check(graph, source, target) {
            tracing::debug!(rule = rule.name(), source, target, %reason, "connection rejected");
            return Err(SignalError::InvalidConnection {
                from: source.to_string(),
                to: target.to_string(),
                reason,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Info,
}

/// Advisory findings: nothing here blocks a run.
pub fn validate(graph: &GraphModel) -> Vec<Diagnostic> {
    let mut diags = Vec::new();

    if graph.target_of(INPUT_NODE_ID).is_none() {
        diags.push(Diagnostic {
            rule: "input_connected".into(),
            severity: Severity::Warning,
            message: "Input is not connected; running has no effect".into(),
            node_id: Some(INPUT_NODE_ID.into()),
        });
    }

    let chain = graph.downstream_of(INPUT_NODE_ID);
    if !chain.iter().any(|id| id == OUTPUT_NODE_ID) {
        diags.push(Diagnostic {
            rule: "output_reachable".into(),
            severity: Severity::Warning,
            message: "Output is not reachable from Input".into(),
            node_id: Some(OUTPUT_NODE_ID.into()),
        });
    }

    for node in graph.nodes().iter().filter(|n| n.kind.is_processing()) {
        if !chain.contains(&node.id) {
            diags.push(Diagnostic {
                rule: "detached_node".into(),
                severity: Severity::Info,
                message: format!(
                    "{} node '{}' is not on the Input chain and will not run",
                    node.kind.label(),
                    node.id
                ),
                node_id: Some(node.id.clone()),
            });
        }
    }

    diags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::OutlierParams;

    fn graph_with(n: usize) -> (GraphModel, Vec<String>) {
        let mut graph = GraphModel::new();
        let ids = (0..n)
            .map(|_| graph.add_node(NodeKind::Outliers(OutlierParams::default())).unwrap())
            .collect();
        (graph, ids)
    }

    fn reason(err: SignalError) -> String {
        match err {
            SignalError::InvalidConnection { reason, .. } => reason,
            other => panic!("expected InvalidConnection, got {other:?}"),
        }
    }

    #[test]
    fn rejects_self_loop() {
        let (mut graph, ids) = graph_with(1);
        let err = graph.connect(&ids[0], &ids[0]).unwrap_err();
        assert!(reason(err).contains("itself"));
    }

    #[test]
    fn rejects_cycle() {
        let (mut graph, ids) = graph_with(3);
        graph.connect(&ids[0], &ids[1]).unwrap();
        graph.connect(&ids[1], &ids[2]).unwrap();
        let err = graph.connect(&ids[2], &ids[0]).unwrap_err();
        assert!(reason(err).contains("cycle"));
    }

    #[test]
    fn rejects_fan_in_and_fan_out() {
        let (mut graph, ids) = graph_with(3);
        graph.connect(&ids[0], &ids[1]).unwrap();
        assert!(reason(graph.connect(&ids[2], &ids[1]).unwrap_err()).contains("upstream"));
        assert!(reason(graph.connect(&ids[0], &ids[2]).unwrap_err()).contains("feeds"));
    }

    #[test]
    fn rejects_wrong_direction_on_seeds() {
        let (mut graph, ids) = graph_with(1);
        assert!(graph.connect(OUTPUT_NODE_ID, &ids[0]).is_err());
        assert!(graph.connect(&ids[0], INPUT_NODE_ID).is_err());
    }

    #[test]
    fn unknown_endpoint() {
        let (mut graph, _) = graph_with(0);
        assert!(matches!(
            graph.connect(INPUT_NODE_ID, "9"),
            Err(SignalError::UnknownNode(id)) if id == "9"
        ));
    }

    #[test]
    fn diagnostics_for_empty_graph() {
        let (graph, _) = graph_with(1);
        let rules: Vec<_> = validate(&graph).into_iter().map(|d| d.rule).collect();
        assert_eq!(rules, vec!["input_connected", "output_reachable", "detached_node"]);
    }

    #[test]
    fn complete_chain_is_clean() {
        let (mut graph, ids) = graph_with(1);
        graph.connect(INPUT_NODE_ID, &ids[0]).unwrap();
        graph.connect(&ids[0], OUTPUT_NODE_ID).unwrap();
        assert!(validate(&graph).is_empty());
    }
}
