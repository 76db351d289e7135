//! Node kinds: a closed set, each processing kind carrying its own parameters.

use serde::{Deserialize, Serialize};

use crate::handler::ProcessingNode;
use crate::handlers::{FilterParams, OutlierParams, ResamplingParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Input,
    Output,
    Resampling(ResamplingParams),
    Outliers(OutlierParams),
    Filtering(FilterParams),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Input => "Input",
            NodeKind::Output => "Output",
            NodeKind::Resampling(_) => "Resampling",
            NodeKind::Outliers(_) => "Outliers",
            NodeKind::Filtering(_) => "Filtering",
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processor().is_some()
    }

    /// The processing capability of this kind; `None` for Input and Output.
    pub fn processor(&self) -> Option<&dyn ProcessingNode> {
        match self {
            NodeKind::Input | NodeKind::Output => None,
            NodeKind::Resampling(p) => Some(p),
            NodeKind::Outliers(p) => Some(p),
            NodeKind::Filtering(p) => Some(p),
        }
    }

    /// Whether both values are the same variant, ignoring parameters.
    pub fn same_kind(&self, other: &NodeKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[cfg(test)]
mod tests {
    use signal_gateway::{Operation, OutlierTechnique};

    use super::*;

    #[test]
    fn processors_by_kind() {
        assert!(NodeKind::Input.processor().is_none());
        assert!(!NodeKind::Output.is_processing());
        let kind = NodeKind::Outliers(OutlierParams::new(OutlierTechnique::Hampel));
        assert_eq!(kind.processor().unwrap().operation(), Operation::Outliers);
    }

    #[test]
    fn same_kind_ignores_parameters() {
        let a = NodeKind::Outliers(OutlierParams::new(OutlierTechnique::Hampel));
        let b = NodeKind::Outliers(OutlierParams::new(OutlierTechnique::Iqr));
        assert!(a.same_kind(&b));
        assert!(!a.same_kind(&NodeKind::Filtering(FilterParams::default())));
    }

    #[test]
    fn serializes_with_type_tag() {
        let kind = NodeKind::Outliers(OutlierParams::new(OutlierTechnique::Iqr));
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json, serde_json::json!({"type": "outliers", "technique": "iqr"}));
        let back: NodeKind = serde_json::from_value(json).unwrap();
        assert_eq!(back, kind);
    }
}
