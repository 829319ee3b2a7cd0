// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node kinds, templates and node instances.

use crate::geometry::Point;
use crate::port::{DataType, Port, PortDirection, PortId, PortSchema};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque per-node configuration payload
pub type NodeConfig = IndexMap<String, serde_json::Value>;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Closed set of node kinds a workflow can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Uploaded or connected data set
    DataSource,
    /// Filtered or projected view over a data source
    View,
    /// Configured AI model
    AiModel,
    /// Result produced by an AI model
    AiResult,
    /// Data transformation step
    Transform,
    /// Terminal output (export, report)
    Output,
    /// Event that starts an automation
    AutomationTrigger,
}

impl NodeKind {
    /// Every kind, in palette order
    pub const ALL: [NodeKind; 7] = [
        NodeKind::DataSource,
        NodeKind::View,
        NodeKind::AiModel,
        NodeKind::AiResult,
        NodeKind::Transform,
        NodeKind::Output,
        NodeKind::AutomationTrigger,
    ];

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::DataSource => "Data Source",
            Self::View => "View",
            Self::AiModel => "AI Model",
            Self::AiResult => "AI Result",
            Self::Transform => "Transform",
            Self::Output => "Output",
            Self::AutomationTrigger => "Automation Trigger",
        }
    }

    /// Header color (for UI)
    pub fn color(&self) -> [u8; 3] {
        match self {
            Self::DataSource => [59, 130, 246],
            Self::View => [20, 184, 166],
            Self::AiModel => [139, 92, 246],
            Self::AiResult => [236, 72, 153],
            Self::Transform => [234, 179, 8],
            Self::Output => [34, 197, 94],
            Self::AutomationTrigger => [249, 115, 22],
        }
    }

    /// Port schema every node of this kind starts from
    pub fn default_template(&self) -> NodeTemplate {
        let (inputs, outputs) = match self {
            Self::DataSource => (vec![], vec![PortSchema::new("Data", DataType::Object)]),
            Self::View => (
                vec![PortSchema::new("Source", DataType::Object)],
                vec![PortSchema::new("Rows", DataType::Object)],
            ),
            Self::AiModel => (
                vec![PortSchema::new("Input", DataType::Object)],
                vec![PortSchema::new("Prediction", DataType::Object)],
            ),
            Self::AiResult => (
                vec![PortSchema::new("Result", DataType::Object)],
                vec![PortSchema::new("Summary", DataType::String)],
            ),
            Self::Transform => (
                vec![PortSchema::new("Input", DataType::Any)],
                vec![PortSchema::new("Output", DataType::Any)],
            ),
            Self::Output => (vec![PortSchema::new("Data", DataType::Any)], vec![]),
            Self::AutomationTrigger => (vec![], vec![PortSchema::new("Event", DataType::Object)]),
        };

        NodeTemplate {
            kind: *self,
            name: self.label().to_string(),
            inputs,
            outputs,
            config: NodeConfig::new(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Addable node template, as listed by a [`TemplateSource`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTemplate {
    /// Node kind
    pub kind: NodeKind,
    /// Display name for instances
    pub name: String,
    /// Input port schema
    pub inputs: Vec<PortSchema>,
    /// Output port schema
    pub outputs: Vec<PortSchema>,
    /// Initial configuration
    #[serde(default)]
    pub config: NodeConfig,
}

impl NodeTemplate {
    /// Start from the default schema of `kind` with a custom name
    pub fn named(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..kind.default_template()
        }
    }

    /// Replace the input schema
    pub fn with_inputs(mut self, inputs: Vec<PortSchema>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Replace the output schema
    pub fn with_outputs(mut self, outputs: Vec<PortSchema>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Add an initial configuration entry
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node kind
    pub kind: NodeKind,
    /// Display name
    pub name: String,
    /// Position on the canvas (top-left corner)
    pub position: Point,
    /// Kind-specific configuration, never interpreted by the graph
    #[serde(default)]
    pub config: NodeConfig,
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
}

impl Node {
    /// Instantiate a template with fresh node and port ids
    pub fn from_template(template: &NodeTemplate, position: Point) -> Self {
        Self {
            id: NodeId::new(),
            kind: template.kind,
            name: template.name.clone(),
            position,
            config: template.config.clone(),
            inputs: template
                .inputs
                .iter()
                .map(|s| Port::from_schema(s, PortDirection::Input))
                .collect(),
            outputs: template
                .outputs
                .iter()
                .map(|s| Port::from_schema(s, PortDirection::Output))
                .collect(),
        }
    }

    /// Get an input port by ID
    pub fn input(&self, port_id: PortId) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == port_id)
    }

    /// Get an output port by ID
    pub fn output(&self, port_id: PortId) -> Option<&Port> {
        self.outputs.iter().find(|p| p.id == port_id)
    }

    pub(crate) fn input_mut(&mut self, port_id: PortId) -> Option<&mut Port> {
        self.inputs.iter_mut().find(|p| p.id == port_id)
    }

    /// Index of an input port among the node's inputs
    pub fn input_index(&self, port_id: PortId) -> Option<usize> {
        self.inputs.iter().position(|p| p.id == port_id)
    }

    /// Index of an output port among the node's outputs
    pub fn output_index(&self, port_id: PortId) -> Option<usize> {
        self.outputs.iter().position(|p| p.id == port_id)
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// Listing of addable node templates
pub trait TemplateSource {
    /// Templates in display order
    fn templates(&self) -> Vec<NodeTemplate>;

    /// First template of a given kind
    fn template_for(&self, kind: NodeKind) -> Option<NodeTemplate> {
        self.templates().into_iter().find(|t| t.kind == kind)
    }
}

/// One default template per [`NodeKind`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPalette;

impl TemplateSource for BuiltinPalette {
    fn templates(&self) -> Vec<NodeTemplate> {
        NodeKind::ALL.iter().map(NodeKind::default_template).collect()
    }
}

/// Caller-supplied template list, e.g. one entry per available data source
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates {
    templates: Vec<NodeTemplate>,
}

impl StaticTemplates {
    /// Wrap a template list
    pub fn new(templates: Vec<NodeTemplate>) -> Self {
        Self { templates }
    }

    /// Append a template
    pub fn push(&mut self, template: NodeTemplate) {
        self.templates.push(template);
    }
}

impl TemplateSource for StaticTemplates {
    fn templates(&self) -> Vec<NodeTemplate> {
        self.templates.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_template() {
        let palette = BuiltinPalette.templates();
        assert_eq!(palette.len(), NodeKind::ALL.len());
        for kind in NodeKind::ALL {
            let template = BuiltinPalette.template_for(kind).unwrap();
            assert_eq!(template.kind, kind);
            assert!(!template.inputs.is_empty() || !template.outputs.is_empty());
        }
    }

    #[test]
    fn test_from_template_allocates_fresh_ids() {
        let template = NodeKind::AiModel.default_template();
        let a = Node::from_template(&template, Point::new(10.0, 20.0));
        let b = Node::from_template(&template, Point::new(10.0, 20.0));

        assert_ne!(a.id, b.id);
        assert_ne!(a.inputs[0].id, b.inputs[0].id);
        assert_eq!(a.inputs[0].direction, PortDirection::Input);
        assert_eq!(a.outputs[0].direction, PortDirection::Output);
        assert_eq!(a.position, Point::new(10.0, 20.0));
    }

    #[test]
    fn test_port_lookup_respects_direction() {
        let node = Node::from_template(&NodeKind::View.default_template(), Point::ZERO);
        let input = node.inputs[0].id;
        let output = node.outputs[0].id;

        assert!(node.input(input).is_some());
        assert!(node.output(input).is_none());
        assert_eq!(node.output_index(output), Some(0));
        assert_eq!(node.ports().count(), 2);
    }

    #[test]
    fn test_static_templates() {
        let mut source = StaticTemplates::default();
        source.push(
            NodeTemplate::named(NodeKind::DataSource, "sales.csv")
                .with_outputs(vec![PortSchema::new("Rows", DataType::Table)])
                .with_config("datasetId", serde_json::json!(42)),
        );

        let template = source.template_for(NodeKind::DataSource).unwrap();
        assert_eq!(template.name, "sales.csv");
        assert_eq!(template.config["datasetId"], serde_json::json!(42));
        assert!(source.template_for(NodeKind::Output).is_none());
    }

    #[test]
    fn test_kind_tags() {
        let json = serde_json::to_string(&NodeKind::AutomationTrigger).unwrap();
        assert_eq!(json, "\"automation-trigger\"");
    }
}
