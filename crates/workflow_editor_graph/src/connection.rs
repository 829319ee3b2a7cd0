// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::{DataType, PortId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A (node, port) pair naming one end of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Owning node
    pub node: NodeId,
    /// Port on that node
    pub port: PortId,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(node: NodeId, port: PortId) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}

/// A directed, typed link from an output port to an input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source node ID
    pub source_node_id: NodeId,
    /// Source output port ID
    pub source_output_id: PortId,
    /// Target node ID
    pub target_node_id: NodeId,
    /// Target input port ID
    pub target_input_id: PortId,
    /// Type carried by the edge, copied from the source output
    pub data_type: DataType,
}

impl Connection {
    /// Create a new connection
    pub fn new(source: Endpoint, target: Endpoint, data_type: DataType) -> Self {
        Self {
            id: ConnectionId::new(),
            source_node_id: source.node,
            source_output_id: source.port,
            target_node_id: target.node,
            target_input_id: target.port,
            data_type,
        }
    }

    /// Source endpoint
    pub fn source(&self) -> Endpoint {
        Endpoint::new(self.source_node_id, self.source_output_id)
    }

    /// Target endpoint
    pub fn target(&self) -> Endpoint {
        Endpoint::new(self.target_node_id, self.target_input_id)
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }
}
