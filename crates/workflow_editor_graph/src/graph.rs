// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph store owning the nodes and connections of a workflow.
//!
//! Invariants upheld after every call:
//! - every connection endpoint names a live node and one of its ports
//! - an input port has at most one incoming connection
//! - no connection links a node to itself
//! - ids are never reused
//!
//! Rejected mutations leave the store untouched.

use crate::connection::{Connection, ConnectionId, Endpoint};
use crate::geometry::Point;
use crate::node::{Node, NodeId, NodeTemplate};
use crate::port::{DataType, PortId, PortTypeRegistry};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Graph store for one editing session
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    /// Nodes in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Connections in insertion order
    connections: IndexMap<ConnectionId, Connection>,
    /// Incoming connection per input port
    inbound: HashMap<Endpoint, ConnectionId>,
    /// Bumped by every successful mutation
    revision: u64,
}

impl GraphStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Revision counter, changes whenever the graph changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Instantiate a template at `position` and add it to the graph
    pub fn add_node(&mut self, template: &NodeTemplate, position: Point) -> &Node {
        let node = Node::from_template(template, position);
        let id = node.id;
        tracing::debug!(node = %id, kind = %node.kind, "Added node");
        self.touch();
        self.nodes.entry(id).or_insert(node)
    }

    /// Remove a node together with every connection touching it.
    ///
    /// Unknown ids are a no-op and return `None`.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<(Node, Vec<Connection>)> {
        let node = self.nodes.shift_remove(&node_id)?;

        let incident: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.involves_node(node_id))
            .map(|c| c.id)
            .collect();
        let removed: Vec<Connection> = incident
            .into_iter()
            .filter_map(|id| self.detach(id))
            .collect();

        tracing::debug!(
            node = %node_id,
            connections = removed.len(),
            "Removed node"
        );
        self.touch();
        Some((node, removed))
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the node exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Move a node. Returns false if the node does not exist.
    pub fn update_node_position(&mut self, node_id: NodeId, position: Point) -> bool {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        if node.position != position {
            node.position = position;
            self.touch();
        }
        true
    }

    /// Set one configuration entry. Returns false if the node does not exist.
    pub fn set_node_config(
        &mut self,
        node_id: NodeId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> bool {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        node.config.insert(key.into(), value);
        self.touch();
        true
    }

    /// Remove one configuration entry, returning its previous value
    pub fn remove_node_config(&mut self, node_id: NodeId, key: &str) -> Option<serde_json::Value> {
        let value = self.nodes.get_mut(&node_id)?.config.shift_remove(key)?;
        self.touch();
        Some(value)
    }

    /// Rename a node. Returns false if the node does not exist.
    pub fn rename_node(&mut self, node_id: NodeId, name: impl Into<String>) -> bool {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        node.name = name.into();
        self.touch();
        true
    }

    /// Connect an output port to an input port.
    ///
    /// Checks run in a fixed order: endpoints exist, types are compatible,
    /// the input is free, the two nodes differ.
    pub fn add_connection(
        &mut self,
        source: Endpoint,
        target: Endpoint,
        registry: &PortTypeRegistry,
    ) -> Result<&Connection, ConnectionError> {
        let data_type = self.validate(source, target, registry).inspect_err(|err| {
            tracing::warn!(%source, %target, "Rejected connection: {err}");
        })?;

        let connection = Connection::new(source, target, data_type);
        let id = connection.id;
        if let Some(port) = self
            .nodes
            .get_mut(&target.node)
            .and_then(|n| n.input_mut(target.port))
        {
            port.connected = true;
        }
        self.inbound.insert(target, id);
        tracing::debug!(connection = %id, %source, %target, "Added connection");
        self.touch();
        Ok(&*self.connections.entry(id).or_insert(connection))
    }

    /// Check a prospective connection without committing it
    pub fn validate(
        &self,
        source: Endpoint,
        target: Endpoint,
        registry: &PortTypeRegistry,
    ) -> Result<DataType, ConnectionError> {
        let source_port = self
            .nodes
            .get(&source.node)
            .and_then(|n| n.output(source.port))
            .ok_or(ConnectionError::UnknownEndpoint(source))?;
        let target_port = self
            .nodes
            .get(&target.node)
            .and_then(|n| n.input(target.port))
            .ok_or(ConnectionError::UnknownEndpoint(target))?;

        if !registry.is_compatible(&source_port.data_type, &target_port.data_type) {
            return Err(ConnectionError::TypeMismatch {
                output: source_port.data_type.clone(),
                input: target_port.data_type.clone(),
            });
        }

        if let Some(existing) = self.inbound.get(&target) {
            return Err(ConnectionError::InputAlreadyConnected {
                input: target,
                existing: *existing,
            });
        }

        if source.node == target.node {
            return Err(ConnectionError::SelfConnection(source.node));
        }

        Ok(source_port.data_type.clone())
    }

    /// Remove a connection. Unknown ids are a no-op.
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let removed = self.detach(connection_id)?;
        tracing::debug!(connection = %connection_id, "Removed connection");
        self.touch();
        Some(removed)
    }

    /// Unlink a connection and clear its target's `connected` flag
    fn detach(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.shift_remove(&connection_id)?;
        let target = connection.target();
        self.inbound.remove(&target);
        if let Some(port) = self
            .nodes
            .get_mut(&target.node)
            .and_then(|n| n.input_mut(target.port))
        {
            port.connected = false;
        }
        Some(connection)
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the connection feeding an input port
    pub fn connection_into(&self, node_id: NodeId, input: PortId) -> Option<&Connection> {
        let id = self.inbound.get(&Endpoint::new(node_id, input))?;
        self.connections.get(id)
    }

    /// Get connections leaving an output port
    pub fn connections_from(
        &self,
        node_id: NodeId,
        output: PortId,
    ) -> impl Iterator<Item = &Connection> {
        self.connections
            .values()
            .filter(move |c| c.source_node_id == node_id && c.source_output_id == output)
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Rebuild a store from parts that already satisfy every invariant
    pub(crate) fn from_parts(nodes: Vec<Node>, connections: Vec<Connection>) -> Self {
        let mut store = Self::default();
        for mut node in nodes {
            for port in node.inputs.iter_mut().chain(node.outputs.iter_mut()) {
                port.connected = false;
            }
            store.nodes.insert(node.id, node);
        }
        for connection in connections {
            let target = connection.target();
            if let Some(port) = store
                .nodes
                .get_mut(&target.node)
                .and_then(|n| n.input_mut(target.port))
            {
                port.connected = true;
            }
            store.inbound.insert(target, connection.id);
            store.connections.insert(connection.id, connection);
        }
        store
    }
}

/// Reason an `add_connection` attempt was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Node or port does not exist
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(Endpoint),

    /// Port types are not compatible
    #[error("Cannot connect {output} output to {input} input")]
    TypeMismatch {
        /// Source output type
        output: DataType,
        /// Target input type
        input: DataType,
    },

    /// Input already has an incoming connection
    #[error("Input {input} is already connected")]
    InputAlreadyConnected {
        /// The occupied input
        input: Endpoint,
        /// The connection occupying it
        existing: ConnectionId,
    },

    /// Source and target are the same node
    #[error("Cannot connect node {0} to itself")]
    SelfConnection(NodeId),
}
