// SPDX-License-Identifier: MIT OR Apache-2.0
//! Immutable graph snapshots and the validating loader.
//!
//! A snapshot is what the save sink receives and what an external loader
//! hands back. Loading never trusts the snapshot: dangling or duplicate
//! edges are either dropped ([`LoadPolicy::Repair`]) or refused
//! ([`LoadPolicy::Reject`]).

use crate::connection::{Connection, ConnectionId, Endpoint};
use crate::graph::GraphStore;
use crate::node::{Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Owned copy of a graph's nodes and connections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Nodes in insertion order
    pub nodes: Vec<Node>,
    /// Connections in insertion order
    pub connections: Vec<Connection>,
}

impl GraphSnapshot {
    /// Encode as JSON (the REST backend format)
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as pretty RON
    pub fn to_ron(&self) -> Result<String, SnapshotError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Decode from RON
    pub fn from_ron(text: &str) -> Result<Self, SnapshotError> {
        Ok(ron::from_str(text)?)
    }
}

/// What to do with a snapshot that breaks a graph invariant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Drop offending connections and keep going
    #[default]
    Repair,
    /// Refuse the whole snapshot
    Reject,
}

/// Problem found in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotDefect {
    /// Two nodes share an id (later one dropped)
    DuplicateNode(NodeId),
    /// Two connections share an id
    DuplicateConnection(ConnectionId),
    /// Endpoint names a missing node or port
    DanglingEndpoint(ConnectionId, Endpoint),
    /// Connection links a node to itself
    SelfConnection(ConnectionId),
    /// Second connection into the same input
    InputAlreadyConnected(ConnectionId, Endpoint),
}

/// Outcome of a repaired load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Defects found, in snapshot order
    pub defects: Vec<SnapshotDefect>,
}

impl LoadReport {
    /// Whether the snapshot was already consistent
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }
}

impl GraphStore {
    /// Owned copy of the current graph
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes().cloned().collect(),
            connections: self.connections().cloned().collect(),
        }
    }

    /// Build a store from a snapshot, enforcing every graph invariant.
    ///
    /// Connection types are taken as stored and not re-checked. The
    /// `connected` flags on inputs are recomputed from the surviving edges.
    pub fn from_snapshot(
        snapshot: GraphSnapshot,
        policy: LoadPolicy,
    ) -> Result<(GraphStore, LoadReport), SnapshotError> {
        let mut report = LoadReport::default();

        let mut node_ids = HashSet::new();
        let mut nodes = Vec::with_capacity(snapshot.nodes.len());
        for node in snapshot.nodes {
            if node_ids.insert(node.id) {
                nodes.push(node);
            } else {
                report.defects.push(SnapshotDefect::DuplicateNode(node.id));
            }
        }

        let resolves_output = |e: Endpoint| {
            nodes
                .iter()
                .any(|n| n.id == e.node && n.output(e.port).is_some())
        };
        let resolves_input = |e: Endpoint| {
            nodes
                .iter()
                .any(|n| n.id == e.node && n.input(e.port).is_some())
        };

        let mut connection_ids = HashSet::new();
        let mut occupied = HashSet::new();
        let mut connections = Vec::with_capacity(snapshot.connections.len());
        for connection in snapshot.connections {
            let (source, target) = (connection.source(), connection.target());
            let defect = if !connection_ids.insert(connection.id) {
                Some(SnapshotDefect::DuplicateConnection(connection.id))
            } else if !resolves_output(source) {
                Some(SnapshotDefect::DanglingEndpoint(connection.id, source))
            } else if !resolves_input(target) {
                Some(SnapshotDefect::DanglingEndpoint(connection.id, target))
            } else if source.node == target.node {
                Some(SnapshotDefect::SelfConnection(connection.id))
            } else if !occupied.insert(target) {
                Some(SnapshotDefect::InputAlreadyConnected(connection.id, target))
            } else {
                None
            };

            match defect {
                Some(defect) => report.defects.push(defect),
                None => connections.push(connection),
            }
        }

        if !report.is_clean() {
            match policy {
                LoadPolicy::Reject => {
                    tracing::warn!(defects = report.defects.len(), "Rejected graph snapshot");
                    return Err(SnapshotError::Invalid(report.defects));
                }
                LoadPolicy::Repair => {
                    tracing::warn!(defects = report.defects.len(), "Repaired graph snapshot");
                }
            }
        }

        Ok((GraphStore::from_parts(nodes, connections), report))
    }
}

/// Snapshot encoding or validation error
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// JSON encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON encoding failed
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    /// RON decoding failed
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// Snapshot breaks graph invariants
    #[error("Snapshot has {} defect(s)", .0.len())]
    Invalid(Vec<SnapshotDefect>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::node::NodeKind;
    use crate::port::{DataType, PortId, PortTypeRegistry};

    fn sample() -> (GraphStore, NodeId, NodeId) {
        let mut store = GraphStore::new();
        let registry = PortTypeRegistry::strict();
        let a = store
            .add_node(&NodeKind::DataSource.default_template(), Point::ZERO)
            .clone();
        let b = store
            .add_node(&NodeKind::AiModel.default_template(), Point::new(300.0, 0.0))
            .clone();
        store
            .add_connection(
                Endpoint::new(a.id, a.outputs[0].id),
                Endpoint::new(b.id, b.inputs[0].id),
                &registry,
            )
            .unwrap();
        (store, a.id, b.id)
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let (mut store, a, _) = sample();
        let snapshot = store.snapshot();
        store.remove_node(a);

        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.connections.len(), 1);
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_json_field_names() {
        let (store, _, _) = sample();
        let json = store.snapshot().to_json().unwrap();
        assert!(json.contains("\"sourceNodeId\""));
        assert!(json.contains("\"targetInputId\""));
        assert!(json.contains("\"dataType\": \"object\""));
        assert!(json.contains("\"kind\": \"data-source\""));

        let decoded = GraphSnapshot::from_json(&json).unwrap();
        assert_eq!(decoded, store.snapshot());
    }

    #[test]
    fn test_ron_encoding() {
        let (store, _, _) = sample();
        let text = store.snapshot().to_ron().unwrap();
        let decoded = GraphSnapshot::from_ron(&text).unwrap();
        assert_eq!(decoded, store.snapshot());
    }

    #[test]
    fn test_clean_snapshot_loads_unchanged() {
        let (store, _, b) = sample();
        let (loaded, report) =
            GraphStore::from_snapshot(store.snapshot(), LoadPolicy::Reject).unwrap();
        assert!(report.is_clean());
        assert_eq!(loaded.snapshot(), store.snapshot());
        assert!(loaded.node(b).unwrap().inputs[0].connected);
    }

    #[test]
    fn test_dangling_connection_is_repaired() {
        let (store, a, b) = sample();
        let mut snapshot = store.snapshot();
        snapshot.nodes.retain(|n| n.id != a);

        let (loaded, report) =
            GraphStore::from_snapshot(snapshot.clone(), LoadPolicy::Repair).unwrap();
        assert_eq!(loaded.connection_count(), 0);
        assert!(!loaded.node(b).unwrap().inputs[0].connected);
        assert!(matches!(
            report.defects.as_slice(),
            [SnapshotDefect::DanglingEndpoint(_, e)] if e.node == a
        ));

        let err = GraphStore::from_snapshot(snapshot, LoadPolicy::Reject).unwrap_err();
        assert!(matches!(err, SnapshotError::Invalid(ref d) if d.len() == 1));
    }

    #[test]
    fn test_duplicate_inbound_keeps_first() {
        let (store, _, b) = sample();
        let mut snapshot = store.snapshot();
        let first = snapshot.connections[0].clone();
        let mut second = first.clone();
        second.id = ConnectionId::new();
        snapshot.connections.push(second.clone());

        let (loaded, report) = GraphStore::from_snapshot(snapshot, LoadPolicy::Repair).unwrap();
        assert_eq!(loaded.connection_count(), 1);
        assert!(loaded.connection(first.id).is_some());
        assert_eq!(
            report.defects,
            vec![SnapshotDefect::InputAlreadyConnected(second.id, first.target())]
        );
        assert!(loaded.node(b).unwrap().inputs[0].connected);
    }

    #[test]
    fn test_unknown_port_and_self_loop() {
        let (mut store, _, _) = sample();
        let t = store
            .add_node(&NodeKind::Transform.default_template(), Point::ZERO)
            .clone();
        let mut snapshot = store.snapshot();

        let mut bad_port = snapshot.connections[0].clone();
        bad_port.id = ConnectionId::new();
        bad_port.target_input_id = PortId::new();
        let self_loop = Connection::new(
            Endpoint::new(t.id, t.outputs[0].id),
            Endpoint::new(t.id, t.inputs[0].id),
            DataType::Any,
        );
        snapshot.connections.push(bad_port.clone());
        snapshot.connections.push(self_loop.clone());

        let (loaded, report) =
            GraphStore::from_snapshot(snapshot, LoadPolicy::Repair).unwrap();
        assert_eq!(loaded.connection_count(), 1);
        assert_eq!(
            report.defects,
            vec![
                SnapshotDefect::DanglingEndpoint(bad_port.id, bad_port.target()),
                SnapshotDefect::SelfConnection(self_loop.id),
            ]
        );
    }

    #[test]
    fn test_stale_connected_flags_are_recomputed() {
        let (store, _, b) = sample();
        let mut snapshot = store.snapshot();
        snapshot.connections.clear();
        for node in &mut snapshot.nodes {
            for port in &mut node.inputs {
                port.connected = true;
            }
        }
        let (loaded, _) = GraphStore::from_snapshot(snapshot, LoadPolicy::Reject).unwrap();
        assert!(!loaded.node(b).unwrap().inputs[0].connected);
    }
}
