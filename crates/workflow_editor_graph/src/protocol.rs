// SPDX-License-Identifier: MIT OR Apache-2.0
//! Click/drag protocol for creating connections.
//!
//! Two states: [`ConnectState::Idle`] and [`ConnectState::SourcePending`].
//! A first click (on a node or an output anchor) picks the source, a second
//! click on another node or input anchor tries to connect. Dragging from an
//! output anchor and releasing over a target does the same in one gesture.
//! Every attempt, successful or not, ends back in `Idle`.

use crate::connection::{ConnectionId, Endpoint};
use crate::geometry::{preview_edge, EdgePath, GeometryConfig, Point};
use crate::graph::{ConnectionError, GraphStore};
use crate::node::NodeId;
use crate::port::{PortId, PortTypeRegistry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something the user clicked or released on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// A node body
    Node(NodeId),
    /// An output anchor
    Output(Endpoint),
    /// An input anchor
    Input(Endpoint),
}

impl Target {
    /// Node the target belongs to
    pub fn node(&self) -> NodeId {
        match self {
            Self::Node(id) => *id,
            Self::Output(e) | Self::Input(e) => e.node,
        }
    }
}

/// Pending connection source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceRef {
    /// Whole node; resolves to its first output
    Node(NodeId),
    /// A specific output port
    Output(Endpoint),
}

impl SourceRef {
    /// Node the source belongs to
    pub fn node(&self) -> NodeId {
        match self {
            Self::Node(id) => *id,
            Self::Output(e) => e.node,
        }
    }
}

/// How the pending source was picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gesture {
    /// First of two clicks
    Click,
    /// Press on an output anchor, still held
    Drag,
}

/// Protocol state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ConnectState {
    /// Nothing pending
    #[default]
    Idle,
    /// Source chosen, waiting for a target
    SourcePending {
        /// Chosen source
        source: SourceRef,
        /// Pointer position for the live preview, if known
        preview: Option<Point>,
        /// How the source was picked
        gesture: Gesture,
    },
}

/// Result of feeding one event to the protocol
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolOutcome {
    /// A source is now pending
    Pending(SourceRef),
    /// The pending source was dropped
    Cancelled,
    /// A connection was created
    Connected(ConnectionId),
    /// The attempt was rejected; the graph is unchanged
    Rejected(ConnectionError),
    /// The event had no effect
    Ignored,
}

/// Connection protocol state machine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionProtocol {
    state: ConnectState,
}

impl ConnectionProtocol {
    /// Create a protocol in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> &ConnectState {
        &self.state
    }

    /// Pending source, if any
    pub fn pending_source(&self) -> Option<SourceRef> {
        match self.state {
            ConnectState::SourcePending { source, .. } => Some(source),
            ConnectState::Idle => None,
        }
    }

    /// Node shown as selected while a source is pending
    pub fn selected_node(&self) -> Option<NodeId> {
        self.pending_source().map(|s| s.node())
    }

    /// Handle a click
    pub fn click(
        &mut self,
        target: Target,
        store: &mut GraphStore,
        registry: &PortTypeRegistry,
    ) -> ProtocolOutcome {
        let state = self.state;
        match state {
            ConnectState::Idle => match target {
                Target::Node(id) => self.pend(SourceRef::Node(id), None, Gesture::Click),
                Target::Output(e) => self.pend(SourceRef::Output(e), None, Gesture::Click),
                Target::Input(_) => ProtocolOutcome::Ignored,
            },
            ConnectState::SourcePending { source, preview, .. } => match target {
                Target::Node(id) if id == source.node() => self.cancel(),
                Target::Output(e) if e.node == source.node() => self.cancel(),
                // Picking another output re-targets the pending source.
                Target::Output(e) => self.pend(SourceRef::Output(e), preview, Gesture::Click),
                Target::Node(_) | Target::Input(_) => self.attempt(source, target, store, registry),
            },
        }
    }

    /// Start a drag from an output anchor
    pub fn begin_drag(&mut self, source: Endpoint, pointer: Point) -> ProtocolOutcome {
        self.pend(SourceRef::Output(source), Some(pointer), Gesture::Drag)
    }

    /// Finish a drag over `target` (or over empty canvas)
    pub fn release(
        &mut self,
        target: Option<Target>,
        store: &mut GraphStore,
        registry: &PortTypeRegistry,
    ) -> ProtocolOutcome {
        let ConnectState::SourcePending {
            source,
            gesture: Gesture::Drag,
            ..
        } = self.state
        else {
            return ProtocolOutcome::Ignored;
        };

        match target {
            Some(t @ (Target::Node(_) | Target::Input(_))) if t.node() != source.node() => {
                self.attempt(source, t, store, registry)
            }
            Some(Target::Input(e)) => self.attempt(source, Target::Input(e), store, registry),
            _ => self.cancel(),
        }
    }

    /// Track the pointer for the live preview
    pub fn pointer_moved(&mut self, pointer: Point) {
        if let ConnectState::SourcePending { preview, .. } = &mut self.state {
            *preview = Some(pointer);
        }
    }

    /// Pointer left the canvas: hide the preview, keep the source
    pub fn pointer_left(&mut self) {
        if let ConnectState::SourcePending { preview, .. } = &mut self.state {
            *preview = None;
        }
    }

    /// Drop any pending source
    pub fn cancel(&mut self) -> ProtocolOutcome {
        match std::mem::take(&mut self.state) {
            ConnectState::Idle => ProtocolOutcome::Ignored,
            ConnectState::SourcePending { .. } => ProtocolOutcome::Cancelled,
        }
    }

    /// Reset if the pending source lives on a removed node
    pub fn forget_node(&mut self, node: NodeId) {
        if self.selected_node() == Some(node) {
            self.state = ConnectState::Idle;
        }
    }

    /// Live preview curve from the pending source to the pointer
    pub fn preview(&self, store: &GraphStore, config: &GeometryConfig) -> Option<EdgePath> {
        let ConnectState::SourcePending {
            source,
            preview: Some(pointer),
            ..
        } = self.state
        else {
            return None;
        };
        let output = resolve_source(source, store).ok()?;
        let node = store.node(output.node)?;
        preview_edge(node, output.port, pointer, config)
    }

    fn pend(&mut self, source: SourceRef, preview: Option<Point>, gesture: Gesture) -> ProtocolOutcome {
        self.state = ConnectState::SourcePending {
            source,
            preview,
            gesture,
        };
        ProtocolOutcome::Pending(source)
    }

    fn attempt(
        &mut self,
        source: SourceRef,
        target: Target,
        store: &mut GraphStore,
        registry: &PortTypeRegistry,
    ) -> ProtocolOutcome {
        self.state = ConnectState::Idle;

        match connect(source, target, store, registry) {
            Ok(id) => ProtocolOutcome::Connected(id),
            Err(err) => ProtocolOutcome::Rejected(err),
        }
    }
}

fn connect(
    source: SourceRef,
    target: Target,
    store: &mut GraphStore,
    registry: &PortTypeRegistry,
) -> Result<ConnectionId, ConnectionError> {
    let output = resolve_source(source, store)?;
    let input = resolve_target(output, target, store, registry)?;
    store.add_connection(output, input, registry).map(|c| c.id)
}

fn missing_port(node: NodeId) -> ConnectionError {
    ConnectionError::UnknownEndpoint(Endpoint::new(node, PortId(Uuid::nil())))
}

/// Resolve a pending source to a concrete output port
fn resolve_source(source: SourceRef, store: &GraphStore) -> Result<Endpoint, ConnectionError> {
    match source {
        SourceRef::Output(e) => Ok(e),
        SourceRef::Node(id) => store
            .node(id)
            .and_then(|n| n.outputs.first())
            .map(|p| Endpoint::new(id, p.id))
            .ok_or_else(|| missing_port(id)),
    }
}

/// Resolve a click target to a concrete input port.
///
/// A whole node resolves to its first free input that accepts the source
/// type, falling back to its first input so the store reports why.
fn resolve_target(
    output: Endpoint,
    target: Target,
    store: &GraphStore,
    registry: &PortTypeRegistry,
) -> Result<Endpoint, ConnectionError> {
    let id = match target {
        Target::Input(e) => return Ok(e),
        Target::Output(e) => return Err(ConnectionError::UnknownEndpoint(e)),
        Target::Node(id) => id,
    };
    let node = store.node(id).ok_or_else(|| missing_port(id))?;
    let source_type = store
        .node(output.node)
        .and_then(|n| n.output(output.port))
        .map(|p| &p.data_type);

    let preferred = node.inputs.iter().find(|p| {
        !p.connected && source_type.is_some_and(|t| registry.is_compatible(t, &p.data_type))
    });
    preferred
        .or_else(|| node.inputs.first())
        .map(|p| Endpoint::new(id, p.id))
        .ok_or_else(|| missing_port(id))
}
