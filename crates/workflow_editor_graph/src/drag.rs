// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node dragging.
//!
//! One node at a time. The session starts on pointer-down over a node and
//! ends on pointer-up or when the pointer leaves the canvas, so a release
//! outside the canvas can never leave a drag stuck.

use crate::geometry::Point;
use crate::graph::GraphStore;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// An active drag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragSession {
    /// Node being dragged
    pub node: NodeId,
    /// Pointer position minus node position at pointer-down
    pub offset: Point,
}

/// Drag controller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    /// Create an idle controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Active session, if any
    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Whether a node is being dragged
    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Start dragging `node`. Ignored while another drag is active or if
    /// the node does not exist. Returns whether a session started.
    pub fn pointer_down(&mut self, node: NodeId, pointer: Point, store: &GraphStore) -> bool {
        if self.session.is_some() {
            return false;
        }
        let Some(n) = store.node(node) else {
            return false;
        };
        self.session = Some(DragSession {
            node,
            offset: pointer - n.position,
        });
        tracing::trace!(%node, "Drag started");
        true
    }

    /// Follow the pointer. Returns the node's new position.
    pub fn pointer_move(&mut self, pointer: Point, store: &mut GraphStore) -> Option<Point> {
        let session = self.session?;
        let position = (pointer - session.offset).clamp_non_negative();
        if store.update_node_position(session.node, position) {
            Some(position)
        } else {
            // Node was removed mid-drag.
            self.session = None;
            None
        }
    }

    /// End the drag, snapping to `snap` if given
    pub fn pointer_up(&mut self, store: &mut GraphStore, snap: Option<f32>) -> Option<DragSession> {
        let session = self.session.take()?;
        if let Some(step) = snap {
            if let Some(node) = store.node(session.node) {
                let snapped = node.position.snap(step).clamp_non_negative();
                store.update_node_position(session.node, snapped);
            }
        }
        tracing::trace!(node = %session.node, "Drag ended");
        Some(session)
    }

    /// Pointer left the canvas: end the drag as if released
    pub fn pointer_left(&mut self, store: &mut GraphStore, snap: Option<f32>) -> Option<DragSession> {
        self.pointer_up(store, snap)
    }

    /// End the session if it is dragging a removed node
    pub fn forget_node(&mut self, node: NodeId) {
        if self.session.is_some_and(|s| s.node == node) {
            self.session = None;
        }
    }
}
