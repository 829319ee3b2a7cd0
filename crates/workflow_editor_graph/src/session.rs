// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editing session: the graph plus all interaction state.
//!
//! Every change goes through [`EditorSession::dispatch`]. The canvas turns
//! raw pointer input into [`EditorAction`]s; the session updates the graph
//! store, the connection protocol, the drag controller and the selection in
//! one place, and posts notices for anything the user should hear about.

use crate::connection::{ConnectionId, Endpoint};
use crate::drag::DragController;
use crate::geometry::{hit_test, EdgePath, Hit, Layout, LayoutCache, Point};
use crate::graph::GraphStore;
use crate::node::{NodeId, NodeKind, NodeTemplate, TemplateSource};
use crate::notice::{Notice, NoticeSender};
use crate::port::PortTypeRegistry;
use crate::protocol::{ConnectionProtocol, ProtocolOutcome, Target};
use crate::save::{SaveError, SaveSink, SaveStatus};
use crate::settings::CanvasSettings;
use crate::snapshot::{GraphSnapshot, LoadPolicy, LoadReport, SnapshotError};
use serde::{Deserialize, Serialize};

/// Selected element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// A node (also the pending connection source)
    Node(NodeId),
    /// A connection
    Connection(ConnectionId),
}

/// All transient interaction state of a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionState {
    /// Connection protocol
    pub connect: ConnectionProtocol,
    /// Drag controller
    pub drag: DragController,
    /// Current selection
    pub selection: Option<Selection>,
}

/// Something the user did
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    /// Add a node from a template, at `position` or the next free slot
    AddNode {
        /// Template to instantiate
        template: NodeTemplate,
        /// Where to put it
        position: Option<Point>,
    },
    /// Delete a node and its connections
    RemoveNode(NodeId),
    /// Delete a connection
    RemoveConnection(ConnectionId),
    /// Edit one configuration entry of a node
    SetNodeConfig {
        /// Node to edit
        node: NodeId,
        /// Entry key
        key: String,
        /// New value
        value: serde_json::Value,
    },
    /// Click on a node or anchor
    Click(Target),
    /// Press on an output anchor and start dragging a connection
    BeginConnectionDrag {
        /// Output anchor
        source: Endpoint,
        /// Pointer position
        pointer: Point,
    },
    /// Release a connection drag over a target or empty canvas
    ReleaseConnectionDrag {
        /// What lies under the pointer
        target: Option<Target>,
    },
    /// Press on a node body
    PointerDown {
        /// Node under the pointer
        node: NodeId,
        /// Pointer position
        pointer: Point,
    },
    /// Pointer moved
    PointerMove(Point),
    /// Pointer released
    PointerUp,
    /// Pointer left the canvas
    PointerLeave,
    /// Select a connection
    SelectConnection(ConnectionId),
    /// Delete whatever is selected
    DeleteSelected,
    /// Escape
    Cancel,
}

/// Effect of one dispatched action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// A node was added
    NodeAdded(NodeId),
    /// A node was removed with its connections
    NodeRemoved {
        /// Removed node
        node: NodeId,
        /// Connections removed with it
        connections: Vec<ConnectionId>,
    },
    /// A connection was removed
    ConnectionRemoved(ConnectionId),
    /// A node's configuration changed
    ConfigUpdated(NodeId),
    /// The connection protocol handled the action
    Connect(ProtocolOutcome),
    /// A dragged node moved
    NodeMoved(NodeId, Point),
    /// A drag ended
    DragEnded(NodeId),
    /// Selection changed
    Selected(Option<Selection>),
    /// Nothing changed
    Unchanged,
}

/// One editing session over one workflow graph
pub struct EditorSession {
    store: GraphStore,
    registry: PortTypeRegistry,
    settings: CanvasSettings,
    interaction: InteractionState,
    layout: LayoutCache,
    notices: NoticeSender,
    spawned: usize,
}

impl EditorSession {
    /// Start a session on an empty graph
    pub fn new(settings: CanvasSettings, notices: NoticeSender) -> Self {
        Self::with_store(GraphStore::new(), settings, notices)
    }

    /// Start a session on an existing graph
    pub fn with_store(store: GraphStore, settings: CanvasSettings, notices: NoticeSender) -> Self {
        Self {
            store,
            registry: settings.registry(),
            settings,
            interaction: InteractionState::default(),
            layout: LayoutCache::new(),
            notices,
            spawned: 0,
        }
    }

    /// Start a session from a snapshot, repairing or rejecting it per `policy`
    pub fn load(
        snapshot: GraphSnapshot,
        policy: LoadPolicy,
        settings: CanvasSettings,
        notices: NoticeSender,
    ) -> Result<(Self, LoadReport), SnapshotError> {
        let (store, report) = GraphStore::from_snapshot(snapshot, policy)?;
        if !report.is_clean() {
            notices.notify(Notice::warning(format!(
                "Repaired {} problem(s) while loading the workflow",
                report.defects.len()
            )));
        }
        Ok((Self::with_store(store, settings, notices), report))
    }

    /// The graph
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Canvas settings
    pub fn settings(&self) -> &CanvasSettings {
        &self.settings
    }

    /// Port type policy
    pub fn registry(&self) -> &PortTypeRegistry {
        &self.registry
    }

    /// Interaction state
    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    /// Node drawn as selected
    pub fn selected_node(&self) -> Option<NodeId> {
        match self.interaction.selection {
            Some(Selection::Node(id)) => Some(id),
            _ => self.interaction.connect.selected_node(),
        }
    }

    /// Selected connection
    pub fn selected_connection(&self) -> Option<ConnectionId> {
        match self.interaction.selection {
            Some(Selection::Connection(id)) => Some(id),
            _ => None,
        }
    }

    /// Current layout, recomputed only after the graph changed
    pub fn layout(&mut self) -> &Layout {
        self.layout.get(&self.store, &self.settings.geometry)
    }

    /// Live preview edge while a connection source is pending
    pub fn preview(&self) -> Option<EdgePath> {
        self.interaction
            .connect
            .preview(&self.store, &self.settings.geometry)
    }

    /// What lies under a canvas point
    pub fn hit(&mut self, point: Point) -> Option<Hit> {
        let config = self.settings.geometry;
        hit_test(self.layout(), point, &config)
    }

    /// Add the first template of `kind` listed by `source`
    pub fn add_from_source(
        &mut self,
        source: &dyn TemplateSource,
        kind: NodeKind,
        position: Option<Point>,
    ) -> Option<NodeId> {
        let template = source.template_for(kind)?;
        match self.dispatch(EditorAction::AddNode { template, position }) {
            ActionOutcome::NodeAdded(id) => Some(id),
            _ => None,
        }
    }

    /// Hand a snapshot to `sink` and report the outcome.
    ///
    /// The graph is never modified, whatever the sink does.
    pub fn save(&self, sink: &mut dyn SaveSink) -> Result<SaveStatus, SaveError> {
        match sink.save(self.store.snapshot()) {
            Ok(SaveStatus::Saved) => {
                self.notices.notify(Notice::info("Workflow saved"));
                Ok(SaveStatus::Saved)
            }
            Ok(SaveStatus::Queued) => Ok(SaveStatus::Queued),
            Err(e) => {
                self.notices
                    .notify(Notice::error(format!("Failed to save workflow: {e}")));
                Err(e)
            }
        }
    }

    /// Apply one action
    pub fn dispatch(&mut self, action: EditorAction) -> ActionOutcome {
        match action {
            EditorAction::AddNode { template, position } => {
                let position = match position {
                    Some(p) => p.clamp_non_negative(),
                    None => {
                        let slot = self.settings.spawn_position(self.spawned);
                        self.spawned += 1;
                        slot
                    }
                };
                ActionOutcome::NodeAdded(self.store.add_node(&template, position).id)
            }

            EditorAction::RemoveNode(id) => self.remove_node(id),

            EditorAction::RemoveConnection(id) => match self.store.remove_connection(id) {
                Some(_) => {
                    if self.selected_connection() == Some(id) {
                        self.interaction.selection = None;
                    }
                    ActionOutcome::ConnectionRemoved(id)
                }
                None => ActionOutcome::Unchanged,
            },

            EditorAction::SetNodeConfig { node, key, value } => {
                if self.store.set_node_config(node, key, value) {
                    ActionOutcome::ConfigUpdated(node)
                } else {
                    ActionOutcome::Unchanged
                }
            }

            EditorAction::Click(target) => {
                let outcome = self
                    .interaction
                    .connect
                    .click(target, &mut self.store, &self.registry);
                self.after_protocol(outcome)
            }

            EditorAction::BeginConnectionDrag { source, pointer } => {
                if !self.store.contains_node(source.node) {
                    return ActionOutcome::Unchanged;
                }
                let outcome = self.interaction.connect.begin_drag(source, pointer);
                self.after_protocol(outcome)
            }

            EditorAction::ReleaseConnectionDrag { target } => {
                let outcome = self
                    .interaction
                    .connect
                    .release(target, &mut self.store, &self.registry);
                self.after_protocol(outcome)
            }

            EditorAction::PointerDown { node, pointer } => {
                self.interaction.drag.pointer_down(node, pointer, &self.store);
                ActionOutcome::Unchanged
            }

            EditorAction::PointerMove(pointer) => {
                self.interaction.connect.pointer_moved(pointer);
                let node = self.interaction.drag.session().map(|s| s.node);
                match (node, self.interaction.drag.pointer_move(pointer, &mut self.store)) {
                    (Some(node), Some(position)) => ActionOutcome::NodeMoved(node, position),
                    _ => ActionOutcome::Unchanged,
                }
            }

            EditorAction::PointerUp => {
                let snap = self.snap_step();
                match self.interaction.drag.pointer_up(&mut self.store, snap) {
                    Some(session) => ActionOutcome::DragEnded(session.node),
                    None => ActionOutcome::Unchanged,
                }
            }

            EditorAction::PointerLeave => {
                self.interaction.connect.pointer_left();
                let snap = self.snap_step();
                match self.interaction.drag.pointer_left(&mut self.store, snap) {
                    Some(session) => ActionOutcome::DragEnded(session.node),
                    None => ActionOutcome::Unchanged,
                }
            }

            EditorAction::SelectConnection(id) => {
                if self.store.connection(id).is_none() {
                    return ActionOutcome::Unchanged;
                }
                self.interaction.connect.cancel();
                self.interaction.selection = Some(Selection::Connection(id));
                ActionOutcome::Selected(self.interaction.selection)
            }

            EditorAction::DeleteSelected => match self.interaction.selection {
                Some(Selection::Node(id)) => self.remove_node(id),
                Some(Selection::Connection(id)) => {
                    self.dispatch(EditorAction::RemoveConnection(id))
                }
                None => ActionOutcome::Unchanged,
            },

            EditorAction::Cancel => {
                let outcome = self.interaction.connect.cancel();
                let had_selection = self.interaction.selection.take().is_some();
                if had_selection || outcome != ProtocolOutcome::Ignored {
                    ActionOutcome::Selected(None)
                } else {
                    ActionOutcome::Unchanged
                }
            }
        }
    }

    fn snap_step(&self) -> Option<f32> {
        self.settings
            .snap_to_grid
            .then_some(self.settings.snap_size)
    }

    fn remove_node(&mut self, id: NodeId) -> ActionOutcome {
        let Some((_, removed)) = self.store.remove_node(id) else {
            return ActionOutcome::Unchanged;
        };
        let connections: Vec<ConnectionId> = removed.iter().map(|c| c.id).collect();

        self.interaction.connect.forget_node(id);
        self.interaction.drag.forget_node(id);
        self.interaction.selection = match self.interaction.selection {
            Some(Selection::Node(n)) if n == id => None,
            Some(Selection::Connection(c)) if connections.contains(&c) => None,
            other => other,
        };

        ActionOutcome::NodeRemoved {
            node: id,
            connections,
        }
    }

    fn after_protocol(&mut self, outcome: ProtocolOutcome) -> ActionOutcome {
        match &outcome {
            ProtocolOutcome::Pending(source) => {
                self.interaction.selection = Some(Selection::Node(source.node()));
            }
            ProtocolOutcome::Rejected(err) => {
                self.interaction.selection = None;
                self.notices.notify(Notice::rejected(err));
            }
            ProtocolOutcome::Connected(_) | ProtocolOutcome::Cancelled => {
                self.interaction.selection = None;
            }
            ProtocolOutcome::Ignored => {}
        }
        ActionOutcome::Connect(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConnectionError;
    use crate::node::BuiltinPalette;
    use crate::notice::{NoticeLevel, NoticeReceiver};
    use crate::port::{DataType, PortSchema};
    use crate::protocol::ConnectState;
    use crate::save::MemorySink;

    fn session() -> (EditorSession, NoticeReceiver) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let (notices, receiver) = NoticeSender::channel();
        (EditorSession::new(CanvasSettings::default(), notices), receiver)
    }

    fn add(session: &mut EditorSession, template: NodeTemplate, at: Point) -> NodeId {
        match session.dispatch(EditorAction::AddNode {
            template,
            position: Some(at),
        }) {
            ActionOutcome::NodeAdded(id) => id,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    fn node_a() -> NodeTemplate {
        NodeTemplate::named(NodeKind::DataSource, "A")
            .with_outputs(vec![PortSchema::new("o1", DataType::Object)])
    }

    fn node_b() -> NodeTemplate {
        NodeTemplate::named(NodeKind::AiModel, "B")
            .with_inputs(vec![PortSchema::new("i1", DataType::Object)])
    }

    /// A (data source, object output) connected to B (AI model, object input)
    fn connected() -> (EditorSession, NoticeReceiver, NodeId, NodeId) {
        let (mut s, rx) = session();
        let a = add(&mut s, node_a(), Point::ZERO);
        let b = add(&mut s, node_b(), Point::new(120.0, 80.0));
        s.dispatch(EditorAction::Click(Target::Node(a)));
        s.dispatch(EditorAction::Click(Target::Node(b)));
        (s, rx, a, b)
    }

    #[test]
    fn test_connect_data_source_to_model() {
        let (s, rx, _, b) = connected();
        assert_eq!(s.store().connection_count(), 1);
        assert!(s.store().node(b).unwrap().inputs[0].connected);
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_type_mismatch_posts_notice() {
        let (mut s, rx) = session();
        let text = add(
            &mut s,
            NodeTemplate::named(NodeKind::DataSource, "text")
                .with_outputs(vec![PortSchema::new("out", DataType::String)]),
            Point::ZERO,
        );
        let num = add(
            &mut s,
            NodeTemplate::named(NodeKind::Transform, "num")
                .with_inputs(vec![PortSchema::new("in", DataType::Number)]),
            Point::new(300.0, 0.0),
        );

        s.dispatch(EditorAction::Click(Target::Node(text)));
        let outcome = s.dispatch(EditorAction::Click(Target::Node(num)));
        assert!(matches!(
            outcome,
            ActionOutcome::Connect(ProtocolOutcome::Rejected(ConnectionError::TypeMismatch { .. }))
        ));
        assert_eq!(s.store().connection_count(), 0);
        assert_eq!(s.selected_node(), None);

        let notices = rx.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn test_delete_source_node_cascades() {
        let (mut s, _rx, a, b) = connected();
        let outcome = s.dispatch(EditorAction::RemoveNode(a));
        assert!(matches!(
            outcome,
            ActionOutcome::NodeRemoved { ref connections, .. } if connections.len() == 1
        ));
        assert!(s.store().node(a).is_none());
        assert_eq!(s.store().connection_count(), 0);
        assert!(!s.store().node(b).unwrap().inputs[0].connected);
        assert!(s.layout().edges.is_empty());
    }

    #[test]
    fn test_drag_node_b() {
        let (mut s, _rx, _, b) = connected();
        s.dispatch(EditorAction::PointerDown {
            node: b,
            pointer: Point::new(130.0, 85.0),
        });
        let outcome = s.dispatch(EditorAction::PointerMove(Point::new(200.0, 60.0)));
        assert_eq!(outcome, ActionOutcome::NodeMoved(b, Point::new(190.0, 55.0)));

        s.dispatch(EditorAction::PointerMove(Point::new(-500.0, -500.0)));
        assert_eq!(s.store().node(b).unwrap().position, Point::ZERO);

        assert_eq!(s.dispatch(EditorAction::PointerLeave), ActionOutcome::DragEnded(b));
        assert!(s.interaction().drag.session().is_none());
    }

    #[test]
    fn test_click_source_twice_cancels() {
        let (mut s, _rx) = session();
        let a = add(&mut s, node_a(), Point::ZERO);

        s.dispatch(EditorAction::Click(Target::Node(a)));
        s.dispatch(EditorAction::PointerMove(Point::new(300.0, 300.0)));
        assert_eq!(s.selected_node(), Some(a));
        assert!(s.preview().is_some());

        s.dispatch(EditorAction::Click(Target::Node(a)));
        assert_eq!(s.interaction().connect.state(), &ConnectState::Idle);
        assert_eq!(s.selected_node(), None);
        assert!(s.preview().is_none());
        assert_eq!(s.store().connection_count(), 0);
    }

    #[test]
    fn test_second_source_into_connected_input() {
        let (mut s, rx, a, b) = connected();
        let c = add(&mut s, node_a(), Point::new(0.0, 200.0));
        let original = s.store().connections().next().unwrap().clone();

        s.dispatch(EditorAction::Click(Target::Node(c)));
        let outcome = s.dispatch(EditorAction::Click(Target::Node(b)));
        assert!(matches!(
            outcome,
            ActionOutcome::Connect(ProtocolOutcome::Rejected(
                ConnectionError::InputAlreadyConnected { .. }
            ))
        ));
        assert_eq!(s.store().connection_count(), 1);
        assert_eq!(s.store().connections().next(), Some(&original));
        assert_eq!(original.source_node_id, a);
        assert_eq!(rx.drain().len(), 1);
    }

    #[test]
    fn test_delete_selected() {
        let (mut s, _rx, a, _) = connected();
        let id = s.store().connections().next().unwrap().id;

        assert!(matches!(
            s.dispatch(EditorAction::SelectConnection(id)),
            ActionOutcome::Selected(Some(Selection::Connection(_)))
        ));
        assert_eq!(
            s.dispatch(EditorAction::DeleteSelected),
            ActionOutcome::ConnectionRemoved(id)
        );
        assert_eq!(s.selected_connection(), None);

        s.dispatch(EditorAction::Click(Target::Node(a)));
        assert!(matches!(
            s.dispatch(EditorAction::DeleteSelected),
            ActionOutcome::NodeRemoved { node, .. } if node == a
        ));
        assert!(s.interaction().connect.pending_source().is_none());
        assert_eq!(s.dispatch(EditorAction::DeleteSelected), ActionOutcome::Unchanged);
    }

    #[test]
    fn test_removing_dragged_node_clears_drag() {
        let (mut s, _rx, _, b) = connected();
        s.dispatch(EditorAction::PointerDown {
            node: b,
            pointer: Point::new(120.0, 80.0),
        });
        s.dispatch(EditorAction::RemoveNode(b));
        assert!(s.interaction().drag.session().is_none());
        assert_eq!(
            s.dispatch(EditorAction::PointerMove(Point::new(1.0, 1.0))),
            ActionOutcome::Unchanged
        );
    }

    #[test]
    fn test_palette_nodes_cascade_into_free_slots() {
        let (mut s, _rx) = session();
        let first = s
            .add_from_source(&BuiltinPalette, NodeKind::DataSource, None)
            .unwrap();
        let second = s
            .add_from_source(&BuiltinPalette, NodeKind::AiModel, None)
            .unwrap();

        let settings = s.settings().clone();
        assert_eq!(s.store().node(first).unwrap().position, settings.spawn_position(0));
        assert_eq!(s.store().node(second).unwrap().position, settings.spawn_position(1));
    }

    #[test]
    fn test_snap_on_release() {
        let (notices, _rx) = NoticeSender::channel();
        let settings = CanvasSettings {
            snap_to_grid: true,
            ..CanvasSettings::default()
        };
        let mut s = EditorSession::new(settings, notices);
        let a = add(&mut s, node_a(), Point::ZERO);

        s.dispatch(EditorAction::PointerDown {
            node: a,
            pointer: Point::ZERO,
        });
        s.dispatch(EditorAction::PointerMove(Point::new(33.0, 47.0)));
        s.dispatch(EditorAction::PointerUp);
        assert_eq!(s.store().node(a).unwrap().position, Point::new(40.0, 40.0));
    }

    #[test]
    fn test_config_edits() {
        let (mut s, _rx) = session();
        let a = add(&mut s, node_a(), Point::ZERO);
        assert_eq!(
            s.dispatch(EditorAction::SetNodeConfig {
                node: a,
                key: "datasetId".into(),
                value: serde_json::json!(7),
            }),
            ActionOutcome::ConfigUpdated(a)
        );
        assert_eq!(s.store().node(a).unwrap().config["datasetId"], serde_json::json!(7));
    }

    #[test]
    fn test_save_reports_and_keeps_state() {
        let (s, rx, _, _) = connected();
        let before = s.store().snapshot();

        let mut sink = MemorySink::default();
        assert_eq!(s.save(&mut sink).unwrap(), SaveStatus::Saved);
        assert_eq!(sink.saved, vec![before.clone()]);

        sink.fail_with = Some("backend unavailable".into());
        assert!(s.save(&mut sink).is_err());
        assert_eq!(s.store().snapshot(), before);

        let levels: Vec<_> = rx.drain().into_iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![NoticeLevel::Info, NoticeLevel::Error]);
    }

    #[test]
    fn test_load_repairs_dangling_edges() {
        let (s, _rx, a, _) = connected();
        let mut snapshot = s.store().snapshot();
        snapshot.nodes.retain(|n| n.id != a);

        let (notices, rx) = NoticeSender::channel();
        let (loaded, report) =
            EditorSession::load(snapshot, LoadPolicy::Repair, CanvasSettings::default(), notices)
                .unwrap();
        assert_eq!(report.defects.len(), 1);
        assert_eq!(loaded.store().connection_count(), 0);
        let notices = rx.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn test_interaction_state_serializes() {
        let (mut s, _rx) = session();
        let a = add(&mut s, node_a(), Point::ZERO);
        s.dispatch(EditorAction::Click(Target::Node(a)));

        let json = serde_json::to_string(s.interaction()).unwrap();
        let state: InteractionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state.selection, Some(Selection::Node(a)));
        assert_eq!(state.connect.selected_node(), Some(a));
    }

    #[test]
    fn test_hit_testing_through_layout() {
        let (mut s, _rx, a, _) = connected();
        let anchor = *s
            .layout()
            .outputs
            .iter()
            .find(|(e, _)| e.node == a)
            .unwrap()
            .1;
        assert!(matches!(s.hit(anchor), Some(Hit::Output(e)) if e.node == a));
        assert_eq!(s.hit(Point::new(5000.0, 5000.0)), None);
    }
}
