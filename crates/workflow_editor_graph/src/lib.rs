// SPDX-License-Identifier: MIT OR Apache-2.0
//! Workflow graph editor core.
//!
//! Users place typed nodes (data sources, views, AI models, results,
//! transforms, outputs and automation triggers) on a canvas and wire
//! outputs to inputs. This crate holds everything below the pixels:
//!
//! - [`graph::GraphStore`]: nodes and connections with referential integrity
//! - [`port::PortTypeRegistry`]: which data types may flow into which
//! - [`protocol::ConnectionProtocol`]: the click/drag state machine for wiring
//! - [`drag::DragController`]: moving nodes
//! - [`geometry`]: anchors, curves, hit testing
//! - [`session::EditorSession`]: one place that applies [`session::EditorAction`]s
//! - [`ui::CanvasView`]: an egui canvas on top of a session
//!
//! Templates come in through [`node::TemplateSource`], snapshots go out
//! through [`save::SaveSink`], and user-facing messages flow through the
//! [`notice`] channel.

pub mod connection;
pub mod drag;
pub mod geometry;
pub mod graph;
pub mod node;
pub mod notice;
pub mod port;
pub mod protocol;
pub mod save;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod ui;

pub use connection::{Connection, ConnectionId, Endpoint};
pub use geometry::{EdgePath, GeometryConfig, Layout, Point};
pub use graph::{ConnectionError, GraphStore};
pub use node::{Node, NodeId, NodeKind, NodeTemplate, TemplateSource};
pub use notice::{Notice, NoticeLevel, NoticeReceiver, NoticeSender};
pub use port::{DataType, Port, PortDirection, PortId, PortTypeRegistry};
pub use protocol::{ConnectionProtocol, Target};
pub use save::{SaveError, SaveSink, SaveStatus};
pub use session::{ActionOutcome, EditorAction, EditorSession};
pub use settings::CanvasSettings;
pub use snapshot::{GraphSnapshot, LoadPolicy};
