// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canvas geometry: port anchors, edge curves and hit testing.
//!
//! Everything here is a pure function of node positions and port order.
//! [`LayoutCache`] memoizes [`compute_layout`] against the graph store's
//! revision counter so the canvas can ask for the layout every frame.

use crate::connection::{Connection, ConnectionId, Endpoint};
use crate::graph::GraphStore;
use crate::node::{Node, NodeId};
use crate::port::{PortDirection, PortId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A point (or offset) in canvas-local coordinates, origin at the top-left
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

impl Point {
    /// The origin
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    /// Create a new point
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates to be non-negative
    pub fn clamp_non_negative(self) -> Self {
        Self::new(self.x.max(0.0), self.y.max(0.0))
    }

    /// Round both coordinates to the nearest multiple of `step`
    pub fn snap(self, step: f32) -> Self {
        if step <= 0.0 {
            return self;
        }
        Self::new((self.x / step).round() * step, (self.y / step).round() * step)
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Point) -> f32 {
        let d = self - other;
        (d.x * d.x + d.y * d.y).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left corner
    pub min: Point,
    /// Bottom-right corner
    pub max: Point,
}

impl Rect {
    /// Rectangle from its top-left corner and size
    pub fn from_min_size(min: Point, width: f32, height: f32) -> Self {
        Self {
            min,
            max: Point::new(min.x + width, min.y + height),
        }
    }

    /// Whether the point lies inside (edges inclusive)
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Width
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Height
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// Node box dimensions used to place anchors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Node width; output anchors sit on the right edge
    pub node_width: f32,
    /// Height of the title bar above the first port row
    pub header_height: f32,
    /// Vertical distance between consecutive port rows
    pub port_spacing: f32,
    /// Hit radius around an anchor
    pub anchor_radius: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            node_width: 180.0,
            header_height: 24.0,
            port_spacing: 22.0,
            anchor_radius: 6.0,
        }
    }
}

impl GeometryConfig {
    fn row_offset(&self, index: usize) -> f32 {
        self.header_height + index as f32 * self.port_spacing + self.port_spacing / 2.0
    }
}

/// Anchor of the `index`-th input port (left edge)
pub fn input_anchor(node: &Node, index: usize, config: &GeometryConfig) -> Point {
    node.position + Point::new(0.0, config.row_offset(index))
}

/// Anchor of the `index`-th output port (right edge)
pub fn output_anchor(node: &Node, index: usize, config: &GeometryConfig) -> Point {
    node.position + Point::new(config.node_width, config.row_offset(index))
}

/// Anchor of a port by id, looking in the given direction
pub fn port_anchor(
    node: &Node,
    port: PortId,
    direction: PortDirection,
    config: &GeometryConfig,
) -> Option<Point> {
    match direction {
        PortDirection::Input => node.input_index(port).map(|i| input_anchor(node, i, config)),
        PortDirection::Output => node.output_index(port).map(|i| output_anchor(node, i, config)),
    }
}

/// Bounding box of a node
pub fn node_rect(node: &Node, config: &GeometryConfig) -> Rect {
    let rows = node.inputs.len().max(node.outputs.len());
    let height = config.header_height + rows as f32 * config.port_spacing + 8.0;
    Rect::from_min_size(node.position, config.node_width, height)
}

/// Cubic Bézier edge from an output anchor to an input anchor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePath {
    /// Start (source anchor)
    pub from: Point,
    /// First control point
    pub ctrl1: Point,
    /// Second control point
    pub ctrl2: Point,
    /// End (target anchor)
    pub to: Point,
}

impl EdgePath {
    /// Curve with control points at one and two thirds of the horizontal
    /// span, each held at its own endpoint's height.
    pub fn between(from: Point, to: Point) -> Self {
        let dx = to.x - from.x;
        Self {
            from,
            ctrl1: Point::new(from.x + dx / 3.0, from.y),
            ctrl2: Point::new(from.x + dx * 2.0 / 3.0, to.y),
            to,
        }
    }

    /// Evaluate the curve at `t` in `[0, 1]`
    pub fn point_at(&self, t: f32) -> Point {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        let b0 = u * u * u;
        let b1 = 3.0 * u * u * t;
        let b2 = 3.0 * u * t * t;
        let b3 = t * t * t;
        Point::new(
            b0 * self.from.x + b1 * self.ctrl1.x + b2 * self.ctrl2.x + b3 * self.to.x,
            b0 * self.from.y + b1 * self.ctrl1.y + b2 * self.ctrl2.y + b3 * self.to.y,
        )
    }

    /// Polyline approximation with `segments` pieces
    pub fn flatten(&self, segments: usize) -> Vec<Point> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point_at(i as f32 / segments as f32))
            .collect()
    }

    /// SVG path data (`M … C …`)
    pub fn to_svg_path(&self) -> String {
        format!(
            "M {} {} C {} {}, {} {}, {} {}",
            self.from.x,
            self.from.y,
            self.ctrl1.x,
            self.ctrl1.y,
            self.ctrl2.x,
            self.ctrl2.y,
            self.to.x,
            self.to.y
        )
    }
}

/// Renderable geometry for a whole graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    /// Node bounding boxes
    pub nodes: IndexMap<NodeId, Rect>,
    /// Anchor of every input port
    pub inputs: IndexMap<Endpoint, Point>,
    /// Anchor of every output port
    pub outputs: IndexMap<Endpoint, Point>,
    /// Curve of every connection
    pub edges: IndexMap<ConnectionId, EdgePath>,
}

impl Layout {
    /// Curve for a connection
    pub fn edge(&self, id: ConnectionId) -> Option<&EdgePath> {
        self.edges.get(&id)
    }

    /// Bounding box of a node
    pub fn node_rect(&self, id: NodeId) -> Option<&Rect> {
        self.nodes.get(&id)
    }
}

/// Derive the layout of `nodes` and `connections`.
pub fn compute_layout<'a>(
    nodes: impl IntoIterator<Item = &'a Node>,
    connections: impl IntoIterator<Item = &'a Connection>,
    config: &GeometryConfig,
) -> Layout {
    let mut layout = Layout::default();

    for node in nodes {
        layout.nodes.insert(node.id, node_rect(node, config));
        for (i, port) in node.inputs.iter().enumerate() {
            layout
                .inputs
                .insert(Endpoint::new(node.id, port.id), input_anchor(node, i, config));
        }
        for (i, port) in node.outputs.iter().enumerate() {
            layout
                .outputs
                .insert(Endpoint::new(node.id, port.id), output_anchor(node, i, config));
        }
    }

    for connection in connections {
        // Both anchors exist while the store keeps referential integrity.
        let from = layout.outputs.get(&connection.source()).copied();
        let to = layout.inputs.get(&connection.target()).copied();
        if let (Some(from), Some(to)) = (from, to) {
            layout.edges.insert(connection.id, EdgePath::between(from, to));
        }
    }

    layout
}

/// Live preview curve from a pending source output to the pointer
pub fn preview_edge(
    node: &Node,
    output: PortId,
    pointer: Point,
    config: &GeometryConfig,
) -> Option<EdgePath> {
    let from = port_anchor(node, output, PortDirection::Output, config)?;
    Some(EdgePath::between(from, pointer))
}

/// What lies under a canvas point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    /// An input anchor
    Input(Endpoint),
    /// An output anchor
    Output(Endpoint),
    /// A node body
    Node(NodeId),
}

/// Find the topmost anchor or node at `point`.
///
/// Later nodes are drawn on top of earlier ones and are tested first. Within
/// a node, its anchors win over its body.
pub fn hit_test(layout: &Layout, point: Point, config: &GeometryConfig) -> Option<Hit> {
    let near = |anchor: &Point| anchor.distance(point) <= config.anchor_radius;

    for (node_id, rect) in layout.nodes.iter().rev() {
        let output = layout
            .outputs
            .iter()
            .find(|(endpoint, anchor)| endpoint.node == *node_id && near(anchor));
        if let Some((endpoint, _)) = output {
            return Some(Hit::Output(*endpoint));
        }

        let input = layout
            .inputs
            .iter()
            .find(|(endpoint, anchor)| endpoint.node == *node_id && near(anchor));
        if let Some((endpoint, _)) = input {
            return Some(Hit::Input(*endpoint));
        }

        if rect.contains(point) {
            return Some(Hit::Node(*node_id));
        }
    }

    None
}

/// Memoized [`compute_layout`] keyed by store revision and config
#[derive(Debug, Default)]
pub struct LayoutCache {
    key: Option<(u64, GeometryConfig)>,
    layout: Layout,
}

impl LayoutCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout for the store's current revision, recomputed only when stale
    pub fn get(&mut self, store: &GraphStore, config: &GeometryConfig) -> &Layout {
        let key = (store.revision(), *config);
        if self.key != Some(key) {
            self.layout = compute_layout(store.nodes(), store.connections(), config);
            self.key = Some(key);
        }
        &self.layout
    }

    /// Drop the cached layout
    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
