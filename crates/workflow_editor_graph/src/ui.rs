// SPDX-License-Identifier: MIT OR Apache-2.0
//! egui canvas for an [`EditorSession`].
//!
//! The canvas owns no graph state. Each frame it reads the session's layout
//! to paint nodes, anchors and edges, and turns pointer and key input into
//! [`EditorAction`]s. Graph coordinates are screen coordinates relative to
//! the canvas origin, shifted by the pan offset.

use crate::connection::Endpoint;
use crate::geometry::{EdgePath, Hit, Point};
use crate::notice::{Notice, NoticeLevel, NoticeReceiver};
use crate::protocol::Target;
use crate::session::{EditorAction, EditorSession};
use egui::{Color32, Pos2, Rect, Stroke, Vec2};
use std::collections::VecDeque;

const NODE_ROUNDING: f32 = 6.0;
const NODE_SHADOW_OFFSET: f32 = 3.0;
const PORT_PADDING: f32 = 12.0;
const CONNECTION_THICKNESS: f32 = 2.5;
const EDGE_PICK_DISTANCE: f32 = 5.0;
const GRID_SPACING: f32 = 20.0;
const MAX_TOASTS: usize = 5;

/// View state of the canvas widget
#[derive(Debug, Default)]
pub struct CanvasView {
    /// Pan offset in screen pixels
    pub pan: Vec2,
    /// Draw the background grid
    pub show_grid: bool,
    origin: Pos2,
    last_pointer: Option<Point>,
    panning: bool,
    toasts: VecDeque<Notice>,
}

impl CanvasView {
    /// Create a view with the grid enabled
    pub fn new() -> Self {
        Self {
            show_grid: true,
            ..Self::default()
        }
    }

    /// Graph point under a screen position
    pub fn screen_to_graph(&self, pos: Pos2) -> Point {
        let p = pos - self.origin - self.pan;
        Point::new(p.x, p.y)
    }

    /// Screen position of a graph point
    pub fn graph_to_screen(&self, point: Point) -> Pos2 {
        self.origin + self.pan + Vec2::new(point.x, point.y)
    }

    /// Move pending notices from `receiver` into the toast list
    pub fn absorb_notices(&mut self, receiver: &NoticeReceiver) {
        for notice in receiver.drain() {
            if self.toasts.len() == MAX_TOASTS {
                self.toasts.pop_front();
            }
            self.toasts.push_back(notice);
        }
    }

    /// Notices currently shown
    pub fn toasts(&self) -> impl Iterator<Item = &Notice> {
        self.toasts.iter()
    }

    /// Clear shown notices
    pub fn dismiss_toasts(&mut self) {
        self.toasts.clear();
    }

    /// Paint the canvas and feed this frame's input to `session`
    pub fn show(&mut self, ui: &mut egui::Ui, session: &mut EditorSession) -> egui::Response {
        let rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
        self.origin = rect.min;

        self.handle_input(ui, &response, session);

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_rgb(30, 30, 32));
        if self.show_grid {
            self.draw_grid(&painter, rect);
        }
        self.draw_edges(&painter, session);
        self.draw_preview(&painter, session);
        self.draw_nodes(&painter, session);
        self.draw_toasts(&painter, rect);

        response
    }

    fn handle_input(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        session: &mut EditorSession,
    ) {
        let hover = ui.input(|i| i.pointer.hover_pos()).filter(|p| response.rect.contains(*p));
        let pointer = hover.map(|p| self.screen_to_graph(p));

        match (pointer, self.last_pointer) {
            (Some(p), last) if last != Some(p) => {
                session.dispatch(EditorAction::PointerMove(p));
            }
            (None, Some(_)) => {
                session.dispatch(EditorAction::PointerLeave);
            }
            _ => {}
        }
        self.last_pointer = pointer;

        if response.drag_started_by(egui::PointerButton::Primary) {
            let origin = ui
                .input(|i| i.pointer.press_origin())
                .map(|p| self.screen_to_graph(p));
            if let Some(origin) = origin {
                match session.hit(origin) {
                    Some(Hit::Output(source)) => {
                        session.dispatch(EditorAction::BeginConnectionDrag {
                            source,
                            pointer: origin,
                        });
                    }
                    Some(Hit::Node(node)) => {
                        session.dispatch(EditorAction::PointerDown {
                            node,
                            pointer: origin,
                        });
                    }
                    Some(Hit::Input(_)) => {}
                    None => self.panning = true,
                }
            }
        }

        if response.dragged_by(egui::PointerButton::Middle) {
            self.panning = true;
        }
        if self.panning && response.dragged() {
            self.pan += response.drag_delta();
        }

        if response.drag_stopped() {
            self.panning = false;
            let target = pointer.and_then(|p| session.hit(p)).map(hit_target);
            session.dispatch(EditorAction::ReleaseConnectionDrag { target });
            session.dispatch(EditorAction::PointerUp);
        }

        if response.clicked() {
            if let Some(p) = pointer {
                self.click(p, session);
            }
        }

        let (escape, delete) = ui.input(|i| {
            (
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
            )
        });
        if escape {
            session.dispatch(EditorAction::Cancel);
        }
        if delete {
            session.dispatch(EditorAction::DeleteSelected);
        }
    }

    fn click(&self, point: Point, session: &mut EditorSession) {
        if let Some(hit) = session.hit(point) {
            session.dispatch(EditorAction::Click(hit_target(hit)));
            return;
        }

        let segments = session.settings().curve_segments;
        let picked = session
            .layout()
            .edges
            .iter()
            .find(|(_, path)| distance_to_path(path, point, segments) <= EDGE_PICK_DISTANCE)
            .map(|(id, _)| *id);
        match picked {
            Some(id) => session.dispatch(EditorAction::SelectConnection(id)),
            None => session.dispatch(EditorAction::Cancel),
        };
    }

    fn draw_grid(&self, painter: &egui::Painter, rect: Rect) {
        let color = Color32::from_rgba_unmultiplied(60, 60, 60, 100);
        let offset = Vec2::new(
            self.pan.x.rem_euclid(GRID_SPACING),
            self.pan.y.rem_euclid(GRID_SPACING),
        );

        let mut x = rect.left() + offset.x;
        while x < rect.right() {
            painter.line_segment(
                [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
                Stroke::new(1.0, color),
            );
            x += GRID_SPACING;
        }
        let mut y = rect.top() + offset.y;
        while y < rect.bottom() {
            painter.line_segment(
                [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
                Stroke::new(1.0, color),
            );
            y += GRID_SPACING;
        }
    }

    fn draw_path(&self, painter: &egui::Painter, path: &EdgePath, segments: usize, stroke: Stroke) {
        let points: Vec<Pos2> = path
            .flatten(segments)
            .into_iter()
            .map(|p| self.graph_to_screen(p))
            .collect();
        painter.add(egui::Shape::line(points, stroke));
    }

    fn draw_edges(&self, painter: &egui::Painter, session: &mut EditorSession) {
        let segments = session.settings().curve_segments;
        let selected = session.selected_connection();
        let colors: Vec<_> = session
            .store()
            .connections()
            .map(|c| (c.id, c.data_type.color()))
            .collect();

        let layout = session.layout();
        for (id, [r, g, b]) in colors {
            let Some(path) = layout.edge(id) else {
                continue;
            };
            let stroke = if selected == Some(id) {
                Stroke::new(CONNECTION_THICKNESS + 1.5, Color32::WHITE)
            } else {
                Stroke::new(CONNECTION_THICKNESS, Color32::from_rgb(r, g, b))
            };
            self.draw_path(painter, path, segments, stroke);
        }
    }

    fn draw_preview(&self, painter: &egui::Painter, session: &EditorSession) {
        if let Some(path) = session.preview() {
            let stroke = Stroke::new(CONNECTION_THICKNESS, Color32::from_gray(180));
            self.draw_path(painter, &path, session.settings().curve_segments, stroke);
        }
    }

    fn draw_nodes(&self, painter: &egui::Painter, session: &mut EditorSession) {
        let config = session.settings().geometry;
        let selected = session.selected_node();
        let layout = session.layout().clone();

        for node in session.store().nodes() {
            let Some(bounds) = layout.node_rect(node.id) else {
                continue;
            };
            let screen_rect = Rect::from_min_max(
                self.graph_to_screen(bounds.min),
                self.graph_to_screen(bounds.max),
            );

            painter.rect_filled(
                screen_rect.translate(Vec2::splat(NODE_SHADOW_OFFSET)),
                NODE_ROUNDING,
                Color32::from_rgba_unmultiplied(0, 0, 0, 60),
            );
            painter.rect_filled(screen_rect, NODE_ROUNDING, Color32::from_rgb(45, 45, 48));

            let header_rect = Rect::from_min_size(
                screen_rect.min,
                Vec2::new(screen_rect.width(), config.header_height),
            );
            let [r, g, b] = node.kind.color();
            painter.rect_filled(
                header_rect,
                egui::Rounding {
                    nw: NODE_ROUNDING,
                    ne: NODE_ROUNDING,
                    sw: 0.0,
                    se: 0.0,
                },
                Color32::from_rgb(r, g, b),
            );
            painter.text(
                header_rect.center(),
                egui::Align2::CENTER_CENTER,
                &node.name,
                egui::FontId::proportional(12.0),
                Color32::WHITE,
            );

            if selected == Some(node.id) {
                painter.rect_stroke(
                    screen_rect,
                    NODE_ROUNDING,
                    Stroke::new(2.0, Color32::from_rgb(100, 150, 255)),
                );
            }

            for port in &node.inputs {
                let endpoint = Endpoint::new(node.id, port.id);
                if let Some(anchor) = layout.inputs.get(&endpoint) {
                    let pos = self.graph_to_screen(*anchor);
                    draw_anchor(painter, pos, port.data_type.color(), config.anchor_radius);
                    painter.text(
                        Pos2::new(pos.x + PORT_PADDING, pos.y),
                        egui::Align2::LEFT_CENTER,
                        &port.name,
                        egui::FontId::proportional(10.0),
                        Color32::from_gray(200),
                    );
                }
            }
            for port in &node.outputs {
                let endpoint = Endpoint::new(node.id, port.id);
                if let Some(anchor) = layout.outputs.get(&endpoint) {
                    let pos = self.graph_to_screen(*anchor);
                    draw_anchor(painter, pos, port.data_type.color(), config.anchor_radius);
                    painter.text(
                        Pos2::new(pos.x - PORT_PADDING, pos.y),
                        egui::Align2::RIGHT_CENTER,
                        &port.name,
                        egui::FontId::proportional(10.0),
                        Color32::from_gray(200),
                    );
                }
            }
        }
    }

    fn draw_toasts(&self, painter: &egui::Painter, rect: Rect) {
        let mut y = rect.bottom() - 12.0;
        for notice in self.toasts.iter().rev() {
            let color = match notice.level {
                NoticeLevel::Info => Color32::from_gray(200),
                NoticeLevel::Warning => Color32::from_rgb(230, 180, 80),
                NoticeLevel::Error => Color32::from_rgb(230, 90, 90),
            };
            painter.text(
                Pos2::new(rect.left() + 12.0, y),
                egui::Align2::LEFT_BOTTOM,
                &notice.message,
                egui::FontId::proportional(11.0),
                color,
            );
            y -= 16.0;
        }
    }
}

fn draw_anchor(painter: &egui::Painter, pos: Pos2, [r, g, b]: [u8; 3], radius: f32) {
    painter.circle_filled(pos, radius, Color32::from_rgb(r, g, b));
    painter.circle_stroke(pos, radius, Stroke::new(1.0, Color32::from_gray(30)));
}

fn hit_target(hit: Hit) -> Target {
    match hit {
        Hit::Input(e) => Target::Input(e),
        Hit::Output(e) => Target::Output(e),
        Hit::Node(id) => Target::Node(id),
    }
}

/// Shortest distance from `point` to the flattened curve
fn distance_to_path(path: &EdgePath, point: Point, segments: usize) -> f32 {
    path.flatten(segments)
        .windows(2)
        .map(|w| distance_to_segment(point, w[0], w[1]))
        .fold(f32::INFINITY, f32::min)
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let ap = p - a;
    let t = ((ap.x * ab.x + ap.y * ab.y) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * ab.x, a.y + t * ab.y))
}
