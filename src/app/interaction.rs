use std::collections::HashSet;

use eframe::egui::{self, Key, Pos2, Rect, Ui};

use crate::graph::NetworkGraph;

use super::render_utils::{screen_to_world, world_to_screen};
use super::scene::{CLICK_THRESHOLD, MAX_ZOOM, MIN_ZOOM, PointerState, SceneView};

const WHEEL_SENSITIVITY: f32 = 0.0012;
const PICK_PADDING: f32 = 8.0;

impl SceneView {
    pub(super) fn handle_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        self.zoom_at(rect, pointer, (scroll * WHEEL_SENSITIVITY).exp());
    }

    /// Rescales around a screen anchor: the world point under the cursor stays
    /// under the cursor.
    pub(super) fn zoom_at(&mut self, rect: Rect, anchor: Pos2, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }

        let world_before = screen_to_world(rect, self.camera_center, self.zoom, anchor);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.camera_center = world_before - (anchor - rect.center()) / self.zoom;
    }

    pub(super) fn handle_pointer(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
        graph: &NetworkGraph,
    ) {
        if response.double_clicked() {
            self.clear_focus_and_isolation();
            self.pointer = PointerState::Idle;
            return;
        }

        let pointer = ui.input(|input| input.pointer.latest_pos());
        let pressed = ui.input(|input| input.pointer.primary_pressed());
        let released = ui.input(|input| input.pointer.primary_released());
        let shift = ui.input(|input| input.modifiers.shift);

        match self.pointer {
            PointerState::Idle => {
                self.hovered = response
                    .hover_pos()
                    .and_then(|pos| self.pick_node(rect, pos, graph));

                if pressed && response.hovered() {
                    if let Some(pos) = pointer {
                        self.pointer = if shift || self.isolate_mode {
                            PointerState::Selecting {
                                start: pos,
                                end: pos,
                            }
                        } else {
                            PointerState::Panning {
                                origin: pos,
                                last: pos,
                            }
                        };
                    }
                }
            }
            PointerState::Panning { origin, last } => {
                let current = pointer.unwrap_or(last);
                self.camera_center -= (current - last) / self.zoom;

                if released {
                    if (current - origin).length() <= CLICK_THRESHOLD {
                        // A press that barely moved is a click, not a pan.
                        self.camera_center += (current - origin) / self.zoom;
                        self.resolve_click(rect, current, graph);
                    }
                    self.pointer = PointerState::Idle;
                } else {
                    self.pointer = PointerState::Panning {
                        origin,
                        last: current,
                    };
                }
            }
            PointerState::Selecting { start, end } => {
                let current = pointer.unwrap_or(end);
                if released {
                    self.apply_selection(rect, start, current, graph);
                    self.pointer = PointerState::Idle;
                } else {
                    self.pointer = PointerState::Selecting {
                        start,
                        end: current,
                    };
                }
            }
        }
    }

    pub(super) fn handle_keys(&mut self, ui: &Ui) {
        if ui.input(|input| input.key_pressed(Key::Escape)) {
            self.clear_focus_and_isolation();
        }
    }

    fn resolve_click(&mut self, rect: Rect, pos: Pos2, graph: &NetworkGraph) {
        match self.pick_node(rect, pos, graph) {
            Some(index) if self.focused == Some(index) => self.focused = None,
            Some(index) => self.focused = Some(index),
            None => self.focused = None,
        }
    }

    /// Replaces the isolation set with the nodes inside the dragged rectangle.
    /// An empty drag clears isolation instead of isolating nothing.
    pub(super) fn apply_selection(
        &mut self,
        rect: Rect,
        start: Pos2,
        end: Pos2,
        graph: &NetworkGraph,
    ) {
        let a = screen_to_world(rect, self.camera_center, self.zoom, start);
        let b = screen_to_world(rect, self.camera_center, self.zoom, end);
        let world = Rect::from_two_pos(a.to_pos2(), b.to_pos2());

        let selected: HashSet<u32> = graph
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, node)| world.contains(node.pos.to_pos2()))
            .map(|(index, _)| index as u32)
            .collect();

        if selected.is_empty() {
            self.isolation = None;
        } else {
            if let Some(focused) = self.focused {
                if !selected.contains(&focused) {
                    self.focused = None;
                }
            }
            self.isolation = Some(selected);
        }
    }

    /// Nearest node under the cursor within its drawn radius plus a small
    /// zoom-invariant padding. Isolated-out nodes are not pickable.
    pub(super) fn pick_node(&self, rect: Rect, pointer: Pos2, graph: &NetworkGraph) -> Option<u32> {
        graph
            .nodes()
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                self.isolation
                    .as_ref()
                    .filter(|set| !set.is_empty())
                    .map(|set| set.contains(&(*index as u32)))
                    .unwrap_or(true)
            })
            .filter_map(|(index, node)| {
                let center = world_to_screen(rect, self.camera_center, self.zoom, node.pos);
                let reach = node.base_radius * self.node_scale() * self.zoom + PICK_PADDING;
                let distance = center.distance(pointer);
                (distance <= reach).then_some((index as u32, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Topology, TopologyConnection, TopologyMetadata, TopologyNode};
    use eframe::egui::{pos2, vec2};

    fn viewport() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(1200.0, 800.0))
    }

    fn loaded_graph() -> NetworkGraph {
        let mut graph = NetworkGraph::default();
        graph.load_topology(&Topology {
            metadata: TopologyMetadata::default(),
            nodes: vec![
                TopologyNode {
                    id: "a".into(),
                    layer: "encoder.0".into(),
                    index: 0,
                },
                TopologyNode {
                    id: "b".into(),
                    layer: "encoder.2".into(),
                    index: 0,
                },
                TopologyNode {
                    id: "c".into(),
                    layer: "decoder.6".into(),
                    index: 0,
                },
            ],
            connections: vec![TopologyConnection {
                source: "a".into(),
                target: "b".into(),
                weight: 1.0,
            }],
        });
        graph
    }

    #[test]
    fn zoom_stays_clamped_for_any_wheel_sequence() {
        let mut scene = SceneView::new();
        let rect = viewport();

        for _ in 0..100 {
            scene.zoom_at(rect, rect.center(), 1.5);
        }
        assert_eq!(scene.zoom, MAX_ZOOM);

        for _ in 0..100 {
            scene.zoom_at(rect, rect.center(), 0.5);
        }
        assert_eq!(scene.zoom, MIN_ZOOM);
    }

    #[test]
    fn zoom_keeps_anchor_point_fixed() {
        let mut scene = SceneView::new();
        let rect = viewport();
        scene.camera_center = vec2(40.0, -25.0);
        scene.zoom = 1.3;

        let anchor = pos2(900.0, 150.0);
        let world_before = screen_to_world(rect, scene.camera_center, scene.zoom, anchor);

        scene.zoom_at(rect, anchor, 1.4);
        let world_after = screen_to_world(rect, scene.camera_center, scene.zoom, anchor);
        assert!((world_after - world_before).length() < 1e-3);

        scene.zoom_at(rect, anchor, 0.55);
        let world_after = screen_to_world(rect, scene.camera_center, scene.zoom, anchor);
        assert!((world_after - world_before).length() < 1e-3);
    }

    #[test]
    fn degenerate_zoom_factors_are_ignored() {
        let mut scene = SceneView::new();
        let rect = viewport();

        scene.zoom_at(rect, rect.center(), f32::NAN);
        assert_eq!(scene.zoom, 1.0);
        scene.zoom_at(rect, rect.center(), 0.0);
        assert_eq!(scene.zoom, 1.0);
    }

    #[test]
    fn selection_rectangle_builds_isolation_set() {
        let graph = loaded_graph();
        let mut scene = SceneView::new();
        let rect = viewport();
        // Identity-ish camera: world origin at screen center, zoom 1.
        scene.camera_center = vec2(0.0, 0.0);
        scene.zoom = 1.0;

        let positions: Vec<_> = graph.nodes().iter().map(|node| node.pos).collect();
        let first = rect.center() + positions[0];

        // A rectangle tightly around the first node isolates only it.
        scene.apply_selection(
            rect,
            first + vec2(-4.0, -4.0),
            first + vec2(4.0, 4.0),
            &graph,
        );
        let set = scene.isolation.as_ref().unwrap();
        assert!(set.contains(&0));
        assert_eq!(set.len(), 1);

        // Focus on an excluded node is dropped by the next selection.
        scene.focused = Some(2);
        scene.apply_selection(
            rect,
            first + vec2(-4.0, -4.0),
            first + vec2(4.0, 4.0),
            &graph,
        );
        assert_eq!(scene.focused, None);

        // An empty drag clears isolation.
        let nowhere = pos2(rect.max.x - 1.0, rect.max.y - 1.0);
        scene.apply_selection(rect, nowhere, nowhere, &graph);
        assert!(scene.isolation.is_none());
    }

    #[test]
    fn picking_finds_nearest_node_and_respects_isolation() {
        let graph = loaded_graph();
        let mut scene = SceneView::new();
        let rect = viewport();
        scene.camera_center = vec2(0.0, 0.0);
        scene.zoom = 1.0;

        let target = rect.center() + graph.nodes()[1].pos;
        assert_eq!(scene.pick_node(rect, target, &graph), Some(1));

        // Far away from every node: no pick.
        assert_eq!(scene.pick_node(rect, pos2(2.0, 2.0), &graph), None);

        // Isolation hides non-members from picking.
        scene.isolation = Some([0u32].into_iter().collect());
        assert_eq!(scene.pick_node(rect, target, &graph), None);
    }
}
