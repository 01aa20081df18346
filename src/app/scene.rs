use std::collections::HashSet;

use eframe::egui::{Painter, Pos2, Rect, Stroke, Vec2};

use crate::graph::{LAYER_ORDER, NetworkGraph, Node};
use crate::particles::ParticlePool;

use super::render_utils::{
    ACCENT, BACKGROUND, MUTED_LINK, NODE_OUTLINE, PARTICLE_HIGHLIGHT, blend_color, layer_color,
    with_alpha, world_to_screen,
};

pub(super) const MIN_ZOOM: f32 = 0.35;
pub(super) const MAX_ZOOM: f32 = 6.0;
pub(super) const CLICK_THRESHOLD: f32 = 4.0;

const AUTO_CENTER_BLEND: f32 = 0.04;
const TARGET_FPS: f32 = 60.0;
const PULSE_DRAW_FLOOR: f32 = 0.05;
const ISOLATION_OUTSIDER_ALPHA: f32 = 0.12;
const FOCUS_DIM: f32 = 0.35;

#[derive(Clone, Copy, Default)]
pub(super) struct RenderStats {
    pub(super) links: usize,
    pub(super) nodes: usize,
    pub(super) particles: usize,
}

/// Pointer interaction states. Hover tracking only happens in `Idle`;
/// both active states resolve back to `Idle` on pointer release.
#[derive(Clone, Copy)]
pub(super) enum PointerState {
    Idle,
    Panning { origin: Pos2, last: Pos2 },
    Selecting { start: Pos2, end: Pos2 },
}

/// Owns the camera, interaction state, and the per-frame draw pipeline.
/// Reads node layout from the graph; the only node fields it writes are the
/// render-derived ones (base color/radius at load, pulse via the driver).
pub(super) struct SceneView {
    pub(super) camera_center: Vec2,
    pub(super) zoom: f32,
    auto_center: bool,
    pub(super) hovered: Option<u32>,
    pub(super) focused: Option<u32>,
    pub(super) isolation: Option<HashSet<u32>>,
    pub(super) pointer: PointerState,
    pub(super) isolate_mode: bool,
    link_density: f32,
    node_scale: f32,
    background_opacity: f32,
    measured_fps: f32,
    stats: RenderStats,
}

impl SceneView {
    pub(super) fn new() -> Self {
        Self {
            camera_center: Vec2::ZERO,
            zoom: 1.0,
            auto_center: true,
            hovered: None,
            focused: None,
            isolation: None,
            pointer: PointerState::Idle,
            isolate_mode: false,
            link_density: 1.0,
            node_scale: 1.0,
            background_opacity: 0.0,
            measured_fps: TARGET_FPS,
            stats: RenderStats::default(),
        }
    }

    /// Stamps render-derived base visuals onto freshly loaded nodes.
    pub(super) fn annotate_nodes(&self, nodes: &mut [Node]) {
        for node in nodes {
            node.base_color = layer_color(node.layer_index, LAYER_ORDER.len());
            node.base_radius = 2.1 + node.layer_index as f32 * 0.15;
        }
    }

    /// Picks an initial zoom that frames the whole layout.
    pub(super) fn fit_to_view(&mut self, rect: Rect, nodes: &[Node]) {
        let Some((min, max)) = finite_bounds(nodes) else {
            return;
        };

        let padding = 140.0;
        let width = (max.x - min.x + padding).max(1.0);
        let height = (max.y - min.y + padding).max(1.0);

        let zoom_x = rect.width().max(1.0) / width;
        let zoom_y = rect.height().max(1.0) / height;
        self.zoom = (zoom_x.min(zoom_y) * 0.9).clamp(MIN_ZOOM, MAX_ZOOM);
        self.camera_center = (min + max) * 0.5;
    }

    /// Eases the camera toward the layout centroid while the user is not
    /// panning or selecting.
    pub(super) fn update_camera(&mut self, nodes: &[Node]) {
        if !self.auto_center || nodes.is_empty() {
            return;
        }
        if !matches!(self.pointer, PointerState::Idle) {
            return;
        }

        if let Some((min, max)) = finite_bounds(nodes) {
            let centroid = (min + max) * 0.5;
            self.camera_center += (centroid - self.camera_center) * AUTO_CENTER_BLEND;
        }
    }

    pub(super) fn set_auto_center(&mut self, enabled: bool) {
        self.auto_center = enabled;
    }

    pub(super) fn auto_center(&self) -> bool {
        self.auto_center
    }

    pub(super) fn set_performance(&mut self, fps: f32) {
        if fps.is_finite() && fps > 0.0 {
            self.measured_fps = fps;
        }
    }

    pub(super) fn set_link_density(&mut self, value: f32) {
        if value.is_finite() {
            self.link_density = value.clamp(0.2, 1.5);
        }
    }

    pub(super) fn link_density(&self) -> f32 {
        self.link_density
    }

    pub(super) fn set_node_scale(&mut self, value: f32) {
        if value.is_finite() {
            self.node_scale = value.clamp(0.6, 2.5);
        }
    }

    pub(super) fn node_scale(&self) -> f32 {
        self.node_scale
    }

    pub(super) fn set_background_opacity(&mut self, value: f32) {
        if value.is_finite() {
            self.background_opacity = value.clamp(0.0, 0.8);
        }
    }

    pub(super) fn background_opacity(&self) -> f32 {
        self.background_opacity
    }

    pub(super) fn stats(&self) -> RenderStats {
        self.stats
    }

    pub(super) fn clear_focus_and_isolation(&mut self) {
        self.focused = None;
        self.isolation = None;
    }

    /// Combined fps/zoom detail budget; lower values raise draw strides.
    pub(super) fn density_factor(&self) -> f32 {
        let fps_factor = (self.measured_fps / TARGET_FPS).clamp(0.35, 1.2);
        let zoom_factor = (self.zoom / 1.1).clamp(0.4, 1.6);
        (fps_factor * zoom_factor).clamp(0.2, 1.6)
    }

    /// Spawn-side budget; slightly wider fps tolerance than the draw budget.
    pub(super) fn performance_factor(&self) -> f32 {
        let fps_factor = (self.measured_fps / TARGET_FPS).clamp(0.3, 1.0);
        let zoom_factor = (self.zoom / 1.1).clamp(0.4, 1.6);
        (fps_factor * zoom_factor).clamp(0.2, 1.6)
    }

    /// Focus is the clicked node if set, else the hovered one; its highlight
    /// set is the node plus its precomputed neighbors.
    pub(super) fn focus_state(&self, graph: &NetworkGraph) -> Option<(u32, HashSet<u32>)> {
        let active = self.focused.or(self.hovered)?;
        let mut ids: HashSet<u32> = graph.neighbors(active).cloned().unwrap_or_default();
        ids.insert(active);
        Some((active, ids))
    }

    fn isolation_active(&self) -> Option<&HashSet<u32>> {
        self.isolation.as_ref().filter(|set| !set.is_empty())
    }

    pub(super) fn draw(
        &mut self,
        painter: &Painter,
        rect: Rect,
        graph: &NetworkGraph,
        pool: &ParticlePool,
    ) {
        self.stats = RenderStats::default();

        if self.background_opacity > 0.0 {
            painter.rect_filled(rect, 0.0, with_alpha(BACKGROUND, self.background_opacity));
        }

        let focus = self.focus_state(graph);
        let density = self.density_factor();

        self.draw_links(painter, rect, graph, focus.as_ref(), density);
        self.draw_link_pulses(painter, rect, graph, focus.as_ref());
        self.draw_particles(painter, rect, pool, focus.as_ref(), density);
        self.draw_nodes(painter, rect, graph, focus.as_ref(), density);
        self.draw_selection_overlay(painter);
    }

    fn draw_links(
        &mut self,
        painter: &Painter,
        rect: Rect,
        graph: &NetworkGraph,
        focus: Option<&(u32, HashSet<u32>)>,
        density: f32,
    ) {
        let isolation = self.isolation_active();
        let link_factor = (density * self.link_density).clamp(0.2, 1.6);
        let mut stride = ((1.0 / link_factor).round() as usize).max(1);
        if focus.is_some() || isolation.is_some() {
            stride = 1;
        }

        let mut drawn = 0usize;
        for link in graph.links().iter().step_by(stride) {
            let in_isolation = isolation
                .map(|set| set.contains(&link.source) && set.contains(&link.target))
                .unwrap_or(true);
            let in_focus = focus
                .map(|(_, ids)| ids.contains(&link.source) && ids.contains(&link.target))
                .unwrap_or(false);

            let mut alpha = 0.25;
            if !in_isolation {
                alpha = 0.04;
            }
            if focus.is_some() {
                alpha = if in_focus { 0.55 } else { alpha * FOCUS_DIM };
            }
            if alpha < 0.01 {
                continue;
            }

            let start = world_to_screen(
                rect,
                self.camera_center,
                self.zoom,
                graph.nodes()[link.source as usize].pos,
            );
            let end = world_to_screen(
                rect,
                self.camera_center,
                self.zoom,
                graph.nodes()[link.target as usize].pos,
            );

            let color = if in_focus { ACCENT } else { MUTED_LINK };
            let width = if in_focus { 1.6 } else { 0.9 };
            painter.line_segment([start, end], Stroke::new(width, with_alpha(color, alpha)));
            drawn += 1;
        }
        self.stats.links = drawn;
    }

    /// Glow pass over recently pulsed links; always full stride so pulses are
    /// never dropped by the density budget.
    fn draw_link_pulses(
        &self,
        painter: &Painter,
        rect: Rect,
        graph: &NetworkGraph,
        focus: Option<&(u32, HashSet<u32>)>,
    ) {
        let isolation = self.isolation_active();

        for link in graph.links() {
            if link.pulse < PULSE_DRAW_FLOOR {
                continue;
            }
            if let Some(set) = isolation {
                if !(set.contains(&link.source) && set.contains(&link.target)) {
                    continue;
                }
            }
            if let Some((_, ids)) = focus {
                if !(ids.contains(&link.source) && ids.contains(&link.target)) {
                    continue;
                }
            }

            let start = world_to_screen(
                rect,
                self.camera_center,
                self.zoom,
                graph.nodes()[link.source as usize].pos,
            );
            let end = world_to_screen(
                rect,
                self.camera_center,
                self.zoom,
                graph.nodes()[link.target as usize].pos,
            );

            let alpha = 0.2 + link.pulse * 0.6;
            let width = 1.2 + link.pulse * 2.4;
            painter.line_segment([start, end], Stroke::new(width, with_alpha(ACCENT, alpha)));
        }
    }

    fn draw_particles(
        &mut self,
        painter: &Painter,
        rect: Rect,
        pool: &ParticlePool,
        focus: Option<&(u32, HashSet<u32>)>,
        density: f32,
    ) {
        let isolation = self.isolation_active();
        let stride = ((1.0 / density).round() as usize).max(1);

        let mut drawn = 0usize;
        for (index, particle) in pool.active().enumerate() {
            if index % stride != 0 {
                continue;
            }
            if let Some(set) = isolation {
                if !(set.contains(&particle.source) && set.contains(&particle.target)) {
                    continue;
                }
            }
            if let Some((_, ids)) = focus {
                if !(ids.contains(&particle.source) && ids.contains(&particle.target)) {
                    continue;
                }
            }

            let center = world_to_screen(rect, self.camera_center, self.zoom, particle.position);
            let alpha = particle.life.min(1.0);
            let radius = particle.size * 1.4 * self.zoom;

            painter.circle_filled(center, radius, with_alpha(ACCENT, 0.6 + alpha * 0.4));
            painter.circle_filled(
                center,
                radius * 0.5,
                with_alpha(PARTICLE_HIGHLIGHT, 0.2 + alpha * 0.3),
            );
            drawn += 1;
        }
        self.stats.particles = drawn;
    }

    fn draw_nodes(
        &mut self,
        painter: &Painter,
        rect: Rect,
        graph: &NetworkGraph,
        focus: Option<&(u32, HashSet<u32>)>,
        density: f32,
    ) {
        let isolation = self.isolation_active();
        let mut stride = ((1.0 / density).round() as usize).max(1);
        if focus.is_some() || isolation.is_some() || self.zoom > 1.4 {
            stride = 1;
        }

        let mut drawn = 0usize;
        for (index, node) in graph.nodes().iter().enumerate().step_by(stride) {
            let index = index as u32;
            let is_focused = focus.is_some_and(|(active, _)| *active == index);
            let is_neighbor = focus.is_some_and(|(_, ids)| ids.contains(&index));
            let in_isolation = isolation.map(|set| set.contains(&index)).unwrap_or(true);

            let mut intensity = (node.activation * 0.9 + node.pulse * 0.5).clamp(0.0, 1.0);
            if is_neighbor {
                intensity = (intensity + 0.2).clamp(0.0, 1.0);
            }
            if is_focused {
                intensity = (intensity + 0.35).clamp(0.0, 1.0);
            }

            let color = blend_color(node.base_color, ACCENT, intensity);
            let focus_bonus = if is_focused {
                1.2
            } else if is_neighbor {
                0.4
            } else {
                0.0
            };
            let radius =
                (node.base_radius + intensity * 1.2 + focus_bonus) * self.node_scale * self.zoom;

            let mut alpha = if in_isolation {
                1.0
            } else {
                ISOLATION_OUTSIDER_ALPHA
            };
            if focus.is_some() && !is_neighbor && !is_focused {
                alpha *= FOCUS_DIM;
            }

            let center = world_to_screen(rect, self.camera_center, self.zoom, node.pos);
            painter.circle_filled(center, radius, with_alpha(color, alpha));

            if is_focused {
                painter.circle_stroke(center, radius, Stroke::new(1.8, with_alpha(ACCENT, alpha)));
            } else if is_neighbor {
                painter.circle_stroke(
                    center,
                    radius,
                    Stroke::new(1.0, with_alpha(NODE_OUTLINE, alpha)),
                );
            } else if intensity > 0.12 {
                painter.circle_stroke(
                    center,
                    radius,
                    Stroke::new(0.6, with_alpha(NODE_OUTLINE, alpha)),
                );
            }
            drawn += 1;
        }
        self.stats.nodes = drawn;
    }

    fn draw_selection_overlay(&self, painter: &Painter) {
        let PointerState::Selecting { start, end } = self.pointer else {
            return;
        };

        let selection = Rect::from_two_pos(start, end);
        painter.rect_filled(selection, 0.0, with_alpha(MUTED_LINK, 0.12));
        painter.rect_stroke(
            selection,
            0.0,
            Stroke::new(1.0, with_alpha(MUTED_LINK, 0.5)),
            eframe::egui::StrokeKind::Middle,
        );
    }
}

fn finite_bounds(nodes: &[Node]) -> Option<(Vec2, Vec2)> {
    let mut min = Vec2::new(f32::INFINITY, f32::INFINITY);
    let mut max = Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);

    for node in nodes {
        if !node.pos.x.is_finite() || !node.pos.y.is_finite() {
            continue;
        }
        min.x = min.x.min(node.pos.x);
        min.y = min.y.min(node.pos.y);
        max.x = max.x.max(node.pos.x);
        max.y = max.y.max(node.pos.y);
    }

    (min.x.is_finite() && min.y.is_finite()).then_some((min, max))
}
