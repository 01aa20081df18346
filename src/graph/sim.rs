use eframe::egui::Vec2;

use super::quadtree::{CollisionParams, QuadNode, accumulate_collisions, accumulate_repulsion};
use super::{Link, Node};

const ALPHA_START: f32 = 1.0;
const ALPHA_DECAY: f32 = 0.02;
const ALPHA_MIN: f32 = 0.001;
const VELOCITY_DECAY: f32 = 0.4;

const LINK_STRENGTH_SCALE: f32 = 0.85;
const REPULSION_STRENGTH: f32 = -90.0;
const REPULSION_DISTANCE_MAX: f32 = 220.0;
const BARNES_HUT_THETA: f32 = 0.9;
const CENTER_STRENGTH: f32 = 0.25;
const LAYER_ANCHOR_STRENGTH: f32 = 0.08;
const VERTICAL_ANCHOR_STRENGTH: f32 = 0.06;
const COLLISION_RADIUS: f32 = 5.0;
const COLLISION_STRENGTH: f32 = 0.7;

/// Owned relaxation context for one loaded topology. Rebuilt wholesale on
/// reload; never shared.
pub struct Simulation {
    alpha: f32,
    stable: bool,
    degree: Vec<f32>,
    scratch_positions: Vec<Vec2>,
    scratch_velocities: Vec<Vec2>,
}

impl Simulation {
    pub fn new(node_count: usize, links: &[Link]) -> Self {
        let mut degree = vec![0.0f32; node_count];
        for link in links {
            if let Some(entry) = degree.get_mut(link.source as usize) {
                *entry += 1.0;
            }
            if let Some(entry) = degree.get_mut(link.target as usize) {
                *entry += 1.0;
            }
        }

        Self {
            alpha: ALPHA_START,
            stable: false,
            degree,
            scratch_positions: Vec::with_capacity(node_count),
            scratch_velocities: Vec::with_capacity(node_count),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    /// Restarts convergence without rebuilding the graph.
    pub fn reheat(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(ALPHA_MIN, 1.0);
        self.stable = false;
    }

    /// Advances one relaxation step. A no-op once the alpha floor has been
    /// reached; stability is sticky until `reheat`.
    pub fn tick(&mut self, nodes: &mut [Node], links: &[Link]) -> bool {
        if self.stable || nodes.is_empty() {
            return false;
        }

        self.alpha += (0.0 - self.alpha) * ALPHA_DECAY;

        self.apply_link_springs(nodes, links);
        self.apply_repulsion(nodes);
        apply_centering(nodes);
        self.apply_axis_anchors(nodes);
        self.apply_collisions(nodes);

        for node in nodes.iter_mut() {
            node.vel *= 1.0 - VELOCITY_DECAY;
            node.pos += node.vel;
        }

        if self.alpha < ALPHA_MIN {
            self.stable = true;
        }
        true
    }

    /// Springs pull linked pairs toward a weight-dependent separation;
    /// the correction is biased toward the lower-degree endpoint so hubs
    /// stay put.
    fn apply_link_springs(&self, nodes: &mut [Node], links: &[Link]) {
        for link in links {
            let source = link.source as usize;
            let target = link.target as usize;
            if source >= nodes.len() || target >= nodes.len() || source == target {
                continue;
            }

            let mut delta =
                (nodes[target].pos + nodes[target].vel) - (nodes[source].pos + nodes[source].vel);
            if delta.length_sq() < 1e-12 {
                delta = Vec2::new(1e-6, 1e-6);
            }

            let distance = delta.length();
            let preferred = 18.0 + (1.0 - link.weight) * 32.0;
            let strength = link.weight * LINK_STRENGTH_SCALE;
            let scale = (distance - preferred) / distance * self.alpha * strength;
            let correction = delta * scale;

            let source_degree = self.degree.get(source).copied().unwrap_or(1.0).max(1.0);
            let target_degree = self.degree.get(target).copied().unwrap_or(1.0).max(1.0);
            let bias = source_degree / (source_degree + target_degree);

            nodes[target].vel -= correction * bias;
            nodes[source].vel += correction * (1.0 - bias);
        }
    }

    fn apply_repulsion(&mut self, nodes: &mut [Node]) {
        self.scratch_positions.clear();
        self.scratch_positions
            .extend(nodes.iter().map(|node| node.pos));

        let Some(tree) = QuadNode::build(&self.scratch_positions) else {
            return;
        };

        let strength_alpha = REPULSION_STRENGTH * self.alpha;
        for (index, node) in nodes.iter_mut().enumerate() {
            accumulate_repulsion(
                &tree,
                index,
                &self.scratch_positions,
                strength_alpha,
                REPULSION_DISTANCE_MAX * REPULSION_DISTANCE_MAX,
                BARNES_HUT_THETA,
                &mut node.vel,
            );
        }
    }

    fn apply_axis_anchors(&self, nodes: &mut [Node]) {
        for node in nodes.iter_mut() {
            node.vel.x += (node.layer_x - node.pos.x) * LAYER_ANCHOR_STRENGTH * self.alpha;
            node.vel.y += (0.0 - node.pos.y) * VERTICAL_ANCHOR_STRENGTH * self.alpha;
        }
    }

    fn apply_collisions(&mut self, nodes: &mut [Node]) {
        self.scratch_positions.clear();
        self.scratch_positions
            .extend(nodes.iter().map(|node| node.pos));

        let Some(tree) = QuadNode::build(&self.scratch_positions) else {
            return;
        };

        self.scratch_velocities.clear();
        self.scratch_velocities
            .extend(nodes.iter().map(|node| node.vel));
        accumulate_collisions(
            &tree,
            &tree,
            true,
            &self.scratch_positions,
            CollisionParams {
                radius: COLLISION_RADIUS,
                strength: COLLISION_STRENGTH,
            },
            &mut self.scratch_velocities,
        );

        for (node, velocity) in nodes.iter_mut().zip(&self.scratch_velocities) {
            node.vel = *velocity;
        }
    }
}

/// Weak global centering: the layout's centroid drifts toward the origin.
fn apply_centering(nodes: &mut [Node]) {
    let mut centroid = Vec2::ZERO;
    let mut counted = 0usize;
    for node in nodes.iter() {
        if node.pos.x.is_finite() && node.pos.y.is_finite() {
            centroid += node.pos;
            counted += 1;
        }
    }
    if counted == 0 {
        return;
    }

    let shift = (centroid / counted as f32) * CENTER_STRENGTH;
    for node in nodes.iter_mut() {
        node.pos -= shift;
    }
}
