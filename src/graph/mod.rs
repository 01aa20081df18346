mod quadtree;
mod sim;

use std::collections::{HashMap, HashSet};

use eframe::egui::{Color32, Vec2, vec2};
use rand::Rng;

use crate::feed::{ActivationFrame, Topology};

pub use sim::Simulation;

/// Fixed layer ordering for the visualized autoencoder; unknown labels fall
/// back to the first slot.
pub const LAYER_ORDER: [&str; 8] = [
    "encoder.0",
    "encoder.2",
    "encoder.4",
    "encoder.6",
    "decoder.0",
    "decoder.2",
    "decoder.4",
    "decoder.6",
];

const LAYER_SPACING: f32 = 140.0;
const LINK_CEILING: usize = 50_000;
const FLOW_THRESHOLD: f32 = 0.02;
const PULSE_DECAY: f32 = 0.92;
const PULSE_FLOOR: f32 = 0.01;

pub struct Node {
    pub id: String,
    pub layer: String,
    pub unit_index: usize,
    pub layer_index: usize,
    pub pos: Vec2,
    pub vel: Vec2,
    pub layer_x: f32,
    pub activation: f32,
    /// Transient arrival glow, written by the renderer.
    pub pulse: f32,
    /// Base visuals, annotated once per load by the renderer.
    pub base_color: Color32,
    pub base_radius: f32,
}

pub struct Link {
    pub source: u32,
    pub target: u32,
    pub weight: f32,
    pub pulse: f32,
}

/// Ephemeral per-frame flow over one link; never stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowEvent {
    pub source: u32,
    pub target: u32,
    pub magnitude: f32,
}

#[derive(Default)]
pub struct NetworkGraph {
    nodes: Vec<Node>,
    links: Vec<Link>,
    index_by_id: HashMap<String, u32>,
    link_by_endpoints: HashMap<(u32, u32), u32>,
    neighbors: Vec<HashSet<u32>>,
    simulation: Option<Simulation>,
}

impl NetworkGraph {
    /// Replaces all nodes and links from a topology message and starts a
    /// fresh force simulation. Connections referencing unknown node ids are
    /// dropped silently; when the raw connection count exceeds the ceiling,
    /// a deterministic index stride bounds the retained subset.
    pub fn load_topology(&mut self, topology: &Topology) {
        let mut rng = rand::thread_rng();
        let layer_offset = (LAYER_ORDER.len() - 1) as f32 / 2.0;

        self.nodes = topology
            .nodes
            .iter()
            .map(|raw| {
                let layer_index = LAYER_ORDER
                    .iter()
                    .position(|label| *label == raw.layer)
                    .unwrap_or(0);
                let layer_x = (layer_index as f32 - layer_offset) * LAYER_SPACING;

                Node {
                    id: raw.id.clone(),
                    layer: raw.layer.clone(),
                    unit_index: raw.index,
                    layer_index,
                    pos: vec2(
                        layer_x + rng.gen_range(-30.0..30.0),
                        rng.gen_range(-180.0..180.0),
                    ),
                    vel: Vec2::ZERO,
                    layer_x,
                    activation: 0.0,
                    pulse: 0.0,
                    base_color: Color32::WHITE,
                    base_radius: 2.1,
                }
            })
            .collect();

        self.index_by_id = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index as u32))
            .collect();

        let stride = topology.connections.len().div_ceil(LINK_CEILING).max(1);

        self.links = Vec::new();
        self.link_by_endpoints = HashMap::new();
        for connection in topology.connections.iter().step_by(stride) {
            let (Some(&source), Some(&target)) = (
                self.index_by_id.get(&connection.source),
                self.index_by_id.get(&connection.target),
            ) else {
                continue;
            };

            self.link_by_endpoints
                .insert((source, target), self.links.len() as u32);
            self.links.push(Link {
                source,
                target,
                weight: connection.weight.abs(),
                pulse: 0.0,
            });
        }

        self.neighbors = vec![HashSet::new(); self.nodes.len()];
        for link in &self.links {
            self.neighbors[link.source as usize].insert(link.target);
            self.neighbors[link.target as usize].insert(link.source);
        }

        self.simulation = Some(Simulation::new(self.nodes.len(), &self.links));

        tracing::info!(
            nodes = self.nodes.len(),
            links = self.links.len(),
            stride,
            "topology loaded"
        );
    }

    /// Advances one simulation step; cheap no-op once the layout is stable.
    pub fn tick(&mut self) -> bool {
        match &mut self.simulation {
            Some(simulation) => simulation.tick(&mut self.nodes, &self.links),
            None => false,
        }
    }

    pub fn reheat(&mut self, alpha: f32) {
        if let Some(simulation) = &mut self.simulation {
            simulation.reheat(alpha);
        }
    }

    /// Overwrites activations for known node ids; unknown ids are ignored.
    pub fn update_activations(&mut self, frame: &ActivationFrame) {
        for (id, value) in &frame.activations {
            if let Some(&index) = self.index_by_id.get(id) {
                self.nodes[index as usize].activation = *value;
            }
        }
    }

    /// Lazy pass over links in insertion order, yielding those whose flow
    /// magnitude clears the visibility threshold.
    pub fn flow_events(&self) -> impl Iterator<Item = FlowEvent> + '_ {
        self.links.iter().filter_map(|link| {
            let source = &self.nodes[link.source as usize];
            let target = &self.nodes[link.target as usize];
            let magnitude = ((source.activation + target.activation) / 2.0) * link.weight;

            (magnitude > FLOW_THRESHOLD).then_some(FlowEvent {
                source: link.source,
                target: link.target,
                magnitude,
            })
        })
    }

    /// Direction-sensitive: `(target, source)` is a distinct key and is not
    /// matched. Silent no-op when the directed link does not exist.
    pub fn trigger_link_pulse(&mut self, source: u32, target: u32, intensity: f32) {
        if let Some(&index) = self.link_by_endpoints.get(&(source, target)) {
            let link = &mut self.links[index as usize];
            link.pulse = (link.pulse + intensity).min(1.0);
        }
    }

    pub fn update_link_pulses(&mut self) {
        for link in &mut self.links {
            if link.pulse > PULSE_FLOOR {
                link.pulse *= PULSE_DECAY;
            } else {
                link.pulse = 0.0;
            }
        }
    }

    /// Arrival glow at a node; keeps the strongest pending pulse.
    pub fn pulse_node(&mut self, index: u32, intensity: f32) {
        if let Some(node) = self.nodes.get_mut(index as usize) {
            node.pulse = node.pulse.max(intensity);
        }
    }

    pub fn update_node_pulses(&mut self) {
        for node in &mut self.nodes {
            if node.pulse > PULSE_FLOOR {
                node.pulse *= PULSE_DECAY;
            } else {
                node.pulse = 0.0;
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node_index(&self, id: &str) -> Option<u32> {
        self.index_by_id.get(id).copied()
    }

    pub fn neighbors(&self, index: u32) -> Option<&HashSet<u32>> {
        self.neighbors.get(index as usize)
    }

    pub fn simulation(&self) -> Option<&Simulation> {
        self.simulation.as_ref()
    }
}
