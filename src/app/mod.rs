use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, TryRecvError};

use eframe::egui::{self, Context};
use rand::Rng;

use crate::feed::{ActivationFrame, FeedMessage, Topology};
use crate::graph::NetworkGraph;
use crate::particles::{POOL_CAPACITY, ParticlePool, PathCache};

mod controls;
mod fps;
mod interaction;
mod render_utils;
mod scene;

use scene::SceneView;

const ARRIVAL_PULSE: f32 = 2.0;
const MAX_PENDING_TICKS: f32 = 6.0;
const SPAWN_BUDGET: f32 = 120.0;

pub struct RhizomeApp {
    feed: Receiver<FeedMessage>,
    feed_alive: bool,
    model: Option<Box<VizModel>>,
}

/// Everything a loaded topology needs to animate and draw. Replaced wholesale
/// when a new topology arrives; no state leaks across loads.
struct VizModel {
    graph: NetworkGraph,
    pool: ParticlePool,
    paths: PathCache,
    scene: SceneView,
    paused: bool,
    animation_speed: f32,
    flow_density: f32,
    tick_accumulator: f32,
    pending_fit: bool,
    frame_number: u64,
    frame_label: String,
    total_nodes: usize,
    total_connections: usize,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
}

impl RhizomeApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, feed: Receiver<FeedMessage>) -> Self {
        Self {
            feed,
            feed_alive: true,
            model: None,
        }
    }

    /// Drains every message queued since the previous frame. A topology
    /// replaces the whole model; activation frames update the current one.
    fn drain_feed(&mut self) {
        loop {
            match self.feed.try_recv() {
                Ok(FeedMessage::Topology(topology)) => {
                    self.model = Some(Box::new(VizModel::new(&topology)));
                }
                Ok(FeedMessage::Activations(frame)) => {
                    if let Some(model) = &mut self.model {
                        model.apply_frame(frame);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.feed_alive {
                        tracing::warn!("activity feed disconnected");
                    }
                    self.feed_alive = false;
                    break;
                }
            }
        }
    }
}

impl eframe::App for RhizomeApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.drain_feed();

        match &mut self.model {
            Some(model) => model.show(ctx),
            None => {
                let feed_alive = self.feed_alive;
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        if feed_alive {
                            ui.heading("Waiting for network topology...");
                            ui.add_space(8.0);
                            ui.spinner();
                        } else {
                            ui.heading("Activity feed disconnected");
                            ui.add_space(8.0);
                            ui.label("No topology was received before the feed closed.");
                        }
                    });
                });
            }
        }

        ctx.request_repaint();
    }
}

impl VizModel {
    fn new(topology: &Topology) -> Self {
        let mut graph = NetworkGraph::default();
        graph.load_topology(topology);

        let scene = SceneView::new();
        scene.annotate_nodes(graph.nodes_mut());

        Self {
            graph,
            pool: ParticlePool::new(POOL_CAPACITY),
            paths: PathCache::default(),
            scene,
            paused: false,
            animation_speed: 1.0,
            flow_density: 0.5,
            tick_accumulator: 0.0,
            pending_fit: true,
            frame_number: 0,
            frame_label: String::new(),
            total_nodes: topology.metadata.total_nodes,
            total_connections: topology.metadata.total_connections,
            fps_current: 60.0,
            fps_samples: VecDeque::new(),
        }
    }

    fn apply_frame(&mut self, frame: ActivationFrame) {
        self.graph.update_activations(&frame);
        self.frame_number = frame.frame;
        self.frame_label = frame.label;
    }

    fn set_animation_speed(&mut self, value: f32) {
        if value.is_finite() {
            self.animation_speed = value.clamp(0.1, 3.0);
        }
    }

    fn set_flow_density(&mut self, value: f32) {
        if value.is_finite() {
            self.flow_density = value.clamp(0.0, 1.0);
        }
    }

    /// One animation step: layout ticks, particle motion, spawning, and pulse
    /// decay. Pausing freezes all of it; the scene still draws every frame.
    fn advance(&mut self) {
        if self.paused {
            return;
        }

        self.tick_accumulator =
            (self.tick_accumulator + self.animation_speed).min(MAX_PENDING_TICKS);
        while self.tick_accumulator >= 1.0 {
            self.graph.tick();
            self.tick_accumulator -= 1.0;
        }

        for arrival in self.pool.update(self.animation_speed) {
            self.graph.pulse_node(arrival.target, ARRIVAL_PULSE);
        }

        self.spawn_particles();
        self.graph.update_link_pulses();
        self.graph.update_node_pulses();
    }

    /// Turns the frame's flow events into particles, budgeted by measured
    /// frame rate and zoom so a busy network cannot starve rendering.
    fn spawn_particles(&mut self) {
        let perf = self.scene.performance_factor();
        let spawn_rate = (0.2 + self.flow_density * 0.8) * perf;
        let threshold = 0.08 + (1.0 - self.flow_density) * 0.2 + (1.0 - perf) * 0.08;
        let max_spawns = (SPAWN_BUDGET * perf).round() as usize;

        let flows: Vec<_> = self.graph.flow_events().collect();
        let mut rng = rand::thread_rng();
        let mut spawned = 0usize;

        for flow in flows {
            if spawned >= max_spawns {
                break;
            }
            if flow.magnitude <= threshold {
                continue;
            }

            let chance = (flow.magnitude * spawn_rate).min(1.0);
            if rng.r#gen::<f32>() >= chance {
                continue;
            }

            let source_pos = self.graph.nodes()[flow.source as usize].pos;
            let target_pos = self.graph.nodes()[flow.target as usize].pos;
            let path = self
                .paths
                .get_path(flow.source, flow.target, source_pos, target_pos);

            if self
                .pool
                .spawn(flow.source, flow.target, source_pos, path)
                .is_none()
            {
                break;
            }

            self.graph.trigger_link_pulse(
                flow.source,
                flow.target,
                flow.magnitude * (0.6 + self.flow_density * 1.6),
            );
            spawned += 1;
        }
    }

    fn show(&mut self, ctx: &Context) {
        self.update_fps_counter(ctx);
        self.scene.set_performance(self.fps_current);

        self.advance();

        self.show_top_bar(ctx);
        self.show_controls(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;

            if self.pending_fit {
                self.scene.fit_to_view(rect, self.graph.nodes());
                self.pending_fit = false;
            }

            self.scene.handle_keys(ui);
            self.scene.handle_zoom(ui, rect, &response);
            self.scene.handle_pointer(ui, rect, &response, &self.graph);
            self.scene.update_camera(self.graph.nodes());

            self.scene.draw(&painter, rect, &self.graph, &self.pool);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{TopologyConnection, TopologyMetadata, TopologyNode};

    fn small_topology() -> Topology {
        Topology {
            metadata: TopologyMetadata {
                total_nodes: 2,
                total_connections: 1,
            },
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
            ],
            connections: vec![TopologyConnection {
                source: "a".into(),
                target: "b".into(),
                weight: 0.9,
            }],
        }
    }

    fn active_frame() -> ActivationFrame {
        ActivationFrame {
            frame: 7,
            label: "sample 3".into(),
            activations: [("a".to_owned(), 1.0), ("b".to_owned(), 1.0)]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn pause_freezes_layout_and_pulses() {
        let mut model = VizModel::new(&small_topology());
        model.apply_frame(active_frame());
        model.paused = true;

        let alpha_before = model.graph.simulation().unwrap().alpha();
        let positions: Vec<_> = model.graph.nodes().iter().map(|node| node.pos).collect();
        for _ in 0..10 {
            model.advance();
        }

        assert_eq!(model.graph.simulation().unwrap().alpha(), alpha_before);
        for (node, previous) in model.graph.nodes().iter().zip(&positions) {
            assert_eq!(node.pos, *previous);
        }
        assert_eq!(model.pool.active_count(), 0);
    }

    #[test]
    fn speed_multiplier_runs_extra_layout_ticks() {
        let mut fast = VizModel::new(&small_topology());
        fast.set_animation_speed(3.0);
        let mut slow = VizModel::new(&small_topology());
        slow.set_animation_speed(1.0);

        for _ in 0..10 {
            fast.advance();
            slow.advance();
        }

        let fast_alpha = fast.graph.simulation().unwrap().alpha();
        let slow_alpha = slow.graph.simulation().unwrap().alpha();
        assert!(fast_alpha < slow_alpha, "{fast_alpha} vs {slow_alpha}");
    }

    #[test]
    fn control_setters_clamp() {
        let mut model = VizModel::new(&small_topology());

        model.set_animation_speed(99.0);
        assert_eq!(model.animation_speed, 3.0);
        model.set_animation_speed(0.0);
        assert_eq!(model.animation_speed, 0.1);

        model.set_flow_density(-2.0);
        assert_eq!(model.flow_density, 0.0);
        model.set_flow_density(2.0);
        assert_eq!(model.flow_density, 1.0);
    }

    #[test]
    fn strong_activations_spawn_particles_and_pulse_links() {
        let mut model = VizModel::new(&small_topology());
        model.set_flow_density(1.0);
        model.apply_frame(active_frame());

        // Per-step spawn chance is ~0.8; thirty steps make a miss on every
        // one of them vanishingly unlikely, and every spawned particle is
        // still in flight after at most 29 updates.
        for _ in 0..30 {
            model.advance();
        }

        assert!(model.pool.active_count() > 0);
        assert_eq!(model.paths.len(), 1);
        assert!(model.graph.links()[0].pulse > 0.0);
    }

    #[test]
    fn activation_frames_update_label_and_counter() {
        let mut model = VizModel::new(&small_topology());
        model.apply_frame(active_frame());

        assert_eq!(model.frame_number, 7);
        assert_eq!(model.frame_label, "sample 3");
        assert_eq!(model.graph.nodes()[0].activation, 1.0);
    }
}
