use eframe::egui::{self, Align, Context, Layout, Ui};

use super::VizModel;

impl VizModel {
    pub(in crate::app) fn show_top_bar(&mut self, ctx: &Context) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("rhizome-viz");
                    ui.separator();
                    ui.label(format!(
                        "{} nodes / {} connections",
                        self.total_nodes, self.total_connections
                    ));
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if self.frame_label.is_empty() {
                            ui.label("waiting for activations...");
                        } else {
                            ui.label(format!(
                                "frame {} | {}",
                                self.frame_number, self.frame_label
                            ));
                        }
                    });
                });
            });
    }

    pub(in crate::app) fn show_controls(&mut self, ctx: &Context) {
        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| self.draw_controls(ui));
    }

    fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Activity Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.horizontal(|ui| {
            let pause_label = if self.paused { "Resume" } else { "Pause" };
            if ui.button(pause_label).clicked() {
                self.paused = !self.paused;
            }
            if ui
                .button("Reheat layout")
                .on_hover_text("Restart the force relaxation without reloading the topology.")
                .clicked()
            {
                self.graph.reheat(0.3);
            }
        });

        ui.add_space(6.0);

        let mut flow_density = self.flow_density;
        let flow_slider = ui
            .add(
                egui::Slider::new(&mut flow_density, 0.0..=1.0)
                    .text("Flow density")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("How eagerly activation flows turn into particles.");
        if flow_slider.changed() {
            self.set_flow_density(flow_density);
        }

        let mut animation_speed = self.animation_speed;
        let speed_slider = ui
            .add(
                egui::Slider::new(&mut animation_speed, 0.1..=3.0)
                    .text("Animation speed")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Multiplier on layout ticks and particle motion.");
        if speed_slider.changed() {
            self.set_animation_speed(animation_speed);
        }

        ui.separator();
        ui.label("Rendering");

        let mut link_density = self.scene.link_density();
        let link_slider = ui
            .add(
                egui::Slider::new(&mut link_density, 0.2..=1.5)
                    .text("Link density")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Fraction of idle links drawn each frame.");
        if link_slider.changed() {
            self.scene.set_link_density(link_density);
        }

        let mut node_scale = self.scene.node_scale();
        let scale_slider = ui
            .add(
                egui::Slider::new(&mut node_scale, 0.6..=2.5)
                    .text("Node scale")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Uniform multiplier on drawn node radii.");
        if scale_slider.changed() {
            self.scene.set_node_scale(node_scale);
        }

        let mut backdrop = self.scene.background_opacity();
        let backdrop_slider = ui
            .add(
                egui::Slider::new(&mut backdrop, 0.0..=0.8)
                    .text("Backdrop")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Opacity of the paper backdrop behind the graph.");
        if backdrop_slider.changed() {
            self.scene.set_background_opacity(backdrop);
        }

        let mut auto_center = self.scene.auto_center();
        if ui
            .checkbox(&mut auto_center, "Auto-center camera")
            .changed()
        {
            self.scene.set_auto_center(auto_center);
        }

        ui.checkbox(&mut self.scene.isolate_mode, "Isolate on drag")
            .on_hover_text(
                "Drag a rectangle to isolate the nodes inside it. Shift-drag always does this.",
            );

        if ui.button("Clear focus & isolation").clicked() {
            self.scene.clear_focus_and_isolation();
        }

        ui.separator();
        ui.label("Telemetry");

        let stats = self.scene.stats();
        ui.label(self.fps_display_text());
        ui.label(format!(
            "drawn: {} links / {} nodes / {} particles",
            stats.links, stats.nodes, stats.particles
        ));
        ui.label(format!(
            "particles active: {} of {}",
            self.pool.active_count(),
            self.pool.capacity()
        ));
        ui.label(format!("cached paths: {}", self.paths.len()));
        ui.label(format!(
            "camera: ({:.0}, {:.0}) at {:.2}x",
            self.scene.camera_center.x, self.scene.camera_center.y, self.scene.zoom
        ));

        if let Some(simulation) = self.graph.simulation() {
            let layout = if simulation.is_stable() {
                "settled".to_owned()
            } else {
                format!("alpha {:.3}", simulation.alpha())
            };
            ui.label(format!("layout: {layout}"));
        }
    }
}
