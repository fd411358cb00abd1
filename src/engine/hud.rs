// On-screen overlay drawn with egui on top of the 3D pass.
//
// The round banner is always shown; the F3 stats panel is optional.
use egui::epaint::Shadow;

/// What the round banner shows this frame. Built by the caller from the
/// simulation so this module stays free of game types.
pub struct RoundHud {
    pub round: u32,
    pub phase: &'static str,
    /// Name and linear RGB of the safe colour, once one is chosen.
    pub safe_color: Option<(&'static str, [f32; 3])>,
    /// Seconds left in the current phase, if it has a fixed length.
    pub remaining: Option<f32>,
    pub alive: u32,
    pub eliminated_total: u32,
    pub last_survivors: Option<u32>,
    pub paused: bool,
}

pub struct DebugStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
    pub entity_count: usize,
    pub npcs_moving: usize,
    pub npcs_seeking: usize,
    pub draw_calls: u32,
    pub resolution: (u32, u32),
    pub camera_target: (f32, f32),
    pub camera_distance: f32,
    pub sim_time: f32,
}

/// Linear RGB in [0, 1] to an opaque egui colour.
pub fn swatch_color(rgb: [f32; 3]) -> egui::Color32 {
    let [r, g, b] = rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    egui::Color32::from_rgb(r, g, b)
}

/// "3.2s" style countdown, never negative.
pub fn format_countdown(seconds: f32) -> String {
    format!("{:.1}s", seconds.max(0.0))
}

pub struct Hud {
    pub stats_visible: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Hud {
    pub fn new(
        window: &winit::window::Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);
        visuals.window_stroke = egui::Stroke::NONE;
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(egui::Color32::WHITE);
        egui_ctx.set_visuals(visuals);

        let mut style = (*egui_ctx.style()).clone();
        style.override_font_id = Some(egui::FontId::monospace(14.0));
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface_format,
            None,  // no depth
            1,     // msaa samples
            false, // no dithering
        );

        Self {
            stats_visible: false,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn toggle_stats(&mut self) {
        self.stats_visible = !self.stats_visible;
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.egui_state.on_window_event(window, event)
    }

    /// Draw the round banner and, when `stats` is given, the stats panel.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        round: &RoundHud,
        stats: Option<&DebugStats>,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            egui::Area::new(egui::Id::new("round_banner"))
                .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, 10.0))
                .show(ctx, |ui| {
                    panel(ui, |ui| {
                        ui.horizontal(|ui| {
                            let title = if round.round == 0 {
                                round.phase.to_string()
                            } else {
                                format!("Round {}  {}", round.round, round.phase)
                            };
                            ui.label(egui::RichText::new(title).size(20.0));
                            if let Some(remaining) = round.remaining {
                                ui.label(format_countdown(remaining));
                            }
                        });
                        if let Some((name, rgb)) = round.safe_color {
                            ui.horizontal(|ui| {
                                let (rect, _) = ui.allocate_exact_size(
                                    egui::vec2(18.0, 18.0),
                                    egui::Sense::hover(),
                                );
                                ui.painter().rect_filled(rect, 3.0, swatch_color(rgb));
                                ui.label(format!("Safe: {}", name));
                            });
                        }
                        ui.label(format!(
                            "Alive: {}  Eliminated: {}",
                            round.alive, round.eliminated_total
                        ));
                        if let Some(survivors) = round.last_survivors {
                            ui.label(format!("Last round survivors: {}", survivors));
                        }
                        if round.paused {
                            ui.label(egui::RichText::new("PAUSED").color(egui::Color32::YELLOW));
                        }
                    });
                });

            // ── F3: stats panel ──────────────────────────────────────────────
            if let Some(stats) = stats {
                egui::Area::new(egui::Id::new("debug_stats"))
                    .fixed_pos(egui::pos2(10.0, 10.0))
                    .show(ctx, |ui| {
                        panel(ui, |ui| {
                            ui.label(format!("FPS: {}", stats.fps));
                            ui.label(format!(
                                "Frame: {:.2} ms (min: {:.1} | max: {:.1})",
                                stats.frame_time_avg_ms,
                                stats.frame_time_min_ms,
                                stats.frame_time_max_ms
                            ));
                            ui.label(format!("Entities: {}", stats.entity_count));
                            ui.label(format!(
                                "NPCs moving: {}  seeking safety: {}",
                                stats.npcs_moving, stats.npcs_seeking
                            ));
                            ui.label(format!("Draw calls: {}", stats.draw_calls));
                            ui.label(format!(
                                "Resolution: {} x {}",
                                stats.resolution.0, stats.resolution.1
                            ));
                            ui.label(format!(
                                "Camera: ({:.1}, {:.1})  dist {:.1}",
                                stats.camera_target.0, stats.camera_target.1,
                                stats.camera_distance
                            ));
                            ui.label(format!("Sim time: {:.1}s", stats.sim_time));
                        });
                    });
            }
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("HUD Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer
                .render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn panel(ui: &mut egui::Ui, add_contents: impl FnOnce(&mut egui::Ui)) {
    egui::Frame::none()
        .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 180))
        .inner_margin(egui::Margin::same(8.0))
        .rounding(4.0)
        .show(ui, add_contents);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swatch_clamps_and_rounds() {
        assert_eq!(swatch_color([1.0, 0.0, 0.5]), egui::Color32::from_rgb(255, 0, 128));
        assert_eq!(swatch_color([2.0, -1.0, 0.0]), egui::Color32::from_rgb(255, 0, 0));
    }

    #[test]
    fn countdown_never_goes_negative() {
        assert_eq!(format_countdown(3.24), "3.2s");
        assert_eq!(format_countdown(-0.01), "0.0s");
    }
}
