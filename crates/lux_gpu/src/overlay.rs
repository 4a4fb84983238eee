//! egui stats overlay drawn on top of the presented frame.

use lux_core::AccumulationMode;
use lux_math::Vec3;
use winit::window::Window;

/// Everything the overlay shows, gathered by the renderer each frame.
#[derive(Clone, Debug, Default)]
pub struct OverlayStats {
    pub fps: f32,
    pub samples: u32,
    pub mode: AccumulationMode,
    pub spheres: usize,
    pub mesh_objects: usize,
    pub vertices: usize,
    pub indices: usize,
    pub placement_accepted: usize,
    pub placement_requested: usize,
    pub resolution: (u32, u32),
    pub camera_position: Vec3,
}

/// Frame rate averaged over half-second windows.
#[derive(Clone, Debug, Default)]
pub struct FpsCounter {
    fps: f32,
    frames: u32,
    timer: f32,
}

impl FpsCounter {
    pub fn update(&mut self, delta_time: f32) {
        self.frames += 1;
        self.timer += delta_time;

        // Update FPS every 0.5 seconds
        if self.timer >= 0.5 {
            self.fps = self.frames as f32 / self.timer;
            self.frames = 0;
            self.timer = 0.0;
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

pub struct Overlay {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    pub visible: bool,
    pub fps: FpsCounter,
}

impl Overlay {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, window: &Window) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None, // max_texture_side (use default)
        );

        let renderer = egui_wgpu::Renderer::new(
            device,
            format,
            None, // No depth testing for egui
            1,
            false, // allow_srgb_render_target
        );

        log::info!("egui initialized");

        Self {
            ctx,
            state,
            renderer,
            visible: true,
            fps: FpsCounter::default(),
        }
    }

    /// Returns true if egui consumed the event.
    pub fn handle_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Record the overlay into `encoder`, drawing over `view`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        window: &Window,
        size: (u32, u32),
        stats: &OverlayStats,
    ) {
        let raw_input = self.state.take_egui_input(window);
        let visible = self.visible;

        let full_output = self.ctx.run(raw_input, |ctx| {
            if !visible {
                return;
            }

            egui::Window::new("Lux")
                .default_pos([12.0, 12.0])
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(format!("FPS: {:.1}", stats.fps));
                    ui.label(format!("Samples: {} ({})", stats.samples, stats.mode));
                    ui.separator();

                    ui.collapsing("Scene", |ui| {
                        ui.label(format!(
                            "Spheres: {} ({} of {} placed)",
                            stats.spheres, stats.placement_accepted, stats.placement_requested
                        ));
                        ui.label(format!("Mesh objects: {}", stats.mesh_objects));
                        ui.label(format!("Vertices: {}", stats.vertices));
                        ui.label(format!("Triangles: {}", stats.indices / 3));
                    });

                    ui.collapsing("Camera", |ui| {
                        let p = stats.camera_position;
                        ui.label(format!("Position: ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z));
                        ui.label(format!(
                            "Resolution: {}x{}",
                            stats.resolution.0, stats.resolution.1
                        ));
                    });

                    ui.collapsing("Controls", |ui| {
                        ui.label("W/A/S/D: Move");
                        ui.label("Mouse: Look (M toggles)");
                        ui.label("C: Spawn cube, X: Remove cube");
                        ui.label("Tab: Accumulation mode, R: Reset");
                        ui.label("H: Hide overlay");
                    });
                });
        });

        self.state
            .handle_platform_output(window, full_output.platform_output);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.0, size.1],
            pixels_per_point: window.scale_factor() as f32,
        };

        let paint_jobs = self
            .ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        // Upload egui textures
        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        self.renderer
            .update_buffers(device, queue, encoder, &paint_jobs, &screen_descriptor);

        {
            let mut egui_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime(); // Need 'static lifetime for egui renderer

            self.renderer
                .render(&mut egui_pass, &paint_jobs, &screen_descriptor);
        }

        // Free egui textures
        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
