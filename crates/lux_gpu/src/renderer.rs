use std::sync::Arc;

use anyhow::Result;
use lux_core::{place_spheres, ObjectRegistry, SceneBuffers, SceneConfig, Skybox, SyncReport};
use lux_math::{Camera, Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winit::window::Window;

use crate::accumulate::Accumulator;
use crate::backend::WgpuBackend;
use crate::context::GpuContext;
use crate::overlay::{Overlay, OverlayStats};
use crate::pipeline::{TracePipeline, WORKGROUP_SIZE};
use crate::targets::RenderTargets;
use crate::uniforms::FrameUniforms;

/// Size of the procedural sky used when no image is configured.
const GRADIENT_SKY_SIZE: (u32, u32) = (512, 256);

/// Root of the render side: owns the registry, the scene buffers and all
/// GPU state, and produces one frame per [`Renderer::render`] call.
pub struct Renderer {
    context: GpuContext,
    pipeline: TracePipeline,
    targets: RenderTargets,
    registry: ObjectRegistry,
    buffers: SceneBuffers<wgpu::Buffer>,
    pub camera: Camera,
    accumulator: Accumulator,
    overlay: Overlay,

    light_direction: Vec3,
    light_intensity: f32,
    max_bounces: u32,

    rng: StdRng,
    last_view: Option<(Mat4, Mat4)>,
    last_report: SyncReport,
    placement: (usize, usize),
}

impl Renderer {
    /// Create the GPU context and pipelines, and place the scene's spheres.
    pub async fn new(window: Arc<Window>, config: &SceneConfig) -> Result<Self> {
        let context = GpuContext::new(window.clone()).await?;

        let skybox = load_skybox(config, context.device.limits().max_texture_dimension_2d);
        let pipeline = TracePipeline::new(
            &context.device,
            &context.queue,
            context.surface_format(),
            &skybox,
        );

        if config.render.tile_size != WORKGROUP_SIZE {
            log::warn!(
                "tile_size {} does not match the kernel workgroup, using {}",
                config.render.tile_size,
                WORKGROUP_SIZE
            );
        }

        let mut registry = ObjectRegistry::new();
        let placement = place_spheres(&config.placement)?;
        placement.register_all(&mut registry);
        log::info!(
            "Placed {} of {} spheres (seed {})",
            placement.accepted(),
            placement.requested,
            config.placement.seed
        );

        let (width, height) = context.size;
        let mut camera = Camera::new(
            Vec3::from(config.camera.position),
            config.camera.yaw_degrees.to_radians(),
            config.camera.pitch_degrees.to_radians(),
            width as f32 / height as f32,
        );
        camera.fov_y = config.camera.fov_degrees.to_radians();

        let overlay = Overlay::new(&context.device, context.surface_format(), &window);

        Ok(Self {
            pipeline,
            targets: RenderTargets::new(),
            registry,
            buffers: SceneBuffers::new(),
            camera,
            accumulator: Accumulator::new(config.render.accumulation),
            overlay,
            light_direction: config.light.direction(),
            light_intensity: config.light.intensity,
            max_bounces: config.render.max_bounces,
            rng: StdRng::from_entropy(),
            last_view: None,
            last_report: SyncReport::default(),
            placement: (placement.accepted(), placement.requested as usize),
            context,
        })
    }

    /// Handle window resize
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if self.context.resize(new_size) {
            self.camera.set_aspect(new_size.0 as f32 / new_size.1 as f32);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.context.size
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Lifecycle events register and unregister objects here, before `render`.
    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn toggle_accumulation_mode(&mut self) {
        let mode = self.accumulator.mode().toggled();
        self.accumulator.set_mode(mode);
        log::info!("Accumulation mode: {}", mode);
    }

    pub fn reset_accumulation(&mut self) {
        self.accumulator.reset();
    }

    pub fn toggle_overlay(&mut self) {
        self.overlay.visible = !self.overlay.visible;
    }

    /// Handle egui window event - returns true if event was consumed by egui
    pub fn handle_egui_event(
        &mut self,
        window: &Window,
        event: &winit::event::WindowEvent,
    ) -> bool {
        self.overlay.handle_event(window, event)
    }

    /// Update FPS counter (call each frame with delta_time)
    pub fn update_fps(&mut self, delta_time: f32) {
        self.overlay.fps.update(delta_time);
    }

    /// Result of the most recent buffer synchronization.
    pub fn last_report(&self) -> SyncReport {
        self.last_report
    }

    /// Render one frame.
    ///
    /// Fails with a [`lux_core::SyncError`] if the scene buffers are
    /// inconsistent, or a [`wgpu::SurfaceError`] if no frame can be acquired.
    pub fn render(&mut self, window: &Window) -> Result<()> {
        let device = &self.context.device;
        let queue = &self.context.queue;

        let report = self
            .buffers
            .sync(&mut self.registry, &WgpuBackend::new(device, queue))?;
        if report.rebuilt {
            log::debug!(
                "Scene rebuild {}: {} mesh objects, {} triangles",
                self.buffers.flat().rebuild_generation(),
                report.mesh_objects,
                report.indices / 3
            );
        }
        self.last_report = report;

        let size = self.context.size;
        let mut restart = self.targets.ensure(device, size.0, size.1) || report.changed;

        let view = (self.camera.camera_to_world(), self.camera.inverse_projection());
        if self.last_view != Some(view) {
            self.last_view = Some(view);
            restart = true;
        }
        if restart {
            self.accumulator.reset();
        }

        let alpha = self.accumulator.begin_frame();
        let pixel_offset = self.accumulator.pixel_offset(&mut self.rng);
        let uniforms = FrameUniforms::new(&self.camera, self.light_direction, self.light_intensity)
            .with_sampling(pixel_offset, self.rng.gen())
            .with_counts(report.spheres, report.mesh_objects)
            .with_max_bounces(self.max_bounces);
        self.pipeline.write_uniforms(queue, &uniforms);

        let (Some(write), Some(accumulation)) = (self.targets.write(), self.targets.accumulation())
        else {
            anyhow::bail!("render targets were not allocated");
        };

        let output = self.context.surface.get_current_texture()?;
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        self.pipeline
            .dispatch(device, &mut encoder, &self.buffers, write, self.targets.size());
        self.pipeline
            .composite(device, &mut encoder, write, accumulation, alpha);
        self.pipeline
            .present(device, &mut encoder, accumulation, &surface_view);

        let stats = OverlayStats {
            fps: self.overlay.fps.fps(),
            samples: self.accumulator.samples(),
            mode: self.accumulator.mode(),
            spheres: report.spheres,
            mesh_objects: report.mesh_objects,
            vertices: report.vertices,
            indices: report.indices,
            placement_accepted: self.placement.0,
            placement_requested: self.placement.1,
            resolution: size,
            camera_position: self.camera.position,
        };
        self.overlay.draw(
            device,
            queue,
            &mut encoder,
            &surface_view,
            window,
            size,
            &stats,
        );

        queue.submit(std::iter::once(encoder.finish()));
        output.present();

        log::trace!(
            "Frame: {} samples, alpha {:.4}, {} spheres, {} meshes",
            self.accumulator.samples(),
            alpha,
            report.spheres,
            report.mesh_objects
        );
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.buffers
            .release(&WgpuBackend::new(&self.context.device, &self.context.queue));
        log::info!("Released scene buffers");
    }
}

fn load_skybox(config: &SceneConfig, max_dimension: u32) -> Skybox {
    let gradient = || Skybox::gradient(GRADIENT_SKY_SIZE.0, GRADIENT_SKY_SIZE.1);

    let Some(path) = &config.render.skybox else {
        return gradient();
    };

    match Skybox::load(path) {
        Ok(sky) if sky.width <= max_dimension && sky.height <= max_dimension => sky,
        Ok(sky) => {
            log::warn!(
                "Skybox {}x{} exceeds the device limit of {}, using gradient",
                sky.width,
                sky.height,
                max_dimension
            );
            gradient()
        }
        Err(e) => {
            log::warn!("{}, using gradient sky", e);
            gradient()
        }
    }
}
