use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use lux_core::{SceneConfig, SyncError};
use lux_gpu::Renderer;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

mod scene;

use scene::SceneObjects;

/// Vertical mouse movement is damped relative to horizontal.
const PITCH_DAMPING: f32 = 0.3;

/// Convert a cursor delta in pixels to (yaw, pitch) deltas in radians.
fn look_delta(dx: f64, dy: f64, sensitivity: f32) -> (f32, f32) {
    let yaw = dx as f32 * sensitivity;
    let pitch = -(dy as f32) * sensitivity * PITCH_DAMPING;
    (yaw.to_radians(), pitch.to_radians())
}

/// Application state
struct App {
    config: SceneConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    objects: SceneObjects,

    // Input state
    mouse_look: bool,
    last_mouse_pos: Option<(f64, f64)>,
    keys_pressed: HashSet<KeyCode>,
    last_frame_time: Instant,
}

impl App {
    fn new(config: SceneConfig) -> Self {
        Self {
            objects: SceneObjects::new(&config),
            config,
            window: None,
            renderer: None,
            mouse_look: true,
            last_mouse_pos: None,
            keys_pressed: HashSet::new(),
            last_frame_time: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title("Lux Viewer")
            .with_inner_size(winit::dpi::PhysicalSize::new(1280, 720));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .context("Failed to create window")?,
        );

        // Initialize renderer (async in pollster block)
        let mut renderer = pollster::block_on(Renderer::new(window.clone(), &self.config))
            .context("Failed to initialize renderer")?;
        self.objects.populate(&self.config, renderer.registry_mut())?;

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn handle_key(&mut self, keycode: KeyCode, event_loop: &ActiveEventLoop) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        match keycode {
            KeyCode::KeyC => {
                let camera = renderer.camera;
                self.objects.spawn_cube(renderer.registry_mut(), &camera);
            }
            KeyCode::KeyX => {
                if self.objects.despawn_last(renderer.registry_mut()).is_none() {
                    log::info!("No spawned cubes to remove");
                }
            }
            KeyCode::KeyM => {
                self.mouse_look = !self.mouse_look;
                self.last_mouse_pos = None;
                log::info!("Mouse look {}", if self.mouse_look { "on" } else { "off" });
            }
            KeyCode::Tab => renderer.toggle_accumulation_mode(),
            KeyCode::KeyR => renderer.reset_accumulation(),
            KeyCode::KeyH => renderer.toggle_overlay(),
            KeyCode::Escape => event_loop.exit(),
            _ => {}
        }
    }

    fn move_camera(&mut self, delta_time: f32) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        let mut right = 0.0;
        let mut up = 0.0;
        let mut forward = 0.0;

        if self.keys_pressed.contains(&KeyCode::KeyW) {
            forward += 1.0;
        }
        if self.keys_pressed.contains(&KeyCode::KeyS) {
            forward -= 1.0;
        }
        if self.keys_pressed.contains(&KeyCode::KeyA) {
            right -= 1.0;
        }
        if self.keys_pressed.contains(&KeyCode::KeyD) {
            right += 1.0;
        }
        if self.keys_pressed.contains(&KeyCode::KeyE) {
            up += 1.0;
        }
        if self.keys_pressed.contains(&KeyCode::KeyQ) {
            up -= 1.0;
        }

        if right != 0.0 || up != 0.0 || forward != 0.0 {
            renderer.camera.translate(
                right,
                up,
                forward,
                self.config.camera.move_speed,
                delta_time,
            );
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                log::error!("{:#}", e);
                event_loop.exit();
                return;
            }
            log::info!("Window and renderer initialized");
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Let egui handle the event first
        if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
            if renderer.handle_egui_event(window, &event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize((physical_size.width, physical_size.height));
                    log::info!("Resized to {}x{}", physical_size.width, physical_size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_look {
                    if let (Some(last_pos), Some(renderer)) =
                        (self.last_mouse_pos, &mut self.renderer)
                    {
                        let (yaw, pitch) = look_delta(
                            position.x - last_pos.0,
                            position.y - last_pos.1,
                            self.config.camera.look_sensitivity,
                        );
                        renderer.camera.rotate(yaw, pitch);
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.last_mouse_pos = None;
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    physical_key: PhysicalKey::Code(keycode),
                    state,
                    repeat,
                    ..
                },
                ..
            } => match state {
                ElementState::Pressed => {
                    self.keys_pressed.insert(keycode);
                    if !repeat {
                        self.handle_key(keycode, event_loop);
                    }
                }
                ElementState::Released => {
                    self.keys_pressed.remove(&keycode);
                }
            },
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let delta_time = (now - self.last_frame_time).as_secs_f32();
                self.last_frame_time = now;

                self.move_camera(delta_time);

                if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
                    renderer.update_fps(delta_time);
                    self.objects.animate(renderer.registry_mut(), delta_time);

                    if let Err(e) = renderer.render(window) {
                        if let Some(sync_err) = e.downcast_ref::<SyncError>() {
                            // Scene buffers no longer match the registry
                            log::error!("Scene synchronization failed: {}", sync_err);
                            event_loop.exit();
                        } else if let Some(surface_err) = e.downcast_ref::<wgpu::SurfaceError>() {
                            match surface_err {
                                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                                    let size = renderer.size();
                                    renderer.resize(size);
                                }
                                wgpu::SurfaceError::OutOfMemory => {
                                    log::error!("Out of memory!");
                                    event_loop.exit();
                                }
                                _ => {
                                    log::warn!("Surface error: {:?}", surface_err);
                                }
                            }
                        } else {
                            log::error!("Render error: {:?}", e);
                        }
                    }
                }

                // Request next frame
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Lux Viewer");

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => SceneConfig::load(&path)
            .with_context(|| format!("Failed to load scene {}", path.display()))?,
        None => {
            log::info!("No scene file given, using defaults");
            SceneConfig::default()
        }
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);

    log::info!("Running event loop");
    event_loop.run_app(&mut app)?;

    Ok(())
}
