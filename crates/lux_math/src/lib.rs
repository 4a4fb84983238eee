// Re-export glam for convenience
pub use glam::*;

// Lux math types
mod camera;
mod color;
pub use camera::Camera;
pub use color::hsv_to_rgb;
