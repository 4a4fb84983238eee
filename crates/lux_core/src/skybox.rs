//! Sky images sampled by the kernel when a ray escapes the scene.
//!
//! Images are equirectangular and kept as 8-bit sRGB RGBA, the format they
//! are uploaded in. When no file is configured a procedural gradient is used.

use std::path::Path;

use lux_math::Vec3;
use thiserror::Error;

/// Errors that can occur during skybox loading.
#[derive(Error, Debug)]
pub enum SkyboxError {
    #[error("Failed to load skybox: {0}")]
    Load(String),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),
}

/// Equirectangular sky image, row-major, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct Skybox {
    pub width: u32,
    pub height: u32,
    /// sRGB encoded RGBA
    pub pixels: Vec<[u8; 4]>,
}

impl Skybox {
    /// Load an image file. Any format the `image` crate decodes is accepted.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SkyboxError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SkyboxError::Load(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(SkyboxError::Load(format!("empty image: {}", path.display())));
        }

        log::info!("Loaded skybox {} ({}x{})", path.display(), width, height);
        Ok(Self {
            width,
            height,
            pixels: rgba.pixels().map(|p| p.0).collect(),
        })
    }

    /// Procedural sky: ground color below the horizon, horizon to zenith blend above.
    pub fn gradient(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);

        let zenith = Vec3::new(0.25, 0.45, 0.85);
        let horizon = Vec3::new(0.85, 0.9, 0.95);
        let ground = Vec3::new(0.3, 0.28, 0.25);

        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            // +1 at the top row, -1 at the bottom
            let elevation = 1.0 - 2.0 * (y as f32 + 0.5) / height as f32;
            let color = if elevation >= 0.0 {
                horizon.lerp(zenith, elevation.sqrt())
            } else {
                horizon.lerp(ground, (-elevation * 4.0).min(1.0))
            };
            let texel = to_srgb8(color);
            pixels.extend(std::iter::repeat(texel).take(width as usize));
        }

        Self {
            width,
            height,
            pixels,
        }
    }

    /// Pixel data as a byte slice for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

fn to_srgb8(linear: Vec3) -> [u8; 4] {
    let encode = |c: f32| {
        let c = c.clamp(0.0, 1.0);
        let s = if c <= 0.003_130_8 {
            c * 12.92
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        };
        (s * 255.0).round() as u8
    };
    [encode(linear.x), encode(linear.y), encode(linear.z), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(sky: &Skybox, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= sky.width || y >= sky.height {
            return None;
        }
        sky.pixels.get((y * sky.width + x) as usize).copied()
    }

    #[test]
    fn test_gradient_dimensions() {
        let sky = Skybox::gradient(16, 8);
        assert_eq!(sky.pixels.len(), 16 * 8);
        assert_eq!(sky.as_bytes().len(), 16 * 8 * 4);
        assert_eq!(pixel(&sky, 16, 0), None);
    }

    #[test]
    fn test_gradient_sky_above_ground() {
        let sky = Skybox::gradient(4, 64);
        let top = pixel(&sky, 0, 0).unwrap();
        let bottom = pixel(&sky, 0, 63).unwrap();

        // Zenith is blue dominated, ground is not
        assert!(top[2] > top[0]);
        assert!(bottom[2] <= bottom[0]);
        // Rows are uniform
        assert_eq!(pixel(&sky, 0, 10), pixel(&sky, 3, 10));
    }

    #[test]
    fn test_gradient_never_empty() {
        let sky = Skybox::gradient(0, 0);
        assert_eq!((sky.width, sky.height), (1, 1));
        assert_eq!(sky.pixels.len(), 1);
    }

    #[test]
    fn test_srgb_encoding_endpoints() {
        assert_eq!(to_srgb8(Vec3::ZERO), [0, 0, 0, 255]);
        assert_eq!(to_srgb8(Vec3::ONE), [255, 255, 255, 255]);
        assert_eq!(to_srgb8(Vec3::splat(0.5))[0], 188);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Skybox::load("/nonexistent/sky.png").unwrap_err();
        assert!(matches!(err, SkyboxError::Load(_)));
    }

    #[test]
    fn test_load_png() {
        let path = std::env::temp_dir().join("lux_core_skybox_test.png");
        let image = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        image.save(&path).unwrap();

        let sky = Skybox::load(&path).unwrap();
        assert_eq!((sky.width, sky.height), (4, 2));
        assert_eq!(pixel(&sky, 3, 1), Some([10, 20, 30, 255]));

        std::fs::remove_file(&path).ok();
    }
}
