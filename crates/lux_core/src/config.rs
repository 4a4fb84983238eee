//! Scene configuration file.
//!
//! A JSON document with five optional sections. Every field has a default,
//! so `{}` is a valid scene:
//!
//! ```json
//! {
//!   "placement": { "spheres_max": 100, "seed": 3 },
//!   "light": { "direction": [-0.4, -0.8, 0.45], "intensity": 1.0 },
//!   "render": { "accumulation": "progressive", "tile_size": 8, "max_bounces": 8 },
//!   "camera": { "position": [0.0, 20.0, -120.0], "pitch_degrees": -10.0 },
//!   "meshes": [ { "source": { "kind": "cube" }, "translation": [0.0, 4.0, 0.0] } ]
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use lux_math::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mesh::{Mesh, MeshError};
use crate::object::{Material, Transform};
use crate::placement::{PlacementConfig, PlacementError};

/// Errors that can occur while loading a scene file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read scene file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scene file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scene config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// How successive frames are combined in the accumulation target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulationMode {
    /// Running average over frames, restarted whenever the view or scene changes
    #[default]
    Progressive,
    /// Every frame replaces the previous one
    Independent,
}

impl AccumulationMode {
    pub fn toggled(self) -> Self {
        match self {
            AccumulationMode::Progressive => AccumulationMode::Independent,
            AccumulationMode::Independent => AccumulationMode::Progressive,
        }
    }
}

impl fmt::Display for AccumulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccumulationMode::Progressive => write!(f, "progressive"),
            AccumulationMode::Independent => write!(f, "independent"),
        }
    }
}

/// Directional light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    /// Direction the light travels in (need not be normalized)
    pub direction: [f32; 3],
    pub intensity: f32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            direction: [-0.4, -0.8, 0.45],
            intensity: 1.0,
        }
    }
}

impl LightSettings {
    /// Normalized travel direction.
    pub fn direction(&self) -> Vec3 {
        Vec3::from(self.direction)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Y)
    }
}

/// Kernel dispatch and accumulation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub accumulation: AccumulationMode,
    /// Tile edge in pixels; must match the kernel's workgroup size
    pub tile_size: u32,
    pub max_bounces: u32,
    /// Equirectangular sky image. A gradient is used when absent.
    pub skybox: Option<PathBuf>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            accumulation: AccumulationMode::Progressive,
            tile_size: 8,
            max_bounces: 8,
            skybox: None,
        }
    }
}

/// Initial first-person camera state and control speeds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub yaw_degrees: f32,
    pub pitch_degrees: f32,
    pub fov_degrees: f32,
    /// World units per second
    pub move_speed: f32,
    /// Degrees per pixel of mouse motion
    pub look_sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [0.0, 20.0, -120.0],
            yaw_degrees: 180.0,
            pitch_degrees: -10.0,
            fov_degrees: 60.0,
            move_speed: 20.0,
            look_sensitivity: 0.2,
        }
    }
}

/// Where a mesh's geometry comes from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MeshSource {
    #[default]
    Cube,
    Obj {
        path: PathBuf,
    },
}

/// A mesh object placed by the scene file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSpec {
    pub source: MeshSource,
    pub translation: [f32; 3],
    /// Euler angles in degrees, applied Y then X then Z
    pub rotation_degrees: [f32; 3],
    pub scale: [f32; 3],
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
    /// Rotation about the world Y axis, animated by the viewer
    pub spin_degrees_per_second: f32,
}

impl Default for MeshSpec {
    fn default() -> Self {
        Self {
            source: MeshSource::Cube,
            translation: [0.0; 3],
            rotation_degrees: [0.0; 3],
            scale: [1.0; 3],
            albedo: [0.8; 3],
            specular: [0.04; 3],
            spin_degrees_per_second: 0.0,
        }
    }
}

impl MeshSpec {
    pub fn transform(&self) -> Transform {
        let [x, y, z] = self.rotation_degrees;
        Transform {
            translation: Vec3::from(self.translation),
            rotation: Quat::from_euler(
                EulerRot::YXZ,
                y.to_radians(),
                x.to_radians(),
                z.to_radians(),
            ),
            scale: Vec3::from(self.scale),
        }
    }

    pub fn material(&self) -> Material {
        Material::new(Vec3::from(self.albedo), Vec3::from(self.specular))
    }

    /// Build or load the geometry.
    pub fn load_mesh(&self) -> Result<Mesh, MeshError> {
        match &self.source {
            MeshSource::Cube => Ok(Mesh::cube()),
            MeshSource::Obj { path } => Mesh::load_obj(path),
        }
    }
}

/// Complete scene description.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub placement: PlacementConfig,
    pub light: LightSettings,
    pub render: RenderSettings,
    pub camera: CameraSettings,
    pub meshes: Vec<MeshSpec>,
}

impl SceneConfig {
    /// Load and validate a scene file.
    ///
    /// Relative asset paths are resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_json_str(&text)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }

        log::info!(
            "Loaded scene {}: {} sphere slots, {} meshes",
            path.display(),
            config.placement.spheres_max,
            config.meshes.len()
        );
        Ok(config)
    }

    /// Parse and validate a scene from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.placement.validate()?;

        if self.render.tile_size == 0 {
            return Err(ConfigError::Invalid("render.tile_size must be > 0".into()));
        }
        if self.render.max_bounces == 0 {
            return Err(ConfigError::Invalid("render.max_bounces must be > 0".into()));
        }
        if Vec3::from(self.light.direction).length_squared() == 0.0 {
            return Err(ConfigError::Invalid("light.direction must be non-zero".into()));
        }
        if !(self.camera.fov_degrees > 0.0 && self.camera.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "camera.fov_degrees must be in (0, 180), got {}",
                self.camera.fov_degrees
            )));
        }
        for (i, mesh) in self.meshes.iter().enumerate() {
            if mesh.scale.iter().any(|&s| s == 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "meshes[{}].scale has a zero component",
                    i
                )));
            }
        }

        Ok(())
    }

    /// Make relative asset paths relative to `dir`.
    pub fn resolve_paths(&mut self, dir: &Path) {
        if let Some(skybox) = &mut self.render.skybox {
            if skybox.is_relative() {
                *skybox = dir.join(&*skybox);
            }
        }
        for mesh in &mut self.meshes {
            if let MeshSource::Obj { path } = &mut mesh.source {
                if path.is_relative() {
                    *path = dir.join(&*path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = SceneConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SceneConfig::default());
        assert_eq!(config.placement.spheres_max, 100);
        assert_eq!(config.render.tile_size, 8);
        assert_eq!(config.render.accumulation, AccumulationMode::Progressive);
        assert!(config.meshes.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let config = SceneConfig::from_json_str(
            r#"{
                "placement": { "spheres_max": 12, "seed": 7 },
                "render": { "accumulation": "independent" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.placement.spheres_max, 12);
        assert_eq!(config.placement.seed, 7);
        assert_eq!(config.placement.min_radius, 1.0);
        assert_eq!(config.render.accumulation, AccumulationMode::Independent);
        assert_eq!(config.render.max_bounces, 8);
    }

    #[test]
    fn test_mesh_sources() {
        let config = SceneConfig::from_json_str(
            r#"{
                "meshes": [
                    { "source": { "kind": "cube" }, "translation": [1, 2, 3] },
                    { "source": { "kind": "obj", "path": "models/teapot.obj" } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.meshes[0].source, MeshSource::Cube);
        assert_eq!(config.meshes[0].translation, [1.0, 2.0, 3.0]);
        assert_eq!(config.meshes[0].scale, [1.0; 3]);
        assert_eq!(
            config.meshes[1].source,
            MeshSource::Obj {
                path: PathBuf::from("models/teapot.obj")
            }
        );
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = SceneConfig::from_json_str(
            r#"{
                "render": { "skybox": "sky.png" },
                "meshes": [{ "source": { "kind": "obj", "path": "a.obj" } }]
            }"#,
        )
        .unwrap();
        config.resolve_paths(Path::new("scenes"));

        assert_eq!(config.render.skybox, Some(PathBuf::from("scenes/sky.png")));
        assert_eq!(
            config.meshes[0].source,
            MeshSource::Obj {
                path: PathBuf::from("scenes/a.obj")
            }
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            SceneConfig::from_json_str(r#"{ "render": { "tile_size": 0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SceneConfig::from_json_str(r#"{ "light": { "direction": [0, 0, 0] } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SceneConfig::from_json_str(r#"{ "placement": { "min_radius": 6 } }"#),
            Err(ConfigError::Placement(_))
        ));
        assert!(matches!(
            SceneConfig::from_json_str(r#"{ "render": { "accumulation": "sometimes" } }"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = SceneConfig::load("does/not/exist.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_mesh_spec_transform() {
        let spec = MeshSpec {
            translation: [0.0, 3.0, 0.0],
            rotation_degrees: [0.0, 90.0, 0.0],
            scale: [2.0; 3],
            ..Default::default()
        };
        let m = spec.transform().to_matrix();
        let p = m.transform_point3(Vec3::X);
        assert!((p - Vec3::new(0.0, 3.0, -2.0)).length() < 1e-5);
    }

    #[test]
    fn test_accumulation_toggle() {
        assert_eq!(
            AccumulationMode::Progressive.toggled(),
            AccumulationMode::Independent
        );
        assert_eq!(AccumulationMode::Independent.to_string(), "independent");
    }

    #[test]
    fn test_demo_scene_parses() {
        let config = SceneConfig::from_json_str(include_str!("../../../scenes/demo.json")).unwrap();
        assert!(!config.meshes.is_empty());
    }
}
