//! Mesh objects owned by the viewer: scene-file meshes and cubes spawned at runtime.

use std::sync::Arc;

use anyhow::{Context, Result};
use lux_core::{
    Material, Mesh, MeshPrimitive, ObjectHandle, ObjectRegistry, PlacementConfig, SceneConfig,
    Transform,
};
use lux_math::{hsv_to_rgb, Camera, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How far in front of the camera new cubes appear.
const SPAWN_DISTANCE: f32 = 15.0;
const SPAWN_MIN_SIZE: f32 = 2.0;
const SPAWN_MAX_SIZE: f32 = 5.0;

/// A mesh rotating about the world Y axis.
#[derive(Clone, Copy, Debug)]
struct Spinner {
    handle: ObjectHandle,
    radians_per_second: f32,
}

pub struct SceneObjects {
    cube: Arc<Mesh>,
    spawned: Vec<ObjectHandle>,
    spinners: Vec<Spinner>,
    placement: PlacementConfig,
    rng: StdRng,
}

impl SceneObjects {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            cube: Arc::new(Mesh::cube()),
            spawned: Vec::new(),
            spinners: Vec::new(),
            placement: config.placement.clone(),
            rng: StdRng::seed_from_u64(config.placement.seed.wrapping_add(1)),
        }
    }

    /// Load and register every mesh listed in the scene file.
    pub fn populate(&mut self, config: &SceneConfig, registry: &mut ObjectRegistry) -> Result<()> {
        for (i, spec) in config.meshes.iter().enumerate() {
            let mesh = spec
                .load_mesh()
                .with_context(|| format!("Failed to load meshes[{}]", i))?;
            log::info!(
                "Mesh {}: {} vertices, {} triangles",
                i,
                mesh.vertex_count(),
                mesh.triangle_count()
            );

            let handle = registry.register(MeshPrimitive::new(
                Arc::new(mesh),
                spec.transform(),
                spec.material(),
            ));

            if spec.spin_degrees_per_second != 0.0 {
                self.spinners.push(Spinner {
                    handle,
                    radians_per_second: spec.spin_degrees_per_second.to_radians(),
                });
            }
        }
        Ok(())
    }

    /// Register a randomly colored cube resting on the ground in front of the camera.
    pub fn spawn_cube(&mut self, registry: &mut ObjectRegistry, camera: &Camera) -> ObjectHandle {
        let size = self.rng.gen_range(SPAWN_MIN_SIZE..=SPAWN_MAX_SIZE);
        let ahead = camera.position + camera.forward_flat() * SPAWN_DISTANCE;

        let transform = Transform {
            translation: Vec3::new(ahead.x, size * 0.5, ahead.z),
            rotation: Quat::from_rotation_y(self.rng.gen_range(0.0..std::f32::consts::TAU)),
            scale: Vec3::splat(size),
        };

        let color = hsv_to_rgb(self.rng.gen(), self.rng.gen(), self.rng.gen());
        let material = if self.rng.gen::<f32>() < self.placement.metallic_probability {
            Material::metal(color)
        } else {
            Material::diffuse(color, self.placement.dielectric_specular)
        };

        let handle = registry.register(MeshPrimitive::new(self.cube.clone(), transform, material));
        self.spawned.push(handle);
        log::info!("Spawned cube {} ({} live)", handle, self.spawned.len());
        handle
    }

    /// Unregister the most recently spawned cube.
    pub fn despawn_last(&mut self, registry: &mut ObjectRegistry) -> Option<ObjectHandle> {
        let handle = self.spawned.pop()?;
        match registry.unregister(handle) {
            Ok(_) => log::info!("Removed cube {} ({} live)", handle, self.spawned.len()),
            Err(e) => log::warn!("{}", e),
        }
        Some(handle)
    }

    pub fn spawned(&self) -> &[ObjectHandle] {
        &self.spawned
    }

    /// Advance spinning meshes. Transform edits never trigger a rebuild.
    pub fn animate(&self, registry: &mut ObjectRegistry, delta_time: f32) {
        for spinner in &self.spinners {
            if let Some(mesh) = registry.mesh_mut(spinner.handle) {
                let step = Quat::from_rotation_y(spinner.radians_per_second * delta_time);
                mesh.transform.rotation = (step * mesh.transform.rotation).normalize();
            }
        }
    }
}
