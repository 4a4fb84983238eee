//! Procedural sphere placement.
//!
//! Generates up to `spheres_max` non-overlapping spheres resting on the
//! ground plane inside a disk. Candidates that collide with an already
//! accepted sphere are shrunk step by step; a candidate still colliding at
//! the minimum radius is dropped, so the accepted count can be lower than
//! requested. The same seed and config always yield the same spheres.

use lux_math::{hsv_to_rgb, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object::{Material, PointPrimitive};
use crate::registry::{ObjectHandle, ObjectRegistry};

/// Errors that can occur during placement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    #[error("Invalid placement config: {0}")]
    InvalidConfig(String),
}

/// Placement parameters. Set once, before the scene is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Number of candidate slots (upper bound on accepted spheres)
    pub spheres_max: u32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Radius of the disk sphere centres are sampled in
    pub placement_radius: f32,
    /// Radius decrement applied on each collision
    pub shrink_step: f32,
    /// Probability that an accepted sphere is metallic
    pub metallic_probability: f32,
    /// Specular reflectance of non-metallic spheres
    pub dielectric_specular: f32,
    pub seed: u64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            spheres_max: 100,
            min_radius: 1.0,
            max_radius: 5.0,
            placement_radius: 100.0,
            shrink_step: 0.5,
            metallic_probability: 0.5,
            dielectric_specular: 0.04,
            seed: 3,
        }
    }
}

impl PlacementConfig {
    /// Check the parameters. A non-positive shrink step is rejected.
    pub fn validate(&self) -> Result<(), PlacementError> {
        let invalid = |msg: String| -> Result<(), PlacementError> {
            Err(PlacementError::InvalidConfig(msg))
        };

        if !(self.min_radius >= 0.0) {
            return invalid(format!("min_radius must be >= 0, got {}", self.min_radius));
        }
        if !(self.max_radius >= self.min_radius) {
            return invalid(format!(
                "max_radius ({}) must be >= min_radius ({})",
                self.max_radius, self.min_radius
            ));
        }
        if !(self.shrink_step > 0.0) {
            return invalid(format!("shrink_step must be > 0, got {}", self.shrink_step));
        }
        if !(self.placement_radius >= 0.0) {
            return invalid(format!(
                "placement_radius must be >= 0, got {}",
                self.placement_radius
            ));
        }
        if !(0.0..=1.0).contains(&self.metallic_probability) {
            return invalid(format!(
                "metallic_probability must be in [0, 1], got {}",
                self.metallic_probability
            ));
        }
        if !(0.0..=1.0).contains(&self.dielectric_specular) {
            return invalid(format!(
                "dielectric_specular must be in [0, 1], got {}",
                self.dielectric_specular
            ));
        }
        Ok(())
    }
}

/// An accepted sphere with its sampled attributes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedSphere {
    pub position: Vec3,
    pub radius: f32,
    pub albedo: Vec3,
    pub specular: Vec3,
    pub metallic: bool,
}

impl PlacedSphere {
    pub fn to_primitive(&self) -> PointPrimitive {
        PointPrimitive::new(
            self.position,
            self.radius,
            Material::new(self.albedo, self.specular),
        )
    }
}

/// Result of a placement run.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    /// Accepted spheres in placement order
    pub spheres: Vec<PlacedSphere>,
    /// Number of candidate slots that were tried
    pub requested: u32,
}

impl Placement {
    pub fn accepted(&self) -> usize {
        self.spheres.len()
    }

    /// Candidates dropped because they still collided at the minimum radius.
    pub fn discarded(&self) -> usize {
        self.requested as usize - self.spheres.len()
    }

    /// Register every accepted sphere as a point primitive.
    pub fn register_all(&self, registry: &mut ObjectRegistry) -> Vec<ObjectHandle> {
        self.spheres
            .iter()
            .map(|sphere| registry.register(sphere.to_primitive()))
            .collect()
    }
}

/// Sphere centre and radius during placement.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    position: Vec3,
    radius: f32,
}

impl Candidate {
    /// Candidate resting on the ground plane at `(x, radius, z)`.
    fn grounded(x: f32, z: f32, radius: f32) -> Self {
        Self {
            position: Vec3::new(x, radius, z),
            radius,
        }
    }

    fn with_radius(self, radius: f32) -> Self {
        Self::grounded(self.position.x, self.position.z, radius)
    }
}

/// Two spheres collide when their centres are closer than the sum of their radii.
pub fn spheres_collide(a_position: Vec3, a_radius: f32, b_position: Vec3, b_radius: f32) -> bool {
    let min_dist = a_radius + b_radius;
    a_position.distance_squared(b_position) < min_dist * min_dist
}

fn collides_with_any(candidate: &Candidate, accepted: &[PlacedSphere]) -> bool {
    accepted
        .iter()
        .any(|s| spheres_collide(candidate.position, candidate.radius, s.position, s.radius))
}

/// Shrink `candidate` until it fits among `accepted`.
///
/// Returns `None` if it still collides once shrunk to `min_radius`.
fn settle_candidate(
    mut candidate: Candidate,
    accepted: &[PlacedSphere],
    min_radius: f32,
    shrink_step: f32,
) -> Option<Candidate> {
    loop {
        if !collides_with_any(&candidate, accepted) {
            return Some(candidate);
        }
        if candidate.radius <= min_radius {
            return None;
        }
        let next = (candidate.radius - shrink_step).max(min_radius);
        // A step below the float spacing at this radius makes no progress
        let next = if next < candidate.radius { next } else { min_radius };
        candidate = candidate.with_radius(next);
    }
}

/// Uniform sample inside a disk of the given radius (planar x/z).
fn sample_disk(rng: &mut StdRng, radius: f32) -> (f32, f32) {
    let r = radius * rng.gen::<f32>().sqrt();
    let theta = rng.gen::<f32>() * std::f32::consts::TAU;
    (r * theta.cos(), r * theta.sin())
}

/// Place spheres according to `config`.
pub fn place_spheres(config: &PlacementConfig) -> Result<Placement, PlacementError> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut spheres: Vec<PlacedSphere> = Vec::with_capacity(config.spheres_max as usize);

    for _ in 0..config.spheres_max {
        let radius = rng.gen_range(config.min_radius..=config.max_radius);
        let (x, z) = sample_disk(&mut rng, config.placement_radius);
        let candidate = Candidate::grounded(x, z, radius);

        let Some(candidate) =
            settle_candidate(candidate, &spheres, config.min_radius, config.shrink_step)
        else {
            continue;
        };

        let color = hsv_to_rgb(rng.gen(), rng.gen(), rng.gen());
        let metallic = rng.gen::<f32>() < config.metallic_probability;
        let (albedo, specular) = if metallic {
            (Vec3::ZERO, color)
        } else {
            (color, Vec3::splat(config.dielectric_specular))
        };

        spheres.push(PlacedSphere {
            position: candidate.position,
            radius: candidate.radius,
            albedo,
            specular,
            metallic,
        });
    }

    let placement = Placement {
        spheres,
        requested: config.spheres_max,
    };

    if placement.discarded() > 0 {
        log::debug!(
            "Placement exhausted: {} of {} spheres placed",
            placement.accepted(),
            placement.requested
        );
    }
    log::info!(
        "Placed {} spheres (seed {}, disk radius {:.1})",
        placement.accepted(),
        config.seed,
        config.placement_radius
    );

    Ok(placement)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(position: Vec3, radius: f32) -> PlacedSphere {
        PlacedSphere {
            position,
            radius,
            albedo: Vec3::ONE,
            specular: Vec3::ZERO,
            metallic: false,
        }
    }

    #[test]
    fn test_collision_predicate() {
        // Radius 3 each, 4 apart: 4 < 6
        assert!(spheres_collide(Vec3::ZERO, 3.0, Vec3::new(4.0, 0.0, 0.0), 3.0));
        // Radius 1 each, 4 apart: 4 >= 2
        assert!(!spheres_collide(Vec3::ZERO, 1.0, Vec3::new(4.0, 0.0, 0.0), 1.0));
        // Touching is not colliding
        assert!(!spheres_collide(Vec3::ZERO, 1.0, Vec3::new(2.0, 0.0, 0.0), 1.0));
    }

    #[test]
    fn test_shrunk_candidate_accepted() {
        let accepted = [placed(Vec3::new(0.0, 3.0, 0.0), 3.0)];
        let candidate = Candidate::grounded(4.0, 0.0, 3.0);

        let settled = settle_candidate(candidate, &accepted, 1.0, 2.0).unwrap();
        assert_eq!(settled.radius, 1.0);
        assert_eq!(settled.position, Vec3::new(4.0, 1.0, 0.0));
        assert!(!collides_with_any(&settled, &accepted));
    }

    #[test]
    fn test_candidate_discarded_at_min_radius() {
        let accepted = [placed(Vec3::new(0.0, 3.0, 0.0), 3.0)];
        // Same spot: no amount of shrinking helps
        let candidate = Candidate::grounded(0.0, 0.0, 2.0);

        assert!(settle_candidate(candidate, &accepted, 1.0, 0.5).is_none());
    }

    #[test]
    fn test_shrink_stops_at_min_radius() {
        let accepted = [placed(Vec3::new(0.0, 1.0, 0.0), 1.0)];
        // Step overshoots the minimum; the radius must clamp to min, not go below
        let candidate = Candidate::grounded(2.3, 0.0, 2.0);

        let settled = settle_candidate(candidate, &accepted, 1.0, 5.0).unwrap();
        assert_eq!(settled.radius, 1.0);
    }

    #[test]
    fn test_tiny_step_at_large_radius_terminates() {
        let accepted = [placed(Vec3::new(0.0, 1.0e8, 0.0), 1.0e8)];
        // 0.5 is far below the f32 spacing at 1e8
        let candidate = Candidate::grounded(0.0, 0.0, 9.0e7);

        assert!(settle_candidate(candidate, &accepted, 1.0, 0.5).is_none());
    }

    #[test]
    fn test_large_max_radius_terminates() {
        let config = PlacementConfig {
            spheres_max: 2,
            min_radius: 1.0,
            max_radius: 1.0e8,
            placement_radius: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        // Both candidates sit at the origin, so the second one is dropped
        let placement = place_spheres(&config).unwrap();
        assert_eq!(placement.accepted(), 1);
        assert_eq!(placement.discarded(), 1);
    }

    #[test]
    fn test_deterministic() {
        let config = PlacementConfig {
            spheres_max: 200,
            placement_radius: 40.0,
            ..Default::default()
        };

        let a = place_spheres(&config).unwrap();
        let b = place_spheres(&config).unwrap();
        assert_eq!(a, b);

        let c = place_spheres(&PlacementConfig {
            seed: config.seed + 1,
            ..config.clone()
        })
        .unwrap();
        assert_ne!(a.spheres, c.spheres);
    }

    #[test]
    fn test_no_overlap() {
        let config = PlacementConfig {
            spheres_max: 300,
            placement_radius: 30.0,
            ..Default::default()
        };
        let placement = place_spheres(&config).unwrap();

        for (i, a) in placement.spheres.iter().enumerate() {
            for b in &placement.spheres[i + 1..] {
                let min_dist = a.radius + b.radius;
                assert!(
                    a.position.distance_squared(b.position) >= min_dist * min_dist - 1e-3,
                    "{:?} overlaps {:?}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_attributes_in_range() {
        let config = PlacementConfig::default();
        let placement = place_spheres(&config).unwrap();

        assert!(placement.accepted() > 0);
        for s in &placement.spheres {
            assert!(s.radius >= config.min_radius && s.radius <= config.max_radius);
            assert_eq!(s.position.y, s.radius, "spheres rest on the ground plane");
            assert!(s.position.x.hypot(s.position.z) <= config.placement_radius + 1e-3);
            if s.metallic {
                assert_eq!(s.albedo, Vec3::ZERO);
            } else {
                assert_eq!(s.specular, Vec3::splat(config.dielectric_specular));
            }
        }
    }

    #[test]
    fn test_crowded_disk_discards() {
        let _ = env_logger::builder().is_test(true).try_init();

        // A tiny disk cannot hold 50 spheres of radius >= 1
        let config = PlacementConfig {
            spheres_max: 50,
            placement_radius: 2.0,
            ..Default::default()
        };
        let placement = place_spheres(&config).unwrap();

        assert!(placement.accepted() < 50);
        assert_eq!(placement.accepted() + placement.discarded(), 50);
    }

    #[test]
    fn test_metallic_probability_extremes() {
        let all_metal = place_spheres(&PlacementConfig {
            metallic_probability: 1.0,
            ..Default::default()
        })
        .unwrap();
        assert!(all_metal.spheres.iter().all(|s| s.metallic));

        let no_metal = place_spheres(&PlacementConfig {
            metallic_probability: 0.0,
            ..Default::default()
        })
        .unwrap();
        assert!(no_metal.spheres.iter().all(|s| !s.metallic));
    }

    #[test]
    fn test_invalid_config() {
        let bad = [
            PlacementConfig {
                shrink_step: 0.0,
                ..Default::default()
            },
            PlacementConfig {
                min_radius: 3.0,
                max_radius: 2.0,
                ..Default::default()
            },
            PlacementConfig {
                metallic_probability: 1.5,
                ..Default::default()
            },
        ];
        for config in &bad {
            assert!(matches!(
                place_spheres(config),
                Err(PlacementError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_register_all() {
        let placement = place_spheres(&PlacementConfig {
            spheres_max: 10,
            ..Default::default()
        })
        .unwrap();
        let mut registry = ObjectRegistry::new();

        let handles = placement.register_all(&mut registry);
        assert_eq!(handles.len(), placement.accepted());
        assert_eq!(registry.point_count(), placement.accepted());
        assert!(!registry.is_dirty());
    }
}
