use glam::{Mat4, Vec3};

/// Maximum pitch magnitude, keeps the view from flipping over the poles.
const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;

/// First-person camera for ray generation.
///
/// Orientation is stored as yaw (around +Y) and pitch (around the camera's
/// right axis). Yaw 0 / pitch 0 looks down -Z.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(position: Vec3, yaw: f32, pitch: f32, aspect: f32) -> Self {
        Self {
            position,
            yaw,
            pitch: pitch.clamp(-MAX_PITCH, MAX_PITCH),
            fov_y: 60.0_f32.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Unit view direction
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            -self.yaw.cos() * self.pitch.cos(),
        )
    }

    /// Unit view direction projected onto the ground plane
    pub fn forward_flat(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    /// Unit right vector (always horizontal)
    pub fn right(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin())
    }

    /// Get the view matrix (world → camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// Camera → world transform, the inverse of the view matrix
    pub fn camera_to_world(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    /// Get the projection matrix (camera → clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Clip → camera space, used by the kernel to build primary rays
    pub fn inverse_projection(&self) -> Mat4 {
        self.projection_matrix().inverse()
    }

    /// Turn the camera by the given angles (radians). Pitch is clamped.
    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw = (self.yaw + delta_yaw).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + delta_pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Walk in the camera's horizontal frame.
    ///
    /// `right`, `up` and `forward` are unitless input axes (usually -1, 0 or 1),
    /// scaled by `speed` units per second.
    pub fn translate(&mut self, right: f32, up: f32, forward: f32, speed: f32, delta_time: f32) {
        let direction = self.right() * right + Vec3::Y * up + self.forward_flat() * forward;
        if direction.length_squared() > 0.0 {
            self.position += direction.normalize() * speed * delta_time;
        }
    }

    /// Update aspect ratio (e.g., on window resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(Vec3::new(0.0, 2.0, 5.0), 0.0, 0.0, 16.0 / 9.0);

        assert_eq!(camera.position, Vec3::new(0.0, 2.0, 5.0));
        assert_eq!(camera.aspect, 16.0 / 9.0);
        assert!((camera.forward() - Vec3::NEG_Z).length() < 1e-6);
        assert!((camera.right() - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_camera_to_world_origin() {
        let camera = Camera::new(Vec3::new(3.0, 4.0, 5.0), 0.7, -0.2, 1.0);

        let origin = camera.camera_to_world().transform_point3(Vec3::ZERO);
        assert!((origin - camera.position).length() < 1e-4);

        // -Z in camera space is the view direction in world space
        let dir = camera.camera_to_world().transform_vector3(Vec3::NEG_Z);
        assert!((dir.normalize() - camera.forward()).length() < 1e-4);
    }

    #[test]
    fn test_inverse_projection() {
        let camera = Camera::new(Vec3::ZERO, 0.0, 0.0, 16.0 / 9.0);

        let clip = camera.inverse_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let view = clip.truncate() / clip.w;
        // Centre of the near plane lies straight ahead
        assert!(view.x.abs() < 1e-5);
        assert!(view.y.abs() < 1e-5);
        assert!((view.z + camera.near).abs() < 1e-4);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 0.0, 1.0);

        camera.rotate(0.0, 10.0);
        assert!((camera.pitch - MAX_PITCH).abs() < 1e-6);

        camera.rotate(0.0, -20.0);
        assert!((camera.pitch + MAX_PITCH).abs() < 1e-6);
    }

    #[test]
    fn test_translate_stays_horizontal() {
        let mut camera = Camera::new(Vec3::new(0.0, 1.0, 0.0), 0.0, 0.5, 1.0);

        camera.translate(0.0, 0.0, 1.0, 2.0, 0.5);
        assert!((camera.position.y - 1.0).abs() < 1e-6);
        assert!((camera.position.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_aspect_update() {
        let mut camera = Camera::new(Vec3::ZERO, 0.0, 0.0, 1.0);

        camera.set_aspect(16.0 / 9.0);
        assert_eq!(camera.aspect, 16.0 / 9.0);
    }
}
