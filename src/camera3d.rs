use glam::{Mat4, Vec3};
use serde::Deserialize;

const DEFAULT_UP: Vec3 = Vec3::Y;

/// Perspective camera for one viewport. Aspect follows the render target.
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    aspect: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, target, up: DEFAULT_UP, fov_y_radians, near, far, aspect: 1.0 }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Zero-height targets keep the previous aspect.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_radians, self.aspect.max(0.0001), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Whether `point` lands inside the clip volume.
    pub fn sees(&self, point: Vec3) -> bool {
        let clip = self.view_projection() * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return false;
        }
        let ndc = clip.truncate() / clip.w;
        ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0 && ndc.z.abs() <= 1.0
    }
}

/// Serialized camera placement.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CameraConfig {
    pub position: [f32; 3],
    #[serde(default)]
    pub target: [f32; 3],
    #[serde(default = "CameraConfig::default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "CameraConfig::default_near")]
    pub near: f32,
    #[serde(default = "CameraConfig::default_far")]
    pub far: f32,
}

impl CameraConfig {
    const fn default_fov_degrees() -> f32 {
        75.0
    }

    const fn default_near() -> f32 {
        0.1
    }

    const fn default_far() -> f32 {
        1000.0
    }

    pub const fn looking_at(position: [f32; 3], target: [f32; 3]) -> Self {
        Self {
            position,
            target,
            fov_degrees: Self::default_fov_degrees(),
            near: Self::default_near(),
            far: Self::default_far(),
        }
    }

    pub fn build(&self, width: u32, height: u32) -> Camera3D {
        let mut camera = Camera3D::new(
            Vec3::from_array(self.position),
            Vec3::from_array(self.target),
            self.fov_degrees.to_radians(),
            self.near,
            self.far,
        );
        camera.set_viewport(width, height);
        camera
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::looking_at([0.0, 10.0, 20.0], [0.0, 0.0, 0.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_projection_is_finite() {
        let camera = CameraConfig::looking_at([25.0, 12.5, 0.0], [0.0, 12.5, 0.0]).build(1280, 720);
        let vp = camera.view_projection();
        assert!(!vp.to_cols_array().iter().any(|v| v.is_nan() || v.is_infinite()));
        assert!((camera.aspect() - 1280.0 / 720.0).abs() < 1e-6);
    }

    #[test]
    fn sees_target_but_not_behind() {
        let mut camera = CameraConfig::default().build(800, 600);
        assert!(camera.sees(Vec3::ZERO));
        assert!(!camera.sees(Vec3::new(0.0, 10.0, 40.0)));
        camera.set_viewport(0, 600);
        assert!((camera.aspect() - 800.0 / 600.0).abs() < 1e-6);
    }
}
