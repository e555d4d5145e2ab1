use glam::{EulerRot, Mat4, Quat, Vec3};
use rand::Rng;
use serde::Deserialize;
use std::f32::consts::TAU;

/// Axis-aligned box given by its min/max corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds3 {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min: min.min(max), max: min.max(max) }
    }

    pub fn from_center_half(center: Vec3, half: Vec3) -> Self {
        Self::new(center - half.abs(), center + half.abs())
    }

    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Inclusive on every face.
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// World-space box enclosing this box after `transform`.
    pub fn transformed(&self, transform: Mat4) -> Self {
        let corners = self.corners().map(|c| transform.transform_point3(c));
        Self::from_points(corners).unwrap_or(*self)
    }

    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        Vec3::new(
            sample_axis(rng, self.min.x, self.max.x),
            sample_axis(rng, self.min.y, self.max.y),
            sample_axis(rng, self.min.z, self.max.z),
        )
    }
}

fn sample_axis<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    }
}

/// Independent uniform Euler angles per axis, composed in XYZ order.
pub fn random_orientation<R: Rng + ?Sized>(rng: &mut R) -> Quat {
    Quat::from_euler(EulerRot::XYZ, rng.gen_range(0.0..TAU), rng.gen_range(0.0..TAU), rng.gen_range(0.0..TAU))
}

/// Serialized form of [`Bounds3`] used by scene configs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundsConfig {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundsConfig {
    pub const fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }
}

impl From<BoundsConfig> for Bounds3 {
    fn from(cfg: BoundsConfig) -> Self {
        Bounds3::new(Vec3::from_array(cfg.min), Vec3::from_array(cfg.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn containment_includes_faces() {
        let region = Bounds3::new(Vec3::new(-5.0, 10.0, -5.0), Vec3::new(5.0, 60.0, 5.0));
        assert!(region.contains_point(Vec3::new(5.0, 60.0, -5.0)));
        assert!(region.contains_point(Vec3::new(0.0, 10.0, 0.0)));
        assert!(!region.contains_point(Vec3::new(0.0, 60.001, 0.0)));
        assert!(!region.contains_point(Vec3::new(-5.01, 30.0, 0.0)));
    }

    #[test]
    fn transformed_box_encloses_rotated_corners() {
        let unit = Bounds3::from_center_half(Vec3::ZERO, Vec3::splat(1.0));
        let rotated = unit.transformed(Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4));
        let expected = 2f32.sqrt();
        assert!((rotated.max.x - expected).abs() < 1e-5);
        assert!((rotated.max.y - 1.0).abs() < 1e-5);

        let moved = unit.transformed(Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::IDENTITY,
            Vec3::new(0.0, 5.0, 0.0),
        ));
        assert_eq!(moved.max, Vec3::new(2.0, 7.0, 2.0));
        assert_eq!(moved.min, Vec3::new(-2.0, 3.0, -2.0));
    }

    #[test]
    fn samples_stay_inside_and_degenerate_axes_pin() {
        let mut rng = StdRng::seed_from_u64(7);
        let volume = Bounds3::new(Vec3::new(-5.0, 30.0, 2.0), Vec3::new(5.0, 80.0, 2.0));
        for _ in 0..256 {
            let p = volume.sample_point(&mut rng);
            assert!(volume.contains_point(p), "{p:?} escaped {volume:?}");
            assert_eq!(p.z, 2.0);
        }
        let q = random_orientation(&mut rng);
        assert!((q.length() - 1.0).abs() < 1e-4);
    }
}
