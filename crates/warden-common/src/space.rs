//! 3D spatial helpers for vision cones and distance falloff.

pub use glam::Vec3;

/// World up axis.
pub const UP: Vec3 = Vec3::Y;

/// Angle in degrees between two directions.
///
/// Returns `None` when either vector is (near) zero length, since no angle
/// is defined for it.
#[must_use]
pub fn angle_between_deg(a: Vec3, b: Vec3) -> Option<f32> {
    if a.length_squared() <= f32::EPSILON || b.length_squared() <= f32::EPSILON {
        return None;
    }
    Some(a.angle_between(b).to_degrees())
}

/// Checks if `direction` lies inside a cone around `forward`.
///
/// `full_angle_deg` is the total opening of the cone, so the half-angle is
/// what gets compared. Degenerate directions are never inside.
#[must_use]
pub fn within_cone(forward: Vec3, direction: Vec3, full_angle_deg: f32) -> bool {
    angle_between_deg(forward, direction).is_some_and(|angle| angle <= full_angle_deg * 0.5)
}

/// Linear falloff from 1 at distance 0 down to 0 at `range`.
///
/// Distances beyond range clamp to 0. A non-positive range yields 0.
#[must_use]
pub fn linear_falloff(distance: f32, range: f32) -> f32 {
    if range <= 0.0 {
        return 0.0;
    }
    (1.0 - distance / range).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_between_axes() {
        let angle = angle_between_deg(Vec3::X, Vec3::Z).expect("defined angle");
        assert!((angle - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_angle_between_zero_vector() {
        assert!(angle_between_deg(Vec3::ZERO, Vec3::X).is_none());
    }

    #[test]
    fn test_within_cone_half_angle() {
        let forward = Vec3::Z;
        // 40 degrees off axis
        let dir = Vec3::new(40f32.to_radians().sin(), 0.0, 40f32.to_radians().cos());
        assert!(within_cone(forward, dir, 90.0));
        assert!(!within_cone(forward, dir, 60.0));
        assert!(!within_cone(forward, -Vec3::Z, 359.0));
    }

    #[test]
    fn test_linear_falloff() {
        assert!((linear_falloff(0.0, 10.0) - 1.0).abs() < f32::EPSILON);
        assert!((linear_falloff(5.0, 10.0) - 0.5).abs() < f32::EPSILON);
        assert_eq!(linear_falloff(15.0, 10.0), 0.0);
        assert_eq!(linear_falloff(1.0, 0.0), 0.0);
    }
}
