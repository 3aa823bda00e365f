use serde::{Deserialize, Serialize};

/// Point or direction in world space.
///
/// The ocean is the XY plane; `z` is carried for waypoints but ignored by
/// navigation, which is planar.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(&self, scalar: f32) -> Vec3 {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }

    /// Distance measured in the XY plane only.
    pub fn planar_distance(&self, other: &Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Position and compass heading of a hull.
///
/// Heading is in degrees, clockwise from +Y: 0 faces +Y, 90 faces +X.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub heading_deg: f32,
}

impl Pose {
    pub fn new(position: Vec3, heading_deg: f32) -> Self {
        Self {
            position,
            heading_deg: normalize_heading(heading_deg),
        }
    }

    /// Unit vector along the bow.
    pub fn forward(&self) -> Vec3 {
        let radians = self.heading_deg.to_radians();
        Vec3::new(radians.sin(), radians.cos(), 0.0)
    }
}

/// Moves `current` toward `target` by at most `max_delta`, never overshooting.
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let difference = target - current;
    if difference.abs() <= max_delta {
        target
    } else {
        current + difference.signum() * max_delta
    }
}

/// Inverse of a linear interpolation, clamped to [0, 1].
pub fn inverse_lerp(from: f32, to: f32, value: f32) -> f32 {
    if from == to {
        return 0.0;
    }
    ((value - from) / (to - from)).clamp(0.0, 1.0)
}

pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Maps any angle onto [0, 360).
pub fn normalize_heading(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Maps any angle onto [-180, 180).
pub fn wrap_degrees(degrees: f32) -> f32 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}
