//! Waypoint course and point-to-point steering math.
//!
//! The authority's autopilot owns the canonical course; the controlling peer
//! keeps a mirror built from replicated events and runs the same math to
//! drive its local prediction while the autopilot is engaged.

use crate::math::{wrap_degrees, Pose, Vec3};
use serde::{Deserialize, Serialize};

/// Planar distance at which a waypoint counts as reached.
pub const ARRIVAL_RADIUS: f32 = 5.0;

/// Ordered course with a cursor on the next waypoint to reach.
///
/// Entries are only appended, consumed by advancing the cursor, or dropped all
/// at once; the cursor always stays within `0..=len`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaypointList {
    points: Vec<Vec3>,
    cursor: usize,
}

impl WaypointList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: Vec3) {
        self.points.push(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.cursor = 0;
    }

    /// Moves the cursor back to the first waypoint.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Steps past the current waypoint. Returns false when already exhausted.
    pub fn advance(&mut self) -> bool {
        if self.cursor < self.points.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<Vec3> {
        self.points.get(self.cursor).copied()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.points.len()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Compass bearing in degrees from `from` to `to`, in [-180, 180).
pub fn bearing_to(from: &Vec3, to: &Vec3) -> f32 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    dx.atan2(dy).to_degrees()
}

/// Angle the bow must swing through to face `target`; positive is starboard.
pub fn signed_angle_to(pose: &Pose, target: &Vec3) -> f32 {
    if pose.position.planar_distance(target) == 0.0 {
        return 0.0;
    }
    wrap_degrees(bearing_to(&pose.position, target) - pose.heading_deg)
}

/// Helm position in [-1, 1] that points the bow at `target`.
pub fn steering_intent(pose: &Pose, target: &Vec3, max_rudder_angle: f32) -> f32 {
    (signed_angle_to(pose, target) / max_rudder_angle).clamp(-1.0, 1.0)
}

pub fn has_arrived(pose: &Pose, target: &Vec3) -> bool {
    pose.position.planar_distance(target) < ARRIVAL_RADIUS
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_add_clear_add_leaves_single_point() {
        let p = Vec3::new(3.0, 4.0, 0.0);
        let mut course = WaypointList::new();
        course.push(p);
        course.clear();
        course.push(p);

        assert_eq!(course.points(), &[p]);
        assert_eq!(course.cursor(), 0);
    }

    #[test]
    fn test_cursor_never_passes_end() {
        let mut course = WaypointList::new();
        course.push(Vec3::new(1.0, 0.0, 0.0));

        assert!(course.advance());
        assert!(course.is_exhausted());
        assert_eq!(course.cursor(), 1);
        assert!(!course.advance());
        assert_eq!(course.cursor(), 1);
        assert_eq!(course.current(), None);
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut course = WaypointList::new();
        course.push(Vec3::new(1.0, 0.0, 0.0));
        course.push(Vec3::new(2.0, 0.0, 0.0));
        course.advance();
        course.clear();

        assert!(course.is_empty());
        assert_eq!(course.cursor(), 0);
    }

    #[test]
    fn test_signed_angle_positive_to_starboard() {
        let pose = Pose::new(Vec3::ZERO, 0.0);
        assert_approx_eq!(signed_angle_to(&pose, &Vec3::new(10.0, 0.0, 0.0)), 90.0, 1e-4);
        assert_approx_eq!(signed_angle_to(&pose, &Vec3::new(-10.0, 0.0, 0.0)), -90.0, 1e-4);
        assert_approx_eq!(signed_angle_to(&pose, &Vec3::new(0.0, 10.0, 0.0)), 0.0, 1e-4);
    }

    #[test]
    fn test_signed_angle_wraps_across_north() {
        let pose = Pose::new(Vec3::ZERO, 350.0);
        let target = Vec3::new(1.0, 10.0, 0.0);
        let angle = signed_angle_to(&pose, &target);
        assert!(angle > 10.0 && angle < 20.0, "angle was {}", angle);
    }

    #[test]
    fn test_steering_intent_is_clamped() {
        let pose = Pose::new(Vec3::ZERO, 0.0);
        assert_eq!(steering_intent(&pose, &Vec3::new(10.0, 0.0, 0.0), 35.0), 1.0);
        assert_eq!(steering_intent(&pose, &Vec3::new(-10.0, 0.0, 0.0), 35.0), -1.0);
        assert_eq!(steering_intent(&pose, &Vec3::ZERO, 35.0), 0.0);
    }

    #[test]
    fn test_arrival_is_planar_and_strict() {
        let pose = Pose::new(Vec3::ZERO, 0.0);
        assert!(has_arrived(&pose, &Vec3::new(4.9, 0.0, 50.0)));
        assert!(!has_arrived(&pose, &Vec3::new(5.0, 0.0, 0.0)));
    }
}
