//! Deterministic hull integrator shared by the authority and the predicting peer.
//!
//! Every function here is a pure function of its arguments. The authority and
//! the controlling peer call the same code with the same fixed `dt`, so a
//! prediction only diverges from the canonical state by what the network has
//! not delivered yet.

use crate::math::{inverse_lerp, lerp, move_towards, normalize_heading, Pose, Vec3};
use crate::profile::ShipProfile;
use serde::{Deserialize, Serialize};

pub const KNOTS_PER_METRE_PER_SECOND: f32 = 1.94384;
/// Highest throttle notch in either direction.
pub const MAX_THROTTLE: i8 = 4;
/// Reverse tops out at half of forward speed.
pub const REVERSE_SPEED_FRACTION: f32 = 0.5;
/// Water flow from the propeller keeps a stopped hull steerable.
pub const PROP_WASH_SPEED: f32 = 0.5;
pub const MIN_STEERAGE_EFFECT: f32 = 0.15;
const TURN_FACTOR_SCALE: f32 = 10.0;

/// Server-wide tuning applied on top of every ship profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    pub speed_multiplier: f32,
}

impl Tuning {
    pub const MIN_SPEED_MULTIPLIER: f32 = 0.1;
    pub const MAX_SPEED_MULTIPLIER: f32 = 2.0;

    /// Non-finite multipliers fall back to 1.0.
    pub fn new(speed_multiplier: f32) -> Self {
        let speed_multiplier = if speed_multiplier.is_finite() {
            speed_multiplier
        } else {
            Self::default().speed_multiplier
        };
        Self {
            speed_multiplier: speed_multiplier
                .clamp(Self::MIN_SPEED_MULTIPLIER, Self::MAX_SPEED_MULTIPLIER),
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
        }
    }
}

/// Kinematic state advanced by [`integrate`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Motion {
    pub pose: Pose,
    /// Signed; negative when going astern.
    pub speed_knots: f32,
    /// World-space metres per second.
    pub velocity: Vec3,
    /// Degrees per second, positive turns to starboard.
    pub angular_velocity: f32,
}

impl Motion {
    pub fn at(pose: Pose) -> Self {
        Self {
            pose,
            ..Default::default()
        }
    }
}

/// Speed in knots the engine settles at for a throttle notch.
pub fn target_speed(throttle: i8, profile: &ShipProfile, tuning: &Tuning) -> f32 {
    let notch = throttle.clamp(-MAX_THROTTLE, MAX_THROTTLE) as f32;
    let steps = MAX_THROTTLE as f32;

    let speed = if throttle > 0 {
        lerp(0.0, profile.max_speed, notch / steps)
    } else if throttle < 0 {
        lerp(0.0, -profile.max_speed * REVERSE_SPEED_FRACTION, -notch / steps)
    } else {
        0.0
    };

    speed * tuning.speed_multiplier
}

/// Fraction of rudder authority available at `speed_knots`.
pub fn steerage_effect(speed_knots: f32, steerageway: f32) -> f32 {
    let water_flow = speed_knots.abs().max(PROP_WASH_SPEED);
    inverse_lerp(0.0, steerageway, water_flow).max(MIN_STEERAGE_EFFECT)
}

pub fn effective_rudder(rudder_deg: f32, speed_knots: f32, profile: &ShipProfile) -> f32 {
    rudder_deg * steerage_effect(speed_knots, profile.steerageway)
}

/// Yaw rate in degrees per second produced by the effective rudder.
pub fn turn_rate(effective_rudder_deg: f32, speed_knots: f32, profile: &ShipProfile) -> f32 {
    let turning_factor = (profile.rudder_rate / profile.hull_length) * TURN_FACTOR_SCALE;
    let rudder_ratio = effective_rudder_deg / profile.max_rudder_angle;
    let speed_factor = (speed_knots.abs() / profile.max_speed).clamp(0.0, 1.0);
    turning_factor * rudder_ratio * speed_factor
}

/// Swings the rudder toward `intent * max_rudder_angle` at the rudder rate.
///
/// `intent` is a helm position in [-1, 1]; the result always respects the
/// rudder stops.
pub fn swing_rudder(current_deg: f32, intent: f32, profile: &ShipProfile, dt: f32) -> f32 {
    let target = intent.clamp(-1.0, 1.0) * profile.max_rudder_angle;
    move_towards(current_deg, target, profile.rudder_rate * dt).clamp(
        -profile.max_rudder_angle,
        profile.max_rudder_angle,
    )
}

/// Advances `motion` by one fixed tick.
pub fn integrate(
    motion: &Motion,
    throttle: i8,
    effective_rudder_deg: f32,
    profile: &ShipProfile,
    tuning: &Tuning,
    dt: f32,
) -> Motion {
    let target_knots = target_speed(throttle, profile, tuning);
    let current_knots = motion.speed_knots;

    let gaining = target_knots.abs() > current_knots.abs() && target_knots * current_knots >= 0.0;
    let rate = if gaining {
        profile.acceleration
    } else {
        profile.deceleration
    };

    let speed_ms = move_towards(
        current_knots / KNOTS_PER_METRE_PER_SECOND,
        target_knots / KNOTS_PER_METRE_PER_SECOND,
        rate * dt,
    );
    let speed_knots = speed_ms * KNOTS_PER_METRE_PER_SECOND;

    let angular_velocity = turn_rate(effective_rudder_deg, speed_knots, profile);
    let velocity = motion.pose.forward().scale(speed_ms);

    let pose = Pose {
        position: motion.pose.position.add(&velocity.scale(dt)),
        heading_deg: normalize_heading(motion.pose.heading_deg + angular_velocity * dt),
    };

    Motion {
        pose,
        speed_knots,
        velocity,
        angular_velocity,
    }
}
