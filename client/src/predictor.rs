//! Local steering prediction for the controlling peer.
//!
//! The authority owns the canonical rudder and replicates it to every
//! observer. The controlling peer keeps its own predicted rudder here so the
//! hull answers the helm without waiting a round trip. The two are never
//! written into the same storage; the prediction is only reset when the
//! authority freezes or releases the vessel.

use shared::physics::{effective_rudder, swing_rudder};
use shared::ShipProfile;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalSteeringPredictor {
    rudder_deg: f32,
    effective_rudder_deg: f32,
}

impl LocalSteeringPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swings the predicted rudder toward `input * max_rudder_angle` and
    /// recomputes the steerage-scaled angle at the given speed.
    pub fn update(&mut self, input: f32, speed_knots: f32, profile: &ShipProfile, dt: f32) {
        let input = if input.is_finite() {
            input.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        self.rudder_deg = swing_rudder(self.rudder_deg, input, profile, dt);
        self.refresh(speed_knots, profile);
    }

    /// Recomputes the effective angle without moving the rudder.
    pub fn refresh(&mut self, speed_knots: f32, profile: &ShipProfile) {
        self.effective_rudder_deg = effective_rudder(self.rudder_deg, speed_knots, profile);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn rudder_deg(&self) -> f32 {
        self.rudder_deg
    }

    pub fn effective_rudder_deg(&self) -> f32 {
        self.effective_rudder_deg
    }
}
