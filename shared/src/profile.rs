//! Immutable ship performance profiles.
//!
//! A profile is supplied from outside the simulation (a preset or a JSON
//! file) and is only ever read by the integrator, the navigator and the
//! predictor. A vessel spawned without a valid profile stays inert.

use crate::physics::KNOTS_PER_METRE_PER_SECOND;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile file: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Failed to parse profile JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid ship profile: {0}")]
    ValidationError(String),
}

/// Hull classification, used to pick a preset profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShipClass {
    Destroyer,
    #[default]
    Frigate,
    Corvette,
    Patrol,
    Transport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipProfile {
    pub name: String,
    #[serde(default)]
    pub class: ShipClass,
    /// Knots at full ahead.
    pub max_speed: f32,
    /// m/s² while the engine is gaining speed.
    pub acceleration: f32,
    /// m/s² while the hull is losing speed.
    pub deceleration: f32,
    /// Degrees per second of rudder travel.
    pub rudder_rate: f32,
    pub max_rudder_angle: f32,
    /// Metres.
    pub hull_length: f32,
    /// Knots of water flow needed for full rudder authority.
    pub steerageway: f32,
}

impl ShipProfile {
    pub fn preset(class: ShipClass) -> Self {
        let (name, max_speed, acceleration, deceleration, rudder_rate, max_rudder_angle, hull_length, steerageway) =
            match class {
                ShipClass::Destroyer => ("Destroyer", 35.0, 1.5, 2.5, 18.0, 35.0, 120.0, 5.0),
                ShipClass::Frigate => ("Frigate", 28.0, 1.2, 2.0, 15.0, 35.0, 85.0, 4.0),
                ShipClass::Corvette => ("Corvette", 32.0, 1.8, 2.5, 20.0, 35.0, 60.0, 3.5),
                ShipClass::Patrol => ("Patrol", 40.0, 2.5, 3.0, 25.0, 40.0, 30.0, 2.5),
                ShipClass::Transport => ("Transport", 18.0, 0.6, 1.0, 8.0, 30.0, 160.0, 6.0),
            };

        Self {
            name: name.to_string(),
            class,
            max_speed,
            acceleration,
            deceleration,
            rudder_rate,
            max_rudder_angle,
            hull_length,
            steerageway,
        }
    }

    pub fn frigate() -> Self {
        Self::preset(ShipClass::Frigate)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let checks = [
            ("max_speed", self.max_speed),
            ("acceleration", self.acceleration),
            ("deceleration", self.deceleration),
            ("rudder_rate", self.rudder_rate),
            ("max_rudder_angle", self.max_rudder_angle),
            ("hull_length", self.hull_length),
            ("steerageway", self.steerageway),
        ];

        for (field, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(ProfileError::ValidationError(format!(
                    "{} must be a positive number, got {}",
                    field, value
                )));
            }
        }

        if self.max_rudder_angle >= 90.0 {
            return Err(ProfileError::ValidationError(format!(
                "max_rudder_angle must be below 90 degrees, got {}",
                self.max_rudder_angle
            )));
        }

        Ok(())
    }

    /// Parses and validates a profile.
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let profile: ShipProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Radius in metres of the tightest circle at full speed and full rudder.
    pub fn min_turning_radius(&self) -> f32 {
        let speed_ms = self.max_speed / KNOTS_PER_METRE_PER_SECOND;
        let turn_rate_rad = ((self.rudder_rate / self.hull_length) * 10.0).to_radians();
        speed_ms / turn_rate_rad
    }

    /// Metres needed to coast to a stop from `speed_knots` at full deceleration.
    pub fn stopping_distance(&self, speed_knots: f32) -> f32 {
        let speed_ms = speed_knots.abs() / KNOTS_PER_METRE_PER_SECOND;
        speed_ms * speed_ms / (2.0 * self.deceleration)
    }
}

impl Default for ShipProfile {
    fn default() -> Self {
        Self::frigate()
    }
}
