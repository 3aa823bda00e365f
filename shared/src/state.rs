use crate::physics::MAX_THROTTLE;
use serde::{Deserialize, Serialize};

/// Canonical helm and engine fields of a vessel.
///
/// Only the authority writes these. Observers hold a copy assembled from
/// individual [`ReplicatedField`] updates, which may arrive in any order
/// relative to one another.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthorityState {
    pub throttle_level: i8,
    pub rudder_angle_deg: f32,
    pub effective_rudder_angle_deg: f32,
    pub speed_knots: f32,
    pub emergency_stop: bool,
}

impl AuthorityState {
    /// Applies a throttle step and returns whether the level changed.
    pub fn step_throttle(&mut self, delta: i8) -> bool {
        let next = self
            .throttle_level
            .saturating_add(delta)
            .clamp(-MAX_THROTTLE, MAX_THROTTLE);
        let changed = next != self.throttle_level;
        self.throttle_level = next;
        changed
    }

    pub fn fields(&self) -> [ReplicatedField; FieldKind::COUNT] {
        [
            ReplicatedField::Throttle(self.throttle_level),
            ReplicatedField::Rudder(self.rudder_angle_deg),
            ReplicatedField::EffectiveRudder(self.effective_rudder_angle_deg),
            ReplicatedField::Speed(self.speed_knots),
            ReplicatedField::EmergencyStop(self.emergency_stop),
        ]
    }

    pub fn apply(&mut self, field: ReplicatedField) {
        match field {
            ReplicatedField::Throttle(level) => {
                self.throttle_level = level.clamp(-MAX_THROTTLE, MAX_THROTTLE)
            }
            ReplicatedField::Rudder(angle) => self.rudder_angle_deg = angle,
            ReplicatedField::EffectiveRudder(angle) => self.effective_rudder_angle_deg = angle,
            ReplicatedField::Speed(knots) => self.speed_knots = knots,
            ReplicatedField::EmergencyStop(active) => self.emergency_stop = active,
        }
    }
}

/// A single replicated field and its new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReplicatedField {
    Throttle(i8),
    Rudder(f32),
    EffectiveRudder(f32),
    Speed(f32),
    EmergencyStop(bool),
}

impl ReplicatedField {
    pub fn kind(&self) -> FieldKind {
        match self {
            ReplicatedField::Throttle(_) => FieldKind::Throttle,
            ReplicatedField::Rudder(_) => FieldKind::Rudder,
            ReplicatedField::EffectiveRudder(_) => FieldKind::EffectiveRudder,
            ReplicatedField::Speed(_) => FieldKind::Speed,
            ReplicatedField::EmergencyStop(_) => FieldKind::EmergencyStop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Throttle,
    Rudder,
    EffectiveRudder,
    Speed,
    EmergencyStop,
}

impl FieldKind {
    pub const COUNT: usize = 5;

    pub fn index(&self) -> usize {
        match self {
            FieldKind::Throttle => 0,
            FieldKind::Rudder => 1,
            FieldKind::EffectiveRudder => 2,
            FieldKind::Speed => 3,
            FieldKind::EmergencyStop => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_throttle_clamps_each_step() {
        let mut state = AuthorityState::default();
        for _ in 0..6 {
            state.step_throttle(1);
        }
        assert_eq!(state.throttle_level, 4);

        assert!(!state.step_throttle(1));
        assert!(state.step_throttle(-1));
        assert_eq!(state.throttle_level, 3);

        for _ in 0..10 {
            state.step_throttle(-1);
        }
        assert_eq!(state.throttle_level, -4);
    }

    #[test]
    fn test_fields_round_trip_through_apply() {
        let source = AuthorityState {
            throttle_level: -2,
            rudder_angle_deg: 12.5,
            effective_rudder_angle_deg: 6.25,
            speed_knots: -3.0,
            emergency_stop: true,
        };

        let mut replica = AuthorityState::default();
        for field in source.fields() {
            replica.apply(field);
        }

        assert_eq!(replica, source);
    }

    #[test]
    fn test_field_kinds_have_distinct_indices() {
        let state = AuthorityState::default();
        let mut seen = [false; FieldKind::COUNT];
        for field in state.fields() {
            let index = field.kind().index();
            assert!(!seen[index]);
            seen[index] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
