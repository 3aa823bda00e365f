//! Per-field change detection for replicated vessel state.
//!
//! Each field goes out as its own update when it changes. Datagrams can be
//! lost, so every field is also re-sent on a fixed refresh cadence and
//! whenever a new observer joins.

use shared::{AuthorityState, ReplicatedField};

/// Ticks between unconditional re-sends of every field.
pub const REFRESH_INTERVAL_TICKS: u32 = 30;

#[derive(Debug, Default)]
pub struct FieldReplicator {
    last_sent: Option<AuthorityState>,
    ticks_since_refresh: u32,
}

impl FieldReplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fields that must go out this tick.
    pub fn collect(&mut self, state: &AuthorityState) -> Vec<ReplicatedField> {
        self.ticks_since_refresh += 1;

        let fields = match self.last_sent {
            Some(previous) if self.ticks_since_refresh < REFRESH_INTERVAL_TICKS => state
                .fields()
                .into_iter()
                .zip(previous.fields())
                .filter(|(current, old)| current != old)
                .map(|(current, _)| current)
                .collect(),
            _ => {
                self.ticks_since_refresh = 0;
                state.fields().to_vec()
            }
        };

        self.last_sent = Some(*state);
        fields
    }

    /// Makes the next [`FieldReplicator::collect`] send every field.
    pub fn force_refresh(&mut self) {
        self.last_sent = None;
    }

    /// Whether the last `collect` call was a full refresh.
    pub fn refreshed_last_tick(&self) -> bool {
        self.ticks_since_refresh == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_collect_sends_everything() {
        let mut replicator = FieldReplicator::new();
        let fields = replicator.collect(&AuthorityState::default());
        assert_eq!(fields.len(), 5);
        assert!(replicator.refreshed_last_tick());
    }

    #[test]
    fn test_unchanged_state_sends_nothing() {
        let mut replicator = FieldReplicator::new();
        let state = AuthorityState::default();
        replicator.collect(&state);
        assert!(replicator.collect(&state).is_empty());
        assert!(!replicator.refreshed_last_tick());
    }

    #[test]
    fn test_only_changed_fields_are_sent() {
        let mut replicator = FieldReplicator::new();
        let mut state = AuthorityState::default();
        replicator.collect(&state);

        state.throttle_level = 2;
        state.speed_knots = 1.5;
        let fields = replicator.collect(&state);

        assert_eq!(
            fields,
            vec![ReplicatedField::Throttle(2), ReplicatedField::Speed(1.5)]
        );
    }

    #[test]
    fn test_periodic_refresh_resends_all_fields() {
        let mut replicator = FieldReplicator::new();
        let state = AuthorityState::default();
        replicator.collect(&state);

        for _ in 1..REFRESH_INTERVAL_TICKS {
            assert!(replicator.collect(&state).is_empty());
        }
        assert_eq!(replicator.collect(&state).len(), 5);
    }

    #[test]
    fn test_force_refresh() {
        let mut replicator = FieldReplicator::new();
        let state = AuthorityState::default();
        replicator.collect(&state);
        replicator.force_refresh();
        assert_eq!(replicator.collect(&state).len(), 5);
    }
}
