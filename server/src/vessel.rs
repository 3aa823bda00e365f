//! Authority-side vessel: canonical state, command guards and the fixed tick.

use crate::autopilot::{Autopilot, AutopilotState, AutopilotStep};
use log::{debug, error, info, warn};
use shared::physics::{effective_rudder, integrate, swing_rudder};
use shared::{
    AuthorityState, ClientId, Motion, Pose, ShipProfile, Tuning, Vec3, VesselCommand, VesselEvent,
    VesselId, WaypointList,
};

/// Context handed over by the docking collaborator when a vessel leaves port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortHandoff {
    pub port_id: String,
    pub exit_pose: Pose,
}

/// A vessel as the authority sees it.
///
/// Commands and ticks are applied sequentially by the owning game loop, so
/// nothing here is shared across threads.
#[derive(Debug)]
pub struct Vessel {
    pub id: VesselId,
    pub owner: ClientId,
    profile: Option<ShipProfile>,
    tuning: Tuning,
    state: AuthorityState,
    motion: Motion,
    course: WaypointList,
    autopilot: Autopilot,
    /// Last helm position reported by the controlling peer.
    helm_intent: f32,
    frozen: bool,
    events: Vec<VesselEvent>,
}

impl Vessel {
    /// Spawns a vessel. Without a usable profile the vessel is created inert:
    /// it keeps its pose, ignores every command and never ticks.
    pub fn spawn(
        id: VesselId,
        owner: ClientId,
        profile: Option<ShipProfile>,
        tuning: Tuning,
        pose: Pose,
    ) -> Self {
        let profile = match profile {
            Some(profile) => match profile.validate() {
                Ok(()) => Some(profile),
                Err(e) => {
                    error!("Vessel {} has an unusable profile ({}); it will stay inert", id, e);
                    None
                }
            },
            None => {
                error!("Vessel {} spawned without a ship profile; it will stay inert", id);
                None
            }
        };

        Self {
            id,
            owner,
            profile,
            tuning,
            state: AuthorityState::default(),
            motion: Motion::at(pose),
            course: WaypointList::new(),
            autopilot: Autopilot::new(),
            helm_intent: 0.0,
            frozen: false,
            events: Vec::new(),
        }
    }

    /// Applies a command from the controlling peer.
    ///
    /// Returns false when a guard dropped it. Dropped commands leave no trace
    /// beyond a debug log line.
    pub fn apply_command(&mut self, command: VesselCommand) -> bool {
        if self.profile.is_none() || self.frozen {
            debug!("Vessel {} dropped {:?}: not accepting commands", self.id, command);
            return false;
        }

        match command {
            VesselCommand::ChangeThrottle { delta } => {
                if delta != 1 && delta != -1 {
                    warn!("Vessel {} rejected throttle delta {}", self.id, delta);
                    return false;
                }
                if self.state.emergency_stop {
                    debug!("Vessel {} ignored throttle change during emergency stop", self.id);
                    return false;
                }
                self.state.step_throttle(delta);
                debug!("Vessel {} throttle {}", self.id, self.state.throttle_level);
                true
            }

            VesselCommand::EmergencyStop => {
                self.state.emergency_stop = true;
                self.state.throttle_level = 0;
                self.helm_intent = 0.0;
                self.disengage_autopilot();
                info!("Vessel {} emergency stop", self.id);
                true
            }

            VesselCommand::AddWaypoint { point } => {
                if self.state.emergency_stop {
                    debug!("Vessel {} ignored waypoint during emergency stop", self.id);
                    return false;
                }
                if !(point.x.is_finite() && point.y.is_finite() && point.z.is_finite()) {
                    debug!("Vessel {} ignored non-finite waypoint {:?}", self.id, point);
                    return false;
                }
                self.course.push(point);
                self.events.push(VesselEvent::WaypointAdded { point });
                true
            }

            VesselCommand::ToggleAutopilot => {
                if self.autopilot.is_engaged() {
                    self.disengage_autopilot();
                    return true;
                }
                if self.state.emergency_stop {
                    debug!("Vessel {} ignored autopilot during emergency stop", self.id);
                    return false;
                }
                if !self.autopilot.engage(&mut self.course) {
                    debug!("Vessel {} has no waypoints to follow", self.id);
                    return false;
                }
                self.events
                    .push(VesselEvent::AutopilotToggled { enabled: true });
                true
            }

            VesselCommand::ClearWaypoints => {
                self.course.clear();
                self.events.push(VesselEvent::WaypointsCleared);
                self.disengage_autopilot();
                true
            }

            VesselCommand::Steer { axis } => {
                if self.state.emergency_stop || !axis.is_finite() {
                    return false;
                }
                self.helm_intent = axis.clamp(-1.0, 1.0);
                true
            }
        }
    }

    /// Runs one fixed simulation tick.
    pub fn tick(&mut self, dt: f32) {
        if self.frozen {
            return;
        }
        let Some(profile) = self.profile.as_ref() else {
            return;
        };

        let intent = match self.autopilot.update(
            &self.motion.pose,
            &mut self.course,
            profile.max_rudder_angle,
        ) {
            AutopilotStep::Steering(intent) => intent,
            AutopilotStep::Completed => {
                info!("Vessel {} reached its final waypoint", self.id);
                self.events
                    .push(VesselEvent::AutopilotToggled { enabled: false });
                self.helm_intent
            }
            AutopilotStep::Idle => self.helm_intent,
        };

        // The helm is locked while the emergency stop holds.
        if !self.state.emergency_stop {
            self.state.rudder_angle_deg =
                swing_rudder(self.state.rudder_angle_deg, intent, profile, dt);
        }
        self.state.effective_rudder_angle_deg =
            effective_rudder(self.state.rudder_angle_deg, self.motion.speed_knots, profile);

        self.motion = integrate(
            &self.motion,
            self.state.throttle_level,
            self.state.effective_rudder_angle_deg,
            profile,
            &self.tuning,
            dt,
        );
        self.state.speed_knots = self.motion.speed_knots;
    }

    /// Zeroes the helm and engine and holds the vessel at `pose` until
    /// [`Vessel::unfreeze`].
    pub fn freeze(&mut self, pose: Pose) {
        self.reset_helm(pose);
        self.frozen = true;
        self.events.push(VesselEvent::Frozen { pose });
        info!("Vessel {} frozen at {:?}", self.id, pose.position);
    }

    /// Resumes the simulation at the handoff's exit pose.
    pub fn unfreeze(&mut self, handoff: &PortHandoff) {
        if !self.frozen {
            debug!("Vessel {} unfrozen without a prior freeze", self.id);
        }
        self.reset_helm(handoff.exit_pose);
        self.frozen = false;
        self.events.push(VesselEvent::Unfrozen {
            pose: handoff.exit_pose,
        });
        info!(
            "Vessel {} released from port {} at {:?}",
            self.id, handoff.port_id, handoff.exit_pose.position
        );
    }

    /// Lifts an emergency stop. Throttle stays at zero.
    pub fn release_emergency_stop(&mut self) {
        if self.state.emergency_stop {
            self.state.emergency_stop = false;
            info!("Vessel {} emergency stop released", self.id);
        }
    }

    pub fn drain_events(&mut self) -> Vec<VesselEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn velocity(&self) -> Vec3 {
        self.motion.velocity
    }

    pub fn current_speed(&self) -> f32 {
        self.state.speed_knots
    }

    pub fn current_throttle(&self) -> i8 {
        self.state.throttle_level
    }

    pub fn state(&self) -> &AuthorityState {
        &self.state
    }

    pub fn pose(&self) -> Pose {
        self.motion.pose
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    pub fn course(&self) -> &WaypointList {
        &self.course
    }

    pub fn autopilot_state(&self) -> AutopilotState {
        self.autopilot.state()
    }

    pub fn profile(&self) -> Option<&ShipProfile> {
        self.profile.as_ref()
    }

    pub fn is_inert(&self) -> bool {
        self.profile.is_none()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn disengage_autopilot(&mut self) {
        if self.autopilot.disengage() {
            self.events
                .push(VesselEvent::AutopilotToggled { enabled: false });
        }
    }

    fn reset_helm(&mut self, pose: Pose) {
        self.disengage_autopilot();
        self.state.throttle_level = 0;
        self.state.rudder_angle_deg = 0.0;
        self.state.effective_rudder_angle_deg = 0.0;
        self.state.speed_knots = 0.0;
        self.helm_intent = 0.0;
        self.motion = Motion::at(pose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const DT: f32 = 1.0 / 30.0;

    fn frigate() -> Vessel {
        Vessel::spawn(1, 1, Some(ShipProfile::frigate()), Tuning::default(), Pose::default())
    }

    fn throttle(vessel: &mut Vessel, delta: i8) -> bool {
        vessel.apply_command(VesselCommand::ChangeThrottle { delta })
    }

    #[test]
    fn test_throttle_clamps_at_full_ahead() {
        let mut vessel = frigate();
        for _ in 0..4 {
            assert!(throttle(&mut vessel, 1));
        }
        assert_eq!(vessel.current_throttle(), 4);

        throttle(&mut vessel, 1);
        assert_eq!(vessel.current_throttle(), 4);
    }

    #[test]
    fn test_throttle_rejects_oversized_delta() {
        let mut vessel = frigate();
        assert!(!throttle(&mut vessel, 3));
        assert_eq!(vessel.current_throttle(), 0);
    }

    #[test]
    fn test_emergency_stop_blocks_throttle_and_waypoints() {
        let mut vessel = frigate();
        throttle(&mut vessel, 1);
        throttle(&mut vessel, 1);
        vessel.apply_command(VesselCommand::AddWaypoint {
            point: Vec3::new(0.0, 100.0, 0.0),
        });
        vessel.apply_command(VesselCommand::ToggleAutopilot);
        vessel.drain_events();

        assert!(vessel.apply_command(VesselCommand::EmergencyStop));
        assert_eq!(vessel.current_throttle(), 0);
        assert!(vessel.state().emergency_stop);
        assert_eq!(vessel.autopilot_state(), AutopilotState::Disabled);
        assert_eq!(
            vessel.drain_events(),
            vec![VesselEvent::AutopilotToggled { enabled: false }]
        );

        assert!(!throttle(&mut vessel, 1));
        assert_eq!(vessel.current_throttle(), 0);
        assert!(!vessel.apply_command(VesselCommand::AddWaypoint {
            point: Vec3::new(1.0, 1.0, 0.0)
        }));
        assert_eq!(vessel.course().len(), 1);
        assert!(!vessel.apply_command(VesselCommand::ToggleAutopilot));
        assert!(vessel.drain_events().is_empty());
    }

    #[test]
    fn test_release_emergency_stop_restores_throttle_control() {
        let mut vessel = frigate();
        vessel.apply_command(VesselCommand::EmergencyStop);
        vessel.release_emergency_stop();
        assert!(throttle(&mut vessel, -1));
        assert_eq!(vessel.current_throttle(), -1);
    }

    #[test]
    fn test_toggle_autopilot_requires_waypoints() {
        let mut vessel = frigate();
        assert!(!vessel.apply_command(VesselCommand::ToggleAutopilot));
        assert!(vessel.drain_events().is_empty());
    }

    #[test]
    fn test_toggle_autopilot_twice_disengages() {
        let mut vessel = frigate();
        vessel.apply_command(VesselCommand::AddWaypoint {
            point: Vec3::new(0.0, 100.0, 0.0),
        });
        vessel.apply_command(VesselCommand::ToggleAutopilot);
        vessel.apply_command(VesselCommand::ToggleAutopilot);

        assert_eq!(
            vessel.drain_events(),
            vec![
                VesselEvent::WaypointAdded {
                    point: Vec3::new(0.0, 100.0, 0.0)
                },
                VesselEvent::AutopilotToggled { enabled: true },
                VesselEvent::AutopilotToggled { enabled: false },
            ]
        );
    }

    #[test]
    fn test_clear_waypoints_disengages_autopilot() {
        let mut vessel = frigate();
        vessel.apply_command(VesselCommand::AddWaypoint {
            point: Vec3::new(0.0, 100.0, 0.0),
        });
        vessel.apply_command(VesselCommand::ToggleAutopilot);
        vessel.drain_events();

        assert!(vessel.apply_command(VesselCommand::ClearWaypoints));
        assert!(vessel.course().is_empty());
        assert_eq!(vessel.autopilot_state(), AutopilotState::Disabled);
        assert_eq!(
            vessel.drain_events(),
            vec![
                VesselEvent::WaypointsCleared,
                VesselEvent::AutopilotToggled { enabled: false },
            ]
        );
    }

    #[test]
    fn test_add_clear_add_yields_single_waypoint() {
        let mut vessel = frigate();
        let p = Vec3::new(12.0, -3.0, 0.0);
        vessel.apply_command(VesselCommand::AddWaypoint { point: p });
        vessel.apply_command(VesselCommand::ClearWaypoints);
        vessel.apply_command(VesselCommand::AddWaypoint { point: p });
        assert_eq!(vessel.course().points(), &[p]);
    }

    #[test]
    fn test_non_finite_waypoint_is_dropped() {
        let mut vessel = frigate();
        for point in [
            Vec3::new(f32::NAN, 0.0, 0.0),
            Vec3::new(0.0, f32::INFINITY, 0.0),
            Vec3::new(0.0, 0.0, f32::NEG_INFINITY),
        ] {
            assert!(!vessel.apply_command(VesselCommand::AddWaypoint { point }));
        }
        assert!(vessel.course().is_empty());
        assert!(vessel.drain_events().is_empty());

        // Nothing to follow, so the autopilot refuses and the hull stays sane.
        assert!(!vessel.apply_command(VesselCommand::ToggleAutopilot));
        throttle(&mut vessel, 1);
        for _ in 0..35 {
            vessel.tick(DT);
        }

        let rudder = vessel.state().rudder_angle_deg;
        assert!(rudder.is_finite() && rudder.abs() <= 35.0);
        assert!(vessel.pose().heading_deg.is_finite());
        assert!(vessel.pose().position.x.is_finite());
        assert!(vessel.pose().position.y.is_finite());
    }

    #[test]
    fn test_helm_swings_rudder_at_rudder_rate() {
        let mut vessel = frigate();
        vessel.apply_command(VesselCommand::Steer { axis: 1.0 });
        vessel.tick(1.0);

        assert_eq!(vessel.state().rudder_angle_deg, 15.0);
        // Dead in water the rudder keeps the steerage floor.
        assert_approx_eq!(vessel.state().effective_rudder_angle_deg, 15.0 * 0.15, 1e-5);
    }

    #[test]
    fn test_rudder_held_during_emergency_stop() {
        let mut vessel = frigate();
        vessel.apply_command(VesselCommand::Steer { axis: -1.0 });
        vessel.tick(1.0);
        vessel.apply_command(VesselCommand::EmergencyStop);
        assert!(!vessel.apply_command(VesselCommand::Steer { axis: 1.0 }));
        vessel.tick(1.0);

        assert_eq!(vessel.state().rudder_angle_deg, -15.0);
    }

    #[test]
    fn test_speed_is_derived_by_tick() {
        let mut vessel = frigate();
        for _ in 0..4 {
            throttle(&mut vessel, 1);
        }
        assert_eq!(vessel.current_speed(), 0.0);

        for _ in 0..30 {
            vessel.tick(DT);
        }
        assert!(vessel.current_speed() > 0.0);
        assert!(vessel.velocity().y > 0.0);
        assert_eq!(vessel.current_speed(), vessel.motion().speed_knots);
    }

    #[test]
    fn test_missing_profile_leaves_vessel_inert() {
        let mut vessel = Vessel::spawn(9, 9, None, Tuning::default(), Pose::default());
        assert!(vessel.is_inert());
        assert!(!throttle(&mut vessel, 1));
        vessel.tick(DT);
        assert_eq!(vessel.pose(), Pose::default());
        assert_eq!(vessel.current_throttle(), 0);
    }

    #[test]
    fn test_invalid_profile_leaves_vessel_inert() {
        let mut broken = ShipProfile::frigate();
        broken.hull_length = -1.0;
        let vessel = Vessel::spawn(2, 2, Some(broken), Tuning::default(), Pose::default());
        assert!(vessel.is_inert());
    }

    #[test]
    fn test_freeze_zeroes_helm_and_suspends() {
        let mut vessel = frigate();
        for _ in 0..3 {
            throttle(&mut vessel, 1);
        }
        vessel.apply_command(VesselCommand::Steer { axis: 1.0 });
        for _ in 0..60 {
            vessel.tick(DT);
        }

        let dock = Pose::new(Vec3::new(500.0, 20.0, 0.0), 180.0);
        vessel.freeze(dock);

        assert!(vessel.is_frozen());
        assert_eq!(vessel.current_throttle(), 0);
        assert_eq!(vessel.current_speed(), 0.0);
        assert_eq!(vessel.state().rudder_angle_deg, 0.0);
        assert_eq!(vessel.pose(), dock);

        assert!(!throttle(&mut vessel, 1));
        vessel.tick(DT);
        assert_eq!(vessel.pose(), dock);
        assert!(vessel
            .drain_events()
            .contains(&VesselEvent::Frozen { pose: dock }));
    }

    #[test]
    fn test_unfreeze_resumes_at_exit_pose() {
        let mut vessel = frigate();
        vessel.freeze(Pose::default());
        vessel.drain_events();

        let handoff = PortHandoff {
            port_id: "harbor-1".to_string(),
            exit_pose: Pose::new(Vec3::new(-40.0, 10.0, 0.0), 270.0),
        };
        vessel.unfreeze(&handoff);

        assert!(!vessel.is_frozen());
        assert_eq!(vessel.pose(), handoff.exit_pose);
        assert_eq!(
            vessel.drain_events(),
            vec![VesselEvent::Unfrozen {
                pose: handoff.exit_pose
            }]
        );

        assert!(throttle(&mut vessel, 1));
        vessel.tick(DT);
        assert!(vessel.current_speed() > 0.0);
    }
}
