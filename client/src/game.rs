//! Peer-side view of the world: replicas of every vessel plus the predicted
//! motion of the vessel this peer controls.

use crate::predictor::LocalSteeringPredictor;
use log::{debug, info, warn};
use shared::navigation::{has_arrived, steering_intent};
use shared::physics::integrate;
use shared::{
    AuthorityState, ClientId, FieldKind, Motion, Packet, Pose, ReplicatedField, ShipProfile,
    Tuning, Vec3, VesselEvent, VesselId, WaypointList,
};
use std::collections::HashMap;

/// Predicted position may drift this far from the authority before it snaps.
pub const SNAP_DISTANCE: f32 = 5.0;

/// Notifications raised for the local player's own vessel only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    SpeedChanged(f32),
    ThrottleChanged(f32),
    WaypointAdded(Vec3),
    WaypointsCleared,
    AutopilotToggled(bool),
}

/// Mirror of one vessel as replicated by the authority.
#[derive(Debug, Clone)]
pub struct VesselReplica {
    pub id: VesselId,
    pub owner: ClientId,
    pub profile: Option<ShipProfile>,
    pub state: AuthorityState,
    pub pose: Pose,
    pub velocity: Vec3,
    field_ticks: [Option<u32>; FieldKind::COUNT],
    pose_tick: Option<u32>,
}

impl VesselReplica {
    pub fn new(id: VesselId, owner: ClientId, profile: Option<ShipProfile>, pose: Pose) -> Self {
        Self {
            id,
            owner,
            profile,
            state: AuthorityState::default(),
            pose,
            velocity: Vec3::ZERO,
            field_ticks: [None; FieldKind::COUNT],
            pose_tick: None,
        }
    }

    /// Applies a field update unless a newer one for the same field already
    /// arrived. Returns true if the stored value changed.
    pub fn apply_field(&mut self, tick: u32, field: ReplicatedField) -> bool {
        let slot = &mut self.field_ticks[field.kind().index()];
        if matches!(*slot, Some(last) if tick < last) {
            return false;
        }
        *slot = Some(tick);

        let before = self.state;
        self.state.apply(field);
        before != self.state
    }

    /// Newest pose wins. Returns false for an out-of-date snapshot.
    pub fn apply_pose(&mut self, tick: u32, pose: Pose, velocity: Vec3) -> bool {
        if matches!(self.pose_tick, Some(last) if tick <= last) {
            return false;
        }
        self.pose_tick = Some(tick);
        self.pose = pose;
        self.velocity = velocity;
        true
    }

    pub fn last_field_tick(&self, kind: FieldKind) -> Option<u32> {
        self.field_ticks[kind.index()]
    }
}

/// Prediction state for the vessel this peer controls.
#[derive(Debug, Clone)]
struct OwnVessel {
    motion: Motion,
    predictor: LocalSteeringPredictor,
    /// Waypoints as announced by the authority, for display and local steering.
    course: WaypointList,
    autopilot_engaged: bool,
    frozen: bool,
}

impl OwnVessel {
    fn at(pose: Pose) -> Self {
        Self {
            motion: Motion::at(pose),
            predictor: LocalSteeringPredictor::new(),
            course: WaypointList::new(),
            autopilot_engaged: false,
            frozen: false,
        }
    }

    fn reset_to(&mut self, pose: Pose) {
        self.motion = Motion::at(pose);
        self.predictor.reset();
    }
}

pub struct ClientGameState {
    pub client_id: Option<ClientId>,
    pub vessel_id: Option<VesselId>,
    pub tick_rate: u32,
    pub tuning: Tuning,
    vessels: HashMap<VesselId, VesselReplica>,
    own: Option<OwnVessel>,
    notifications: Vec<Notification>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            client_id: None,
            vessel_id: None,
            tick_rate: 30,
            tuning: Tuning::default(),
            vessels: HashMap::new(),
            own: None,
            notifications: Vec::new(),
        }
    }

    pub fn on_connected(
        &mut self,
        client_id: ClientId,
        vessel_id: VesselId,
        tick_rate: u32,
        tuning: Tuning,
    ) {
        self.client_id = Some(client_id);
        self.vessel_id = Some(vessel_id);
        self.tick_rate = tick_rate.max(1);
        self.tuning = tuning;
        self.own = self
            .vessels
            .get(&vessel_id)
            .map(|replica| OwnVessel::at(replica.pose));
    }

    /// Fixed step matching the authority's tick.
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Applies one downstream packet from the authority.
    pub fn apply_packet(&mut self, packet: Packet) {
        match packet {
            Packet::VesselSpawned {
                vessel_id,
                owner,
                profile,
                pose,
            } => self.on_spawned(vessel_id, owner, profile, pose),

            Packet::VesselDespawned { vessel_id } => {
                if self.vessels.remove(&vessel_id).is_some() {
                    debug!("Vessel {} despawned", vessel_id);
                }
                if self.is_own(vessel_id) {
                    warn!("Our vessel {} was despawned", vessel_id);
                    self.own = None;
                }
            }

            Packet::FieldUpdate {
                vessel_id,
                tick,
                field,
            } => self.on_field(vessel_id, tick, field),

            Packet::PoseUpdate {
                vessel_id,
                tick,
                pose,
                velocity,
            } => self.on_pose(vessel_id, tick, pose, velocity),

            Packet::Event { vessel_id, event } => self.on_event(vessel_id, event),

            other => debug!("Ignoring packet in game state: {:?}", other),
        }
    }

    fn is_own(&self, vessel_id: VesselId) -> bool {
        self.vessel_id == Some(vessel_id)
    }

    fn on_spawned(
        &mut self,
        vessel_id: VesselId,
        owner: ClientId,
        profile: Option<ShipProfile>,
        pose: Pose,
    ) {
        match self.vessels.get_mut(&vessel_id) {
            // Periodic re-announcement; profile may have been missed before.
            Some(replica) => replica.profile = profile,
            None => {
                debug!("Vessel {} spawned for client {}", vessel_id, owner);
                self.vessels
                    .insert(vessel_id, VesselReplica::new(vessel_id, owner, profile, pose));
            }
        }

        if self.is_own(vessel_id) && self.own.is_none() {
            self.own = Some(OwnVessel::at(pose));
        }
    }

    fn on_field(&mut self, vessel_id: VesselId, tick: u32, field: ReplicatedField) {
        let own = self.is_own(vessel_id);
        let Some(replica) = self.vessels.get_mut(&vessel_id) else {
            return;
        };
        if !replica.apply_field(tick, field) || !own {
            return;
        }

        match field {
            ReplicatedField::Throttle(level) => {
                self.notifications
                    .push(Notification::ThrottleChanged(level as f32));
            }
            ReplicatedField::Speed(knots) => {
                self.notifications.push(Notification::SpeedChanged(knots));
            }
            _ => {}
        }
    }

    fn on_pose(&mut self, vessel_id: VesselId, tick: u32, pose: Pose, velocity: Vec3) {
        let Some(replica) = self.vessels.get_mut(&vessel_id) else {
            return;
        };
        if !replica.apply_pose(tick, pose, velocity) {
            return;
        }
        let authoritative_speed = replica.state.speed_knots;

        if !self.is_own(vessel_id) {
            return;
        }
        if let Some(own) = self.own.as_mut() {
            let drift = own.motion.pose.position.planar_distance(&pose.position);
            if drift > SNAP_DISTANCE {
                debug!("Prediction drifted {:.2}, snapping to authority", drift);
                own.motion.pose = pose;
                own.motion.velocity = velocity;
                own.motion.speed_knots = authoritative_speed;
            }
        }
    }

    fn on_event(&mut self, vessel_id: VesselId, event: VesselEvent) {
        if !self.is_own(vessel_id) {
            return;
        }
        let Some(own) = self.own.as_mut() else {
            return;
        };

        match event {
            VesselEvent::WaypointAdded { point } => {
                own.course.push(point);
                self.notifications.push(Notification::WaypointAdded(point));
            }
            VesselEvent::WaypointsCleared => {
                own.course.clear();
                self.notifications.push(Notification::WaypointsCleared);
            }
            VesselEvent::AutopilotToggled { enabled } => {
                own.autopilot_engaged = enabled;
                if enabled {
                    own.course.rewind();
                }
                self.notifications
                    .push(Notification::AutopilotToggled(enabled));
            }
            VesselEvent::Frozen { pose } => {
                info!("Vessel frozen by the authority");
                own.reset_to(pose);
                own.autopilot_engaged = false;
                own.frozen = true;
            }
            VesselEvent::Unfrozen { pose } => {
                info!("Vessel released by the authority");
                own.reset_to(pose);
                own.frozen = false;
            }
        }
    }

    /// Variable-rate update: picks the helm intent (autopilot or player) and
    /// swings the predicted rudder.
    pub fn update_frame(&mut self, steering_input: f32, dt: f32) {
        let Some(vessel_id) = self.vessel_id else {
            return;
        };
        let Some(replica) = self.vessels.get(&vessel_id) else {
            return;
        };
        let Some(profile) = replica.profile.as_ref() else {
            return;
        };
        let Some(own) = self.own.as_mut() else {
            return;
        };
        if own.frozen {
            return;
        }

        let mut intent = steering_input;
        if own.autopilot_engaged {
            if let Some(target) = own.course.current() {
                if has_arrived(&own.motion.pose, &target) {
                    own.course.advance();
                }
            }
            if let Some(target) = own.course.current() {
                intent = steering_intent(&own.motion.pose, &target, profile.max_rudder_angle);
            }
        }

        // The authority holds the rudder while the emergency stop is latched.
        if replica.state.emergency_stop {
            own.predictor.refresh(own.motion.speed_knots, profile);
        } else {
            own.predictor
                .update(intent, own.motion.speed_knots, profile, dt);
        }
    }

    /// Fixed-rate update: integrates the predicted hull with the replicated
    /// throttle and the predicted rudder.
    pub fn fixed_step(&mut self, dt: f32) {
        let Some(vessel_id) = self.vessel_id else {
            return;
        };
        let Some(replica) = self.vessels.get(&vessel_id) else {
            return;
        };
        let Some(profile) = replica.profile.as_ref() else {
            return;
        };
        let Some(own) = self.own.as_mut() else {
            return;
        };
        if own.frozen {
            return;
        }

        own.motion = integrate(
            &own.motion,
            replica.state.throttle_level,
            own.predictor.effective_rudder_deg(),
            profile,
            &self.tuning,
            dt,
        );
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn vessel(&self, vessel_id: VesselId) -> Option<&VesselReplica> {
        self.vessels.get(&vessel_id)
    }

    pub fn vessels(&self) -> impl Iterator<Item = &VesselReplica> {
        self.vessels.values()
    }

    pub fn own_replica(&self) -> Option<&VesselReplica> {
        self.vessel_id.and_then(|id| self.vessels.get(&id))
    }

    pub fn own_motion(&self) -> Option<&Motion> {
        self.own.as_ref().map(|own| &own.motion)
    }

    pub fn predicted_rudder(&self) -> Option<&LocalSteeringPredictor> {
        self.own.as_ref().map(|own| &own.predictor)
    }

    pub fn course(&self) -> Option<&WaypointList> {
        self.own.as_ref().map(|own| &own.course)
    }

    pub fn autopilot_engaged(&self) -> bool {
        self.own.as_ref().is_some_and(|own| own.autopilot_engaged)
    }

    pub fn is_frozen(&self) -> bool {
        self.own.as_ref().is_some_and(|own| own.frozen)
    }

    /// Velocity of our vessel in metres per second, predicted.
    pub fn get_velocity(&self) -> Vec3 {
        self.own_motion()
            .map(|motion| motion.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    /// Speed of our vessel in knots as last replicated.
    pub fn get_current_speed(&self) -> f32 {
        self.own_replica()
            .map(|replica| replica.state.speed_knots)
            .unwrap_or(0.0)
    }

    pub fn get_current_throttle(&self) -> i8 {
        self.own_replica()
            .map(|replica| replica.state.throttle_level)
            .unwrap_or(0)
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}
