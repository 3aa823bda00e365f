//! Authoritative world: every spawned vessel and its replication state.

use crate::replication::FieldReplicator;
use crate::vessel::{PortHandoff, Vessel};
use log::{debug, info};
use rand::Rng;
use shared::{
    ClientId, Packet, Pose, ShipProfile, Tuning, Vec3, VesselCommand, VesselId,
};
use std::collections::HashMap;

/// Half-width of the square around the origin where new vessels appear.
const SPAWN_AREA: f32 = 200.0;

#[derive(Debug)]
pub struct GameState {
    pub tick: u32,
    tuning: Tuning,
    profile: Option<ShipProfile>,
    vessels: HashMap<VesselId, Vessel>,
    replicators: HashMap<VesselId, FieldReplicator>,
    next_vessel_id: VesselId,
}

impl GameState {
    /// `profile` is handed to every vessel spawned; `None` spawns inert hulls.
    pub fn new(profile: Option<ShipProfile>, tuning: Tuning) -> Self {
        Self {
            tick: 0,
            tuning,
            profile,
            vessels: HashMap::new(),
            replicators: HashMap::new(),
            next_vessel_id: 1,
        }
    }

    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    /// Spawns a vessel for `owner` at a random spot with a random heading.
    pub fn spawn_vessel(&mut self, owner: ClientId) -> VesselId {
        let mut rng = rand::thread_rng();
        let pose = Pose::new(
            Vec3::new(
                rng.gen_range(-SPAWN_AREA..SPAWN_AREA),
                rng.gen_range(-SPAWN_AREA..SPAWN_AREA),
                0.0,
            ),
            rng.gen_range(0.0..360.0),
        );
        self.spawn_vessel_at(owner, pose)
    }

    pub fn spawn_vessel_at(&mut self, owner: ClientId, pose: Pose) -> VesselId {
        let vessel_id = self.next_vessel_id;
        self.next_vessel_id += 1;

        let vessel = Vessel::spawn(vessel_id, owner, self.profile.clone(), self.tuning, pose);
        info!(
            "Spawned vessel {} for client {} at ({:.1}, {:.1})",
            vessel_id, owner, pose.position.x, pose.position.y
        );

        self.vessels.insert(vessel_id, vessel);
        self.replicators.insert(vessel_id, FieldReplicator::new());
        vessel_id
    }

    pub fn despawn_vessel(&mut self, vessel_id: VesselId) -> bool {
        self.replicators.remove(&vessel_id);
        if self.vessels.remove(&vessel_id).is_some() {
            info!("Despawned vessel {}", vessel_id);
            true
        } else {
            false
        }
    }

    pub fn vessel(&self, vessel_id: VesselId) -> Option<&Vessel> {
        self.vessels.get(&vessel_id)
    }

    pub fn vessel_mut(&mut self, vessel_id: VesselId) -> Option<&mut Vessel> {
        self.vessels.get_mut(&vessel_id)
    }

    pub fn vessel_count(&self) -> usize {
        self.vessels.len()
    }

    /// Routes a command to the vessel `sender` controls. Commands for
    /// vessels the sender does not own are dropped.
    pub fn apply_command(
        &mut self,
        sender: ClientId,
        vessel_id: VesselId,
        command: VesselCommand,
    ) -> bool {
        match self.vessels.get_mut(&vessel_id) {
            Some(vessel) if vessel.owner == sender => vessel.apply_command(command),
            Some(_) => {
                debug!(
                    "Client {} tried to command vessel {} it does not own",
                    sender, vessel_id
                );
                false
            }
            None => false,
        }
    }

    pub fn freeze(&mut self, vessel_id: VesselId, pose: Pose) -> bool {
        self.vessels
            .get_mut(&vessel_id)
            .map(|vessel| vessel.freeze(pose))
            .is_some()
    }

    pub fn unfreeze(&mut self, vessel_id: VesselId, handoff: &PortHandoff) -> bool {
        self.vessels
            .get_mut(&vessel_id)
            .map(|vessel| vessel.unfreeze(handoff))
            .is_some()
    }

    pub fn release_emergency_stop(&mut self, vessel_id: VesselId) -> bool {
        self.vessels
            .get_mut(&vessel_id)
            .map(|vessel| vessel.release_emergency_stop())
            .is_some()
    }

    /// Spawn announcements for every vessel, for a newly joined observer.
    /// Also schedules a full field refresh so the observer converges quickly.
    pub fn snapshot_packets(&mut self) -> Vec<Packet> {
        for replicator in self.replicators.values_mut() {
            replicator.force_refresh();
        }
        self.sorted_ids()
            .into_iter()
            .filter_map(|id| self.vessels.get(&id).map(spawn_packet))
            .collect()
    }

    pub fn spawn_packet(&self, vessel_id: VesselId) -> Option<Packet> {
        self.vessels.get(&vessel_id).map(spawn_packet)
    }

    /// Advances the world by one fixed tick and returns everything that has
    /// to be broadcast: events first, then field changes, then poses.
    pub fn step(&mut self, dt: f32) -> Vec<Packet> {
        self.tick += 1;
        let tick = self.tick;
        let mut packets = Vec::new();

        for vessel_id in self.sorted_ids() {
            let Some(vessel) = self.vessels.get_mut(&vessel_id) else {
                continue;
            };
            vessel.tick(dt);

            for event in vessel.drain_events() {
                packets.push(Packet::Event { vessel_id, event });
            }

            let replicator = self.replicators.entry(vessel_id).or_default();
            for field in replicator.collect(vessel.state()) {
                packets.push(Packet::FieldUpdate {
                    vessel_id,
                    tick,
                    field,
                });
            }
            // Lost spawn announcements are repaired on the refresh cadence.
            if replicator.refreshed_last_tick() {
                packets.push(spawn_packet(vessel));
            }

            packets.push(Packet::PoseUpdate {
                vessel_id,
                tick,
                pose: vessel.pose(),
                velocity: vessel.velocity(),
            });
        }

        packets
    }

    fn sorted_ids(&self) -> Vec<VesselId> {
        let mut ids: Vec<VesselId> = self.vessels.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

fn spawn_packet(vessel: &Vessel) -> Packet {
    Packet::VesselSpawned {
        vessel_id: vessel.id,
        owner: vessel.owner,
        profile: vessel.profile().cloned(),
        pose: vessel.pose(),
    }
}
