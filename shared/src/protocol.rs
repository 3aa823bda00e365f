use crate::math::{Pose, Vec3};
use crate::physics::Tuning;
use crate::profile::ShipProfile;
use crate::state::ReplicatedField;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PACKET_SIZE: usize = 2048;

pub type ClientId = u32;
pub type VesselId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Peer -> authority
    Connect {
        client_version: u32,
    },
    Command {
        sequence: u32,
        command: VesselCommand,
    },
    Heartbeat {
        timestamp: u64,
    },
    Disconnect,

    // Authority -> peers
    Connected {
        client_id: ClientId,
        vessel_id: VesselId,
        tick_rate: u32,
        tuning: Tuning,
    },
    Rejected {
        reason: String,
    },
    VesselSpawned {
        vessel_id: VesselId,
        owner: ClientId,
        profile: Option<ShipProfile>,
        pose: Pose,
    },
    VesselDespawned {
        vessel_id: VesselId,
    },
    FieldUpdate {
        vessel_id: VesselId,
        tick: u32,
        field: ReplicatedField,
    },
    PoseUpdate {
        vessel_id: VesselId,
        tick: u32,
        pose: Pose,
        velocity: Vec3,
    },
    Event {
        vessel_id: VesselId,
        event: VesselEvent,
    },
}

/// Requests the controlling peer may make of its own vessel.
///
/// None of these are acknowledged; the authority either applies them or
/// drops them on a guard, and the outcome shows up in replicated state.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum VesselCommand {
    ChangeThrottle { delta: i8 },
    EmergencyStop,
    AddWaypoint { point: Vec3 },
    ToggleAutopilot,
    ClearWaypoints,
    /// Helm position in [-1, 1]. Sets intent only; the rudder itself is swung
    /// by the authority tick.
    Steer { axis: f32 },
}

/// One-shot occurrences that cannot be inferred from field diffs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum VesselEvent {
    WaypointAdded { point: Vec3 },
    WaypointsCleared,
    AutopilotToggled { enabled: bool },
    Frozen { pose: Pose },
    Unfrozen { pose: Pose },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_serialization_command() {
        let packet = Packet::Command {
            sequence: 7,
            command: VesselCommand::AddWaypoint {
                point: Vec3::new(10.0, -4.0, 0.0),
            },
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_packet_serialization_spawn_without_profile() {
        let packet = Packet::VesselSpawned {
            vessel_id: 3,
            owner: 1,
            profile: None,
            pose: Pose::new(Vec3::new(1.0, 2.0, 0.0), 90.0),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        match bincode::deserialize::<Packet>(&serialized).unwrap() {
            Packet::VesselSpawned { profile, pose, .. } => {
                assert!(profile.is_none());
                assert_eq!(pose.heading_deg, 90.0);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_largest_packet_fits_datagram() {
        let packet = Packet::VesselSpawned {
            vessel_id: u32::MAX,
            owner: u32::MAX,
            profile: Some(ShipProfile::frigate()),
            pose: Pose::default(),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        assert!(serialized.len() < MAX_PACKET_SIZE);
    }
}
