//! Types and simulation code shared by the authority and its peers.
//!
//! Anything that must behave identically on both sides of the link lives
//! here: the wire protocol, the replicated field set, ship profiles and the
//! deterministic hull integrator.

pub mod math;
pub mod navigation;
pub mod physics;
pub mod profile;
pub mod protocol;
pub mod state;

pub use math::{Pose, Vec3};
pub use navigation::{WaypointList, ARRIVAL_RADIUS};
pub use physics::{Motion, Tuning, MAX_THROTTLE};
pub use profile::{ProfileError, ShipClass, ShipProfile};
pub use protocol::{
    ClientId, Packet, VesselCommand, VesselEvent, VesselId, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
pub use state::{AuthorityState, FieldKind, ReplicatedField};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the Unix epoch.
pub fn timestamp_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    (millis.min(u64::MAX as u128)) as u64
}
