//! Administrative overrides delivered into the authority loop.
//!
//! Docking and other collaborators embedded next to the server hold an
//! [`AdminHandle`] and drive vessels through it. Commands are queued on the
//! same channel as network traffic, so they apply between ticks and never
//! race the simulation.

use crate::network::ServerMessage;
use crate::vessel::PortHandoff;
use log::error;
use shared::{Pose, VesselId};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    Freeze {
        vessel_id: VesselId,
        pose: Pose,
    },
    Unfreeze {
        vessel_id: VesselId,
        handoff: PortHandoff,
    },
    ReleaseEmergencyStop {
        vessel_id: VesselId,
    },
    Despawn {
        vessel_id: VesselId,
    },
}

#[derive(Debug, Clone)]
pub struct AdminHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl AdminHandle {
    pub(crate) fn new(server_tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { server_tx }
    }

    /// Queues a command. Returns false once the server loop has stopped.
    pub fn send(&self, command: AdminCommand) -> bool {
        match self.server_tx.send(ServerMessage::Admin(command)) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to queue admin command: {}", e);
                false
            }
        }
    }

    pub fn freeze(&self, vessel_id: VesselId, pose: Pose) -> bool {
        self.send(AdminCommand::Freeze { vessel_id, pose })
    }

    pub fn unfreeze(&self, vessel_id: VesselId, handoff: PortHandoff) -> bool {
        self.send(AdminCommand::Unfreeze { vessel_id, handoff })
    }

    pub fn release_emergency_stop(&self, vessel_id: VesselId) -> bool {
        self.send(AdminCommand::ReleaseEmergencyStop { vessel_id })
    }

    /// Asks the server loop to exit after the current message.
    pub fn shutdown(&self) -> bool {
        self.server_tx.send(ServerMessage::Shutdown).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Vec3;

    #[test]
    fn test_commands_arrive_on_server_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = AdminHandle::new(tx);
        let pose = Pose::new(Vec3::new(1.0, 2.0, 0.0), 90.0);

        assert!(handle.freeze(3, pose));
        assert!(handle.release_emergency_stop(3));

        match rx.try_recv() {
            Ok(ServerMessage::Admin(AdminCommand::Freeze { vessel_id, pose: p })) => {
                assert_eq!(vessel_id, 3);
                assert_eq!(p, pose);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::Admin(AdminCommand::ReleaseEmergencyStop { vessel_id: 3 }))
        ));
    }

    #[test]
    fn test_send_fails_after_server_stops() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = AdminHandle::new(tx);
        drop(rx);

        assert!(!handle.release_emergency_stop(1));
        assert!(!handle.shutdown());
    }
}
