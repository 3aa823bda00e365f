//! Authority network layer: UDP traffic, admin overrides and the fixed tick loop

use crate::admin::{AdminCommand, AdminHandle};
use crate::client_manager::ClientManager;
use crate::config::{ServerConfig, TIMEOUT_SWEEP_INTERVAL};
use crate::game::GameState;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ClientId, Packet, VesselId, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Messages sent from network tasks and admin handles to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: ClientId },
    Admin(AdminCommand),
    Shutdown,
}

/// Messages sent from the game loop to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ClientId>,
    },
}

/// The authority: owns every vessel and is the only writer of their state
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    config: ServerConfig,
    tasks: Vec<JoinHandle<()>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(config.addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            game_state: GameState::new(config.profile.clone(), config.tuning),
            config,
            tasks: Vec::new(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for freezing, unfreezing and releasing vessels from outside
    /// the network.
    pub fn admin_handle(&self) -> AdminHandle {
        AdminHandle::new(self.server_tx.clone())
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping undecodable datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        }));
    }

    fn spawn_timeout_checker(&mut self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut sweep = interval(TIMEOUT_SWEEP_INTERVAL);

            loop {
                sweep.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }));
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<ClientId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                self.handle_connect(client_version, addr).await;
            }

            Packet::Command { sequence, command } => {
                let mut clients = self.clients.write().await;
                match clients.find_client_by_addr(addr) {
                    Some(client_id) => {
                        clients.add_command(client_id, sequence, command);
                    }
                    None => debug!("Dropping command from unknown address {}", addr),
                }
            }

            Packet::Heartbeat { timestamp } => {
                let known = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .map(|client_id| clients.touch(client_id))
                        .is_some()
                };
                // Echoed so the peer can measure its round trip.
                if known {
                    self.send_packet(Packet::Heartbeat { timestamp }, addr);
                }
            }

            Packet::Disconnect => {
                let removed = {
                    let mut clients = self.clients.write().await;
                    clients
                        .find_client_by_addr(addr)
                        .and_then(|client_id| clients.remove_client(client_id))
                };

                if let Some(vessel_id) = removed.and_then(|client| client.vessel_id) {
                    self.despawn_and_announce(vessel_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            warn!(
                "Rejecting {}: protocol version {} (expected {})",
                addr, client_version, PROTOCOL_VERSION
            );
            self.send_packet(
                Packet::Rejected {
                    reason: format!(
                        "Protocol version mismatch: server speaks {}",
                        PROTOCOL_VERSION
                    ),
                },
                addr,
            );
            return;
        }

        // A reconnect from the same address replaces the old session.
        let previous = {
            let mut clients = self.clients.write().await;
            clients
                .find_client_by_addr(addr)
                .and_then(|existing_id| clients.remove_client(existing_id))
        };
        if let Some(vessel_id) = previous.and_then(|client| client.vessel_id) {
            self.despawn_and_announce(vessel_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let Some(client_id) = client_id else {
            self.send_packet(
                Packet::Rejected {
                    reason: "Server full".to_string(),
                },
                addr,
            );
            return;
        };

        let vessel_id = self.game_state.spawn_vessel(client_id);
        {
            let mut clients = self.clients.write().await;
            clients.attach_vessel(client_id, vessel_id);
        }

        self.send_packet(
            Packet::Connected {
                client_id,
                vessel_id,
                tick_rate: self.config.tick_rate,
                tuning: self.game_state.tuning(),
            },
            addr,
        );

        for packet in self.game_state.snapshot_packets() {
            self.send_packet(packet, addr);
        }
        if let Some(spawned) = self.game_state.spawn_packet(vessel_id) {
            self.broadcast_packet(spawned, Some(client_id));
        }
    }

    fn handle_admin(&mut self, command: AdminCommand) {
        let applied = match &command {
            AdminCommand::Freeze { vessel_id, pose } => self.game_state.freeze(*vessel_id, *pose),
            AdminCommand::Unfreeze { vessel_id, handoff } => {
                self.game_state.unfreeze(*vessel_id, handoff)
            }
            AdminCommand::ReleaseEmergencyStop { vessel_id } => {
                self.game_state.release_emergency_stop(*vessel_id)
            }
            AdminCommand::Despawn { vessel_id } => self.despawn_and_announce(*vessel_id),
        };

        if !applied {
            warn!("Admin command for unknown vessel: {:?}", command);
        }
    }

    fn despawn_and_announce(&mut self, vessel_id: VesselId) -> bool {
        let removed = self.game_state.despawn_vessel(vessel_id);
        if removed {
            self.broadcast_packet(Packet::VesselDespawned { vessel_id }, None);
        }
        removed
    }

    /// One fixed simulation tick: apply buffered commands per sender in
    /// sequence order, advance every vessel, broadcast, then reap orphans.
    async fn tick(&mut self) {
        let (commands, expired) = {
            let mut clients = self.clients.write().await;
            (
                clients.take_ordered_commands(),
                clients.expired_orphans(self.config.orphan_linger),
            )
        };

        for (client_id, vessel_id, command) in commands {
            self.game_state.apply_command(client_id, vessel_id, command);
        }

        let packets = self.game_state.step(self.config.tick_dt());

        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };
        if client_count > 0 {
            for packet in packets {
                self.broadcast_packet(packet, None);
            }
        }

        for vessel_id in expired {
            info!("Orphaned vessel {} lingered too long", vessel_id);
            self.despawn_and_announce(vessel_id);
        }

        if self.game_state.tick % (self.config.tick_rate.max(1) * 10) == 0 {
            debug!(
                "Tick {}: {} clients, {} vessels",
                self.game_state.tick,
                client_count,
                self.game_state.vessel_count()
            );
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.config.tick_interval());

        info!(
            "Server started at {} Hz with {} max clients",
            self.config.tick_rate, self.config.max_clients
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} went silent; its vessel keeps sailing", client_id);
                        }
                        Some(ServerMessage::Admin(command)) => {
                            self.handle_admin(command);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    self.tick().await;
                }
            }
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ShipProfile, Tuning, VesselCommand};
    use std::net::{IpAddr, Ipv4Addr};

    fn local_config() -> ServerConfig {
        ServerConfig::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
    }

    #[test]
    fn test_server_message_creation() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);
        let msg = ServerMessage::PacketReceived {
            packet: Packet::Connect { client_version: 1 },
            addr,
        };

        match msg {
            ServerMessage::PacketReceived { packet, addr: a } => {
                assert_eq!(a, addr);
                assert_eq!(packet, Packet::Connect { client_version: 1 });
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_game_message_broadcast() {
        let msg = GameMessage::BroadcastPacket {
            packet: Packet::VesselDespawned { vessel_id: 4 },
            exclude: Some(5),
        };

        match msg {
            GameMessage::BroadcastPacket { packet, exclude } => {
                assert_eq!(exclude, Some(5));
                assert_eq!(packet, Packet::VesselDespawned { vessel_id: 4 });
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[tokio::test]
    async fn test_connect_spawns_vessel_and_replies() {
        let mut server = Server::new(local_config()).await.unwrap();
        let addr: SocketAddr = "127.0.0.1:40001".parse().unwrap();

        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, addr)
            .await;

        assert_eq!(server.game_state().vessel_count(), 1);
        match server.game_rx.try_recv() {
            Ok(GameMessage::SendPacket {
                packet:
                    Packet::Connected {
                        client_id,
                        vessel_id,
                        tick_rate,
                        tuning,
                    },
                addr: to,
            }) => {
                assert_eq!(to, addr);
                assert_eq!(client_id, 1);
                assert_eq!(vessel_id, 1);
                assert_eq!(tick_rate, 30);
                assert_eq!(tuning, Tuning::default());
            }
            other => panic!("Expected Connected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_version_mismatch_is_rejected() {
        let mut server = Server::new(local_config()).await.unwrap();
        let addr: SocketAddr = "127.0.0.1:40002".parse().unwrap();

        server
            .handle_packet(Packet::Connect { client_version: 99 }, addr)
            .await;

        assert_eq!(server.game_state().vessel_count(), 0);
        assert!(matches!(
            server.game_rx.try_recv(),
            Ok(GameMessage::SendPacket {
                packet: Packet::Rejected { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_full_server_rejects() {
        let mut config = local_config();
        config.max_clients = 1;
        let mut server = Server::new(config).await.unwrap();

        let first: SocketAddr = "127.0.0.1:40003".parse().unwrap();
        let second: SocketAddr = "127.0.0.1:40004".parse().unwrap();
        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, first)
            .await;
        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, second)
            .await;

        let mut rejected = false;
        while let Ok(message) = server.game_rx.try_recv() {
            if let GameMessage::SendPacket {
                packet: Packet::Rejected { reason },
                addr,
            } = message
            {
                assert_eq!(addr, second);
                assert_eq!(reason, "Server full");
                rejected = true;
            }
        }
        assert!(rejected);
        assert_eq!(server.game_state().vessel_count(), 1);
    }

    #[tokio::test]
    async fn test_commands_apply_on_tick_in_sequence_order() {
        let mut server = Server::new(local_config()).await.unwrap();
        let addr: SocketAddr = "127.0.0.1:40005".parse().unwrap();
        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, addr)
            .await;

        let throttle = |sequence, delta| Packet::Command {
            sequence,
            command: VesselCommand::ChangeThrottle { delta },
        };
        server.handle_packet(throttle(2, 1), addr).await;
        server
            .handle_packet(
                Packet::Command {
                    sequence: 1,
                    command: VesselCommand::EmergencyStop,
                },
                addr,
            )
            .await;
        server.handle_packet(throttle(2, 1), addr).await;

        // Emergency stop (1) applies before the throttle request (2), which
        // is then refused; the duplicate never reaches the vessel.
        server.tick().await;
        let vessel = server.game_state().vessel(1).unwrap();
        assert_eq!(vessel.current_throttle(), 0);
        assert!(vessel.state().emergency_stop);
    }

    #[tokio::test]
    async fn test_disconnect_despawns_immediately() {
        let mut server = Server::new(local_config()).await.unwrap();
        let addr: SocketAddr = "127.0.0.1:40006".parse().unwrap();
        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, addr)
            .await;
        server.handle_packet(Packet::Disconnect, addr).await;

        assert_eq!(server.game_state().vessel_count(), 0);
        let mut announced = false;
        while let Ok(message) = server.game_rx.try_recv() {
            if let GameMessage::BroadcastPacket {
                packet: Packet::VesselDespawned { vessel_id: 1 },
                ..
            } = message
            {
                announced = true;
            }
        }
        assert!(announced);
    }

    #[tokio::test]
    async fn test_inert_profile_still_spawns() {
        let mut config = local_config();
        config.profile = None;
        let mut server = Server::new(config).await.unwrap();
        let addr: SocketAddr = "127.0.0.1:40007".parse().unwrap();
        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, addr)
            .await;

        assert!(server.game_state().vessel(1).unwrap().is_inert());
        assert!(ShipProfile::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_admin_freeze_applies() {
        let mut server = Server::new(local_config()).await.unwrap();
        let addr: SocketAddr = "127.0.0.1:40008".parse().unwrap();
        server
            .handle_packet(Packet::Connect { client_version: PROTOCOL_VERSION }, addr)
            .await;

        let pose = server.game_state().vessel(1).unwrap().pose();
        server.handle_admin(AdminCommand::Freeze { vessel_id: 1, pose });
        assert!(server.game_state().vessel(1).unwrap().is_frozen());

        server.handle_admin(AdminCommand::Despawn { vessel_id: 1 });
        assert_eq!(server.game_state().vessel_count(), 0);
    }
}
