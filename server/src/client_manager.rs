//! Connection bookkeeping and per-sender command ordering for the authority
//!
//! This module tracks every connected peer:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Command buffering so each sender's commands apply in sequence order
//! - Orphaned vessels left behind by peers that went silent
//! - Capacity limits and address lookup for incoming datagrams
//!
//! Commands from different senders are never reordered against each other;
//! only a single sender's stream is guaranteed to apply in order.

use crate::config::CLIENT_TIMEOUT;
use log::{debug, info};
use shared::{ClientId, VesselCommand, VesselId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A command as received, tagged with its sender-local sequence number
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencedCommand {
    pub sequence: u32,
    pub command: VesselCommand,
}

/// A connected peer and the commands it has sent but the tick has not applied
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the authority
    pub id: ClientId,
    /// Network address for responses
    pub addr: SocketAddr,
    /// Last time any packet arrived from this client
    pub last_seen: Instant,
    /// The vessel this client controls, once spawned
    pub vessel_id: Option<VesselId>,
    /// Highest command sequence already applied
    pub last_processed_command: u32,
    /// Buffered commands, kept sorted by sequence
    pub pending_commands: Vec<SequencedCommand>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            vessel_id: None,
            last_processed_command: 0,
            pending_commands: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Buffers a command in sequence order.
    ///
    /// Returns false for a sequence that was already applied or is already
    /// waiting in the buffer.
    pub fn add_command(&mut self, sequence: u32, command: VesselCommand) -> bool {
        self.touch();

        if sequence <= self.last_processed_command {
            debug!(
                "Client {} sent stale command {} (last applied {})",
                self.id, sequence, self.last_processed_command
            );
            return false;
        }

        match self
            .pending_commands
            .binary_search_by_key(&sequence, |pending| pending.sequence)
        {
            Ok(_) => {
                debug!("Client {} sent duplicate command {}", self.id, sequence);
                false
            }
            Err(index) => {
                self.pending_commands
                    .insert(index, SequencedCommand { sequence, command });
                true
            }
        }
    }

    /// Drains the buffer in sequence order and marks everything as applied.
    pub fn take_commands(&mut self) -> Vec<SequencedCommand> {
        let commands = std::mem::take(&mut self.pending_commands);
        if let Some(last) = commands.last() {
            self.last_processed_command = last.sequence;
        }
        commands
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients and the vessels orphaned by silent ones
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<ClientId, Client>,
    /// Vessels whose owner timed out, with the moment they were orphaned
    orphans: HashMap<VesselId, Instant>,
    /// Next available client ID for new connections
    next_client_id: ClientId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty roster. Client IDs start from 1.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            orphans: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns None if the authority is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Records which vessel a client controls.
    pub fn attach_vessel(&mut self, client_id: ClientId, vessel_id: VesselId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.vessel_id = Some(vessel_id);
                true
            }
            None => false,
        }
    }

    /// Removes a client and hands it back so its vessel can be cleaned up.
    pub fn remove_client(&mut self, client_id: ClientId) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn client(&self, client_id: ClientId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes a client's activity timestamp.
    pub fn touch(&mut self, client_id: ClientId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Buffers a command for a specific client. Returns false if the client
    /// is unknown or the sequence is stale or duplicate.
    pub fn add_command(
        &mut self,
        client_id: ClientId,
        sequence: u32,
        command: VesselCommand,
    ) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => client.add_command(sequence, command),
            None => false,
        }
    }

    /// Every buffered command, grouped by client in ascending ID order and in
    /// sequence order within each client.
    pub fn take_ordered_commands(&mut self) -> Vec<(ClientId, VesselId, VesselCommand)> {
        let mut ids: Vec<ClientId> = self.clients.keys().copied().collect();
        ids.sort_unstable();

        let mut commands = Vec::new();
        for id in ids {
            let Some(client) = self.clients.get_mut(&id) else {
                continue;
            };
            let taken = client.take_commands();
            let Some(vessel_id) = client.vessel_id else {
                continue;
            };
            commands.extend(
                taken
                    .into_iter()
                    .map(|pending| (id, vessel_id, pending.command)),
            );
        }
        commands
    }

    /// Removes clients that have been silent longer than the timeout.
    ///
    /// Their vessels are not despawned here: they are recorded as orphans and
    /// keep sailing until [`ClientManager::expired_orphans`] reports them.
    pub fn check_timeouts(&mut self) -> Vec<ClientId> {
        self.check_timeouts_after(CLIENT_TIMEOUT)
    }

    pub fn check_timeouts_after(&mut self, timeout: Duration) -> Vec<ClientId> {
        let timed_out: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            if let Some(client) = self.clients.remove(client_id) {
                info!("Client {} timed out", client.id);
                if let Some(vessel_id) = client.vessel_id {
                    info!("Vessel {} orphaned", vessel_id);
                    self.orphans.insert(vessel_id, Instant::now());
                }
            }
        }

        timed_out
    }

    /// Drains orphans that have lingered at least `linger`.
    pub fn expired_orphans(&mut self, linger: Duration) -> Vec<VesselId> {
        let expired: Vec<VesselId> = self
            .orphans
            .iter()
            .filter(|(_, since)| since.elapsed() >= linger)
            .map(|(id, _)| *id)
            .collect();

        for vessel_id in &expired {
            self.orphans.remove(vessel_id);
        }
        expired
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    /// All client IDs and their addresses, for broadcasting.
    pub fn get_client_addrs(&self) -> Vec<(ClientId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
