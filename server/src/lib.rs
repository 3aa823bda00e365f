//! # Naval Authority Server
//!
//! The authority for a fleet of player-controlled vessels. It owns the
//! canonical state of every hull, applies each peer's commands in the order
//! the peer issued them, and replicates the result back out over UDP.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every vessel is advanced on a fixed tick by the shared hull integrator.
//! Throttle, rudder, speed and the emergency-stop latch are written only here;
//! peers predict their own rudder locally and are corrected by events.
//!
//! ### Command Handling
//! Commands arrive tagged with a per-sender sequence number. They are
//! buffered per client, applied once per tick in sequence order, and
//! duplicates or stale sequences are dropped. Each command passes through the
//! vessel's guards (emergency stop, freeze, inert profile) before it can
//! touch state.
//!
//! ### Replication
//! Each replicated field goes out on its own when it changes, and again on a
//! periodic refresh so observers converge over a lossy link. Poses go out
//! every tick. Waypoint, autopilot and freeze changes are one-shot events.
//!
//! ### Connection Lifecycle
//! Peers connect with a protocol version, heartbeat, and either disconnect
//! (their vessel despawns at once) or go silent (their vessel is orphaned,
//! keeps sailing, and despawns after a linger period).
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("127.0.0.1:8080".parse()?);
//!     let mut server = Server::new(config).await?;
//!
//!     // Docking collaborators drive freezes through this handle.
//!     let _admin = server.admin_handle();
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The server runs a handful of internal tasks:
//! - **Network Receiver**: decodes incoming datagrams
//! - **Network Sender**: drains the outgoing queue and fans out broadcasts
//! - **Timeout Checker**: orphans vessels of silent peers
//! - **Main Loop**: handles packets and admin commands, ticks the world

pub mod admin;
pub mod autopilot;
pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod replication;
pub mod vessel;
