//! # Naval Peer Client
//!
//! The controlling peer for one vessel and an observer of every other one.
//!
//! ## Architecture Overview
//!
//! ### Replicas
//! Every vessel the authority announces is mirrored in a [`game::VesselReplica`].
//! Replicated fields arrive one per packet and may be reordered relative to
//! each other, so each field keeps the tick of its last applied update and
//! older updates are discarded. Poses are newest-wins.
//!
//! ### Local Prediction
//! For its own vessel the peer runs the shared hull integrator on the same
//! fixed step as the authority. The rudder it feeds in comes from the
//! [`predictor::LocalSteeringPredictor`], which answers the helm immediately.
//! The authority's canonical rudder is never overwritten locally; the
//! prediction is reset only when the authority freezes or releases the
//! vessel. Position is corrected by snapping when it drifts too far.
//!
//! ### Notifications
//! Changes to the own vessel's speed and throttle, and waypoint and autopilot
//! events, surface as [`game::Notification`]s for the UI.
//!
//! ## Module Organization
//!
//! - `game`: replicas, prediction and notifications
//! - `predictor`: the local rudder prediction
//! - `input`: console orders and command sequencing
//! - `network`: the UDP link and the two update loops
//!
//! ## Usage Example
//!
//! ```rust
//! use client::game::ClientGameState;
//! use shared::{Packet, Pose, ReplicatedField, ShipProfile, Tuning};
//!
//! let mut game = ClientGameState::new();
//! game.apply_packet(Packet::VesselSpawned {
//!     vessel_id: 1,
//!     owner: 1,
//!     profile: Some(ShipProfile::frigate()),
//!     pose: Pose::default(),
//! });
//! game.on_connected(1, 1, 30, Tuning::default());
//! game.apply_packet(Packet::FieldUpdate {
//!     vessel_id: 1,
//!     tick: 1,
//!     field: ReplicatedField::Throttle(2),
//! });
//!
//! let dt = game.fixed_dt();
//! game.update_frame(0.5, dt);
//! game.fixed_step(dt);
//! assert_eq!(game.get_current_throttle(), 2);
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod predictor;
