//! Authoritative match server.
//!
//! The server owns the canonical state of one arena match: every tank
//! position, every live bullet, the match phase timers, and the session
//! registry. Clients are thin; they submit movement snapshots and shot
//! requests, and receive the server's verdicts as notifications.
//!
//! ## Architecture
//!
//! All game logic runs on a single simulation loop. Each accepted TCP
//! connection gets a pair of tokio tasks that do nothing but frame I/O:
//! the reader parses length-prefixed envelopes and forwards them over an
//! unbounded channel, the writer drains an outbound byte queue. The loop
//! in [`network::Server::run`] multiplexes accepts, queued events, and a
//! fixed-rate tick with `tokio::select!`, so no lock ever guards game
//! state.
//!
//! ## Modules
//!
//! - [`network`]: listener, per-connection tasks, the event channel and
//!   the outbound [`network::Outbox`]
//! - [`game`]: the simulation itself, message handlers and the tick
//! - [`session`]: player identity, duplicate-login eviction, offline
//!   grace tracking
//! - [`entity`]: tanks and bullets, bounds clamping, damage accounting
//! - [`combat`]: bullet advancement and hit resolution
//! - [`validation`]: movement plausibility checks on incoming snapshots
//! - [`phase`]: the Ready/Fight/End/Destroy match timers

pub mod combat;
pub mod entity;
pub mod game;
pub mod network;
pub mod phase;
pub mod session;
pub mod validation;
