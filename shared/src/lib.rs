//! Shared protocol and simulation primitives for the tank arena game.
//!
//! Both the authoritative server and the client depend on this crate for:
//! - The wire protocol: type-tagged envelopes and the typed messages that
//!   travel inside them (`envelope`, `messages`)
//! - Tag-based message dispatch without reflection (`envelope::Dispatcher`)
//! - 2D math for transforms and interpolation (`math`)
//! - The heartbeat-driven virtual clock that keeps client playback time
//!   aligned with the server (`clock`)
//! - Game tuning values and pluggable validation policies (`config`)

pub mod clock;
pub mod config;
pub mod envelope;
pub mod math;
pub mod messages;

pub use clock::VirtualClock;
pub use config::{ArenaBounds, GameConfig, SpeedCheckPolicy};
pub use envelope::{ConnId, Dispatcher, Envelope, Message, ProtocolError};
pub use math::{Transform, Vec2};
pub use messages::GamePhase;
