//! Match client.
//!
//! The client predicts only what it owns: its tank moves locally and is
//! reported to the server at a fixed snapshot cadence, bullets are visual
//! guesses, everything else is replicated. Remote tanks play back slightly
//! in the past through per-player snapshot buffers sampled with the
//! heartbeat-synchronized virtual clock.
//!
//! - [`network`]: TCP connection, frame loop, heartbeat and snapshot timers
//! - [`game`]: client game state and server message handlers
//! - [`interp`]: time-ordered snapshot buffers for remote playback

pub mod game;
pub mod interp;
pub mod network;
