//! Type-tagged message envelopes and the dispatch router.
//!
//! Every message crossing the wire is wrapped in an [`Envelope`] carrying a
//! stable string tag plus the bincode-encoded payload. Receivers resolve the
//! tag against a [`Dispatcher`] built at startup; the dispatch table is
//! constructed explicitly (no runtime reflection), one registration per
//! message type.

use log::{error, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque transport connection identifier assigned by the network layer.
pub type ConnId = u64;

/// Upper bound on a single wire frame. Anything larger is treated as a
/// protocol error and the connection is dropped.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

/// A wire message with a stable type tag.
pub trait Message: Serialize + DeserializeOwned {
    const TAG: &'static str;
}

#[derive(Debug)]
pub enum ProtocolError {
    Encode(bincode::Error),
    Decode(bincode::Error),
    TagMismatch { expected: &'static str, actual: String },
    FrameTooLarge(u32),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Encode(e) => write!(f, "failed to encode message: {}", e),
            ProtocolError::Decode(e) => write!(f, "failed to decode message: {}", e),
            ProtocolError::TagMismatch { expected, actual } => {
                write!(f, "tag mismatch: expected {}, got {}", expected, actual)
            }
            ProtocolError::FrameTooLarge(len) => write!(f, "frame of {} bytes too large", len),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Wrapper carrying a type tag plus an opaque payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Envelope {
    pub tag: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Wraps a typed message for transmission.
    pub fn pack<M: Message>(msg: &M) -> Result<Envelope, ProtocolError> {
        let payload = bincode::serialize(msg).map_err(ProtocolError::Encode)?;
        Ok(Envelope {
            tag: M::TAG.to_string(),
            payload,
        })
    }

    /// Recovers the typed message, checking the tag first.
    pub fn unpack<M: Message>(&self) -> Result<M, ProtocolError> {
        if self.tag != M::TAG {
            return Err(ProtocolError::TagMismatch {
                expected: M::TAG,
                actual: self.tag.clone(),
            });
        }
        bincode::deserialize(&self.payload).map_err(ProtocolError::Decode)
    }

    /// Serializes the envelope itself into a length-prefixed frame ready to
    /// write to a stream (u32 little-endian length, then the envelope bytes).
    pub fn to_frame(&self) -> Result<Vec<u8>, ProtocolError> {
        let body = bincode::serialize(self).map_err(ProtocolError::Encode)?;
        let len = body.len() as u32;
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge(len));
        }
        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Parses an envelope from a frame body (without the length prefix).
    pub fn from_bytes(bytes: &[u8]) -> Result<Envelope, ProtocolError> {
        bincode::deserialize(bytes).map_err(ProtocolError::Decode)
    }
}

type Handler<C> = Box<dyn Fn(&mut C, ConnId, &Envelope) + Send>;

/// Tag-to-handler routing table.
///
/// The context type `C` is the owning simulation state (the server's game
/// context or the client's game state). Handlers run synchronously on the
/// simulation thread; the network layer only ever enqueues envelopes, so
/// handler bodies never race with tick logic.
pub struct Dispatcher<C> {
    handlers: HashMap<&'static str, Handler<C>>,
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for message type `M`.
    ///
    /// Registering the same tag twice is a programming error: it is logged
    /// and the first registration wins.
    pub fn register<M: Message + 'static>(&mut self, handler: fn(&mut C, ConnId, M))
    where
        C: 'static,
    {
        if self.handlers.contains_key(M::TAG) {
            error!("Duplicate handler registration for tag {}", M::TAG);
            return;
        }
        self.handlers.insert(
            M::TAG,
            Box::new(move |ctx, sender, envelope| match envelope.unpack::<M>() {
                Ok(msg) => handler(ctx, sender, msg),
                Err(e) => warn!("Dropping malformed {} payload: {}", M::TAG, e),
            }),
        );
    }

    /// Routes an envelope to its registered handler.
    ///
    /// Unresolved tags are logged and dropped; a bad message never takes
    /// down the receiver.
    pub fn dispatch(&self, ctx: &mut C, sender: ConnId, envelope: &Envelope) {
        match self.handlers.get(envelope.tag.as_str()) {
            Some(handler) => handler(ctx, sender, envelope),
            None => warn!("No handler for message tag {}", envelope.tag),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}
