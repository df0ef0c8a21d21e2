//! Client connection handling and the frame loop.
//!
//! Mirrors the server's split: a reader task parses length-prefixed
//! envelopes off the socket and forwards them over a channel, while the
//! main loop multiplexes inbound messages with the movement, snapshot and
//! heartbeat timers. Control (where to drive, when to fire) comes from a
//! caller-supplied closure so the same loop serves a bot or a real input
//! layer.

use crate::game::ClientGameState;
use log::{info, warn};
use shared::config::{HEARTBEAT_INTERVAL, MOVE_INTERVAL, SNAPSHOT_INTERVAL};
use shared::envelope::{Dispatcher, Envelope, MAX_FRAME_LEN};
use shared::math::Vec2;
use shared::messages::{LoginReq, Ping};
use shared::Message;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// One frame of control input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Intent {
    /// Desired movement direction; zero means stand still.
    pub direction: Vec2,
    pub shoot: bool,
}

async fn read_envelope(reader: &mut OwnedReadHalf) -> std::io::Result<Envelope> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit", len),
        ));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Envelope::from_bytes(&body)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

pub struct Client {
    writer: OwnedWriteHalf,
    inbound_rx: mpsc::UnboundedReceiver<Envelope>,
    dispatcher: Dispatcher<ClientGameState>,
    pub state: ClientGameState,
}

impl Client {
    /// Connects, starts the reader task and sends the login request.
    pub async fn connect(
        addr: &str,
        state: ClientGameState,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to {}", addr);
        let (mut reader, writer) = stream.into_split();

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match read_envelope(&mut reader).await {
                    Ok(envelope) => {
                        if inbound_tx.send(envelope).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        if e.kind() != std::io::ErrorKind::UnexpectedEof {
                            warn!("Read error: {}", e);
                        }
                        break;
                    }
                }
            }
        });

        let mut client = Client {
            writer,
            inbound_rx,
            dispatcher: ClientGameState::dispatcher(),
            state,
        };
        let login = LoginReq {
            id: client.state.player_id.clone(),
            name: client.state.name.clone(),
        };
        client.send(&login).await?;
        Ok(client)
    }

    pub async fn send<M: Message>(&mut self, msg: &M) -> Result<(), Box<dyn std::error::Error>> {
        let frame = Envelope::pack(msg)?.to_frame()?;
        self.writer.write_all(&frame).await?;
        Ok(())
    }

    /// Runs the frame loop until the server closes the connection.
    ///
    /// `control` is polled on every movement step with the current state
    /// and returns that frame's intent.
    pub async fn run<F>(&mut self, mut control: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: FnMut(&ClientGameState) -> Intent,
    {
        let mut move_timer = interval(Duration::from_secs_f32(MOVE_INTERVAL));
        move_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut snapshot_timer = interval(Duration::from_secs_f32(SNAPSHOT_INTERVAL));
        snapshot_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat_timer = interval(Duration::from_secs_f32(HEARTBEAT_INTERVAL));

        let mut last_frame = Instant::now();

        loop {
            tokio::select! {
                envelope = self.inbound_rx.recv() => {
                    match envelope {
                        Some(envelope) => {
                            self.dispatcher.dispatch(&mut self.state, 0, &envelope);
                        }
                        None => {
                            info!("Server closed the connection");
                            return Ok(());
                        }
                    }
                },

                _ = move_timer.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    self.state.update(dt);
                    let intent = control(&self.state);
                    self.state.apply_move(intent.direction, dt);
                    if intent.shoot {
                        let req = self.state.shoot();
                        self.send(&req).await?;
                    }
                },

                _ = snapshot_timer.tick() => {
                    // Meaningless until the clock has been seeded by a pong.
                    if self.state.logged_in && self.state.clock.is_started() {
                        let req = self.state.take_snapshot();
                        self.send(&req).await?;
                    }
                },

                _ = heartbeat_timer.tick() => {
                    let ping = Ping { ts: self.state.local_time() };
                    self.send(&ping).await?;
                },
            }
        }
    }
}
