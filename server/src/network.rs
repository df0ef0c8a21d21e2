//! Server transport layer and main loop coordination.
//!
//! Network I/O runs on tokio tasks that never touch simulation state: each
//! accepted connection gets a reader task (parses length-prefixed envelopes
//! and forwards them over the event channel) and a writer task (drains an
//! outbound byte queue). The simulation loop drains the event channel once
//! per tick, so all game state stays single-threaded behind that boundary.

use crate::game::Game;
use log::{debug, error, info, warn};
use shared::envelope::{ConnId, Dispatcher, Envelope, MAX_FRAME_LEN};
use shared::Message;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Events sent from transport tasks to the simulation loop.
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        conn_id: ConnId,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    },
    EnvelopeReceived {
        conn_id: ConnId,
        envelope: Envelope,
    },
    Disconnected {
        conn_id: ConnId,
    },
}

/// Outbound side of every live connection, owned by the simulation thread.
///
/// Closing a connection is just dropping its sender: the writer task ends
/// and the socket shuts down.
pub struct Outbox {
    conns: HashMap<ConnId, mpsc::UnboundedSender<Vec<u8>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            conns: HashMap::new(),
        }
    }

    pub fn register(&mut self, conn_id: ConnId, outbound: mpsc::UnboundedSender<Vec<u8>>) {
        self.conns.insert(conn_id, outbound);
    }

    pub fn unregister(&mut self, conn_id: ConnId) {
        self.conns.remove(&conn_id);
    }

    /// Drops the outbound queue, closing the connection.
    pub fn close(&mut self, conn_id: ConnId) {
        if self.conns.remove(&conn_id).is_some() {
            debug!("Closed connection {}", conn_id);
        }
    }

    pub fn is_open(&self, conn_id: ConnId) -> bool {
        self.conns.contains_key(&conn_id)
    }

    pub fn send<M: Message>(&self, conn_id: ConnId, msg: &M) {
        let envelope = match Envelope::pack(msg) {
            Ok(e) => e,
            Err(e) => {
                error!("Failed to encode {}: {}", M::TAG, e);
                return;
            }
        };
        self.send_envelope(conn_id, &envelope);
    }

    pub fn send_envelope(&self, conn_id: ConnId, envelope: &Envelope) {
        let frame = match envelope.to_frame() {
            Ok(f) => f,
            Err(e) => {
                error!("Failed to frame {}: {}", envelope.tag, e);
                return;
            }
        };
        if let Some(tx) = self.conns.get(&conn_id) {
            // A send failure means the writer task already died; the
            // Disconnected event will clean up shortly.
            let _ = tx.send(frame);
        }
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads one length-prefixed envelope frame from the stream.
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

fn spawn_connection(
    stream: TcpStream,
    conn_id: ConnId,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    if events
        .send(ServerEvent::Connected {
            conn_id,
            outbound: outbound_tx,
        })
        .is_err()
    {
        return;
    }

    // Writer task: drains queued frames until the simulation drops the
    // sender or the peer goes away.
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = writer.write_all(&frame).await {
                debug!("Write to connection {} failed: {}", conn_id, e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    // Reader task: envelope frames in, events out.
    tokio::spawn(async move {
        loop {
            match read_envelope(&mut reader).await {
                Ok(envelope) => {
                    if events
                        .send(ServerEvent::EnvelopeReceived { conn_id, envelope })
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::UnexpectedEof {
                        warn!("Connection {} read error: {}", conn_id, e);
                    }
                    break;
                }
            }
        }
        let _ = events.send(ServerEvent::Disconnected { conn_id });
    });
}

/// Main server: accepts connections and runs the simulation loop.
pub struct Server {
    listener: TcpListener,
    game: Game,
    dispatcher: Dispatcher<Game>,
    tick_duration: Duration,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        game: Game,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            game,
            dispatcher: Game::dispatcher(),
            tick_duration,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop and the fixed-rate simulation loop until the
    /// match phase machine reaches `Destroy`.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let next_conn_id = Arc::new(AtomicU64::new(1));

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!("Server started, phase {:?}", self.game.phase());

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let conn_id = next_conn_id.fetch_add(1, Ordering::Relaxed);
                            debug!("Accepted {} as connection {}", peer, conn_id);
                            spawn_connection(stream, conn_id, self.event_tx.clone());
                        }
                        Err(e) => {
                            error!("Accept failed: {}", e);
                        }
                    }
                },

                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.game.handle_event(&self.dispatcher, event),
                        None => break,
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.game.tick(dt);

                    if self.game.should_shutdown() {
                        info!("Match destroyed, shutting down");
                        break;
                    }
                },
            }
        }

        Ok(())
    }
}
