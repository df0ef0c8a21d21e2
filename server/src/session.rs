//! Session lifecycle management for the authoritative server.
//!
//! A session binds a transport connection to a player identity and carries
//! the replication bookkeeping for that player:
//! - Login handling, including eviction of a previous session for the same
//!   player id (the new connection always wins)
//! - Offline tracking: a closed connection does not destroy the session,
//!   it only starts the grace timer; the periodic sweep reclaims sessions
//!   that stay offline past the grace period
//! - Last-validated position and last sync time for snapshot displacement
//!   checking
//!
//! The registry is owned exclusively by the simulation thread; transport
//! tasks only report connects and closes through the event channel.

use log::info;
use shared::envelope::ConnId;
use shared::math::{Transform, Vec2};
use std::collections::HashMap;

/// Server-side record binding a connection to a player identity.
#[derive(Debug)]
pub struct Session {
    /// Transport connection currently carrying this player.
    pub conn_id: ConnId,
    pub player_id: String,
    pub name: String,
    /// Most recent clamped transform accepted from this player.
    pub last_transform: Transform,
    /// Position that last passed (or was reset by) the speed check.
    pub last_validated_pos: Vec2,
    /// Virtual-clock timestamp of the last snapshot received.
    pub last_sync_time: f32,
    pub offline: bool,
    /// Seconds spent offline since the connection closed.
    pub offline_duration: f32,
}

impl Session {
    fn new(conn_id: ConnId, player_id: String, name: String) -> Self {
        Self {
            conn_id,
            player_id,
            name,
            last_transform: Transform::default(),
            last_validated_pos: Vec2::ZERO,
            last_sync_time: 0.0,
            offline: false,
            offline_duration: 0.0,
        }
    }
}

/// Result of a login: either a fresh session or a rejoin that displaced an
/// earlier one.
#[derive(Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    New,
    /// The player already had a session. If it was still online, the old
    /// connection must be closed by the caller.
    Rejoin { evicted_conn: Option<ConnId> },
}

/// All live sessions, indexed by player id with a connection-id lookup.
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    by_conn: HashMap<ConnId, String>,
    offline_grace: f32,
}

impl SessionRegistry {
    pub fn new(offline_grace: f32) -> Self {
        Self {
            sessions: HashMap::new(),
            by_conn: HashMap::new(),
            offline_grace,
        }
    }

    /// Binds `conn_id` to `player_id`, evicting any previous session for
    /// the same id. At most one live session per player id ever exists.
    ///
    /// Replication bookkeeping (last transform, validated position) is
    /// preserved across a rejoin so the reused tank does not teleport.
    pub fn login(&mut self, conn_id: ConnId, player_id: &str, name: &str) -> LoginOutcome {
        if let Some(session) = self.sessions.get_mut(player_id) {
            let evicted_conn = if session.offline {
                None
            } else {
                Some(session.conn_id)
            };
            if let Some(old_conn) = evicted_conn {
                info!(
                    "Player {} logged in again, evicting connection {}",
                    player_id, old_conn
                );
            }
            self.by_conn.remove(&session.conn_id);

            session.conn_id = conn_id;
            session.name = name.to_string();
            session.offline = false;
            session.offline_duration = 0.0;
            self.by_conn.insert(conn_id, player_id.to_string());

            LoginOutcome::Rejoin { evicted_conn }
        } else {
            info!("Player {} logged in on connection {}", player_id, conn_id);
            self.sessions.insert(
                player_id.to_string(),
                Session::new(conn_id, player_id.to_string(), name.to_string()),
            );
            self.by_conn.insert(conn_id, player_id.to_string());
            LoginOutcome::New
        }
    }

    /// Flags the session on `conn_id` as offline. The session survives
    /// until the sweep decides its grace period is over.
    pub fn mark_offline(&mut self, conn_id: ConnId) -> Option<&Session> {
        let player_id = self.by_conn.remove(&conn_id)?;
        let session = self.sessions.get_mut(&player_id)?;
        // A rejoin may already have rebound the session to a new
        // connection; only the current one may take it offline.
        if session.conn_id != conn_id {
            return None;
        }
        info!("Player {} went offline", player_id);
        session.offline = true;
        session.offline_duration = 0.0;
        Some(session)
    }

    /// Advances offline timers and removes sessions past the grace period.
    /// Returns the removed player ids so the caller can destroy their
    /// tanks and notify the remaining sessions.
    pub fn sweep_offline(&mut self, dt: f32) -> Vec<String> {
        let mut removed = Vec::new();
        for session in self.sessions.values_mut() {
            if session.offline {
                session.offline_duration += dt;
                if session.offline_duration > self.offline_grace {
                    removed.push(session.player_id.clone());
                }
            }
        }
        for player_id in &removed {
            if let Some(session) = self.sessions.remove(player_id) {
                self.by_conn.remove(&session.conn_id);
                info!(
                    "Player {} removed after {:.1}s offline",
                    player_id, session.offline_duration
                );
            }
        }
        removed
    }

    pub fn lookup(&self, conn_id: ConnId) -> Option<&Session> {
        let player_id = self.by_conn.get(&conn_id)?;
        self.sessions.get(player_id)
    }

    pub fn lookup_mut(&mut self, conn_id: ConnId) -> Option<&mut Session> {
        let player_id = self.by_conn.get(&conn_id)?;
        self.sessions.get_mut(player_id)
    }

    pub fn lookup_by_id(&self, player_id: &str) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    /// Connection ids of every online session, for broadcasting.
    pub fn online_conns(&self) -> Vec<ConnId> {
        self.sessions
            .values()
            .filter(|s| !s.offline)
            .map(|s| s.conn_id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
