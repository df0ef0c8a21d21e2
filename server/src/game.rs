//! Authoritative game simulation.
//!
//! All state lives here and is only ever touched from the simulation loop:
//! the network layer delivers [`ServerEvent`]s and the dispatcher routes
//! decoded messages into the handler methods below. Every outbound message
//! goes through the [`Outbox`].

use crate::combat::{self, CombatEvent};
use crate::entity::EntityStore;
use crate::network::{Outbox, ServerEvent};
use crate::phase::PhaseMachine;
use crate::session::{LoginOutcome, SessionRegistry};
use crate::validation::{self, SnapshotVerdict};
use log::{debug, info, warn};
use shared::config::{GameConfig, SpeedCheckPolicy};
use shared::envelope::{ConnId, Dispatcher, Envelope};
use shared::messages::{
    BulletDestroyNtf, GameOverNtf, GamePhase, GameStateNtf, LoginCode, LoginReq, LoginRsp,
    Ping, PlayerAppearanceNtf, PlayerDieNtf, PlayerDisappearNtf, PlayerShootNtf, PlayerShootReq,
    PlayerStateNtf, PlayerStateSyncReq, Pong, ResyncNtf, TankHpSyncNtf,
};
use shared::Message;

/// Offline sessions are reaped on roughly this cadence, not every tick.
const SWEEP_INTERVAL: f32 = 1.0;

pub struct Game {
    config: GameConfig,
    /// Authoritative match clock, seconds since the server started.
    server_time: f32,
    sessions: SessionRegistry,
    entities: EntityStore,
    phase: PhaseMachine,
    outbox: Outbox,
    sweep_accum: f32,
    shutdown: bool,
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        let entities = EntityStore::new(config.arena, config.max_hp);
        let sessions = SessionRegistry::new(config.offline_grace);
        let phase = PhaseMachine::new(&config);
        Self {
            config,
            server_time: 0.0,
            sessions,
            entities,
            phase,
            outbox: Outbox::new(),
            sweep_accum: 0.0,
            shutdown: false,
        }
    }

    /// Builds the routing table for everything clients may send.
    pub fn dispatcher() -> Dispatcher<Game> {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register::<Ping>(Game::on_ping);
        dispatcher.register::<LoginReq>(Game::on_login);
        dispatcher.register::<PlayerStateSyncReq>(Game::on_state_sync);
        dispatcher.register::<PlayerShootReq>(Game::on_shoot);
        dispatcher
    }

    pub fn phase(&self) -> GamePhase {
        self.phase.current()
    }

    pub fn server_time(&self) -> f32 {
        self.server_time
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Applies one event from the network layer.
    pub fn handle_event(&mut self, dispatcher: &Dispatcher<Game>, event: ServerEvent) {
        match event {
            ServerEvent::Connected { conn_id, outbound } => {
                debug!("Connection {} registered", conn_id);
                self.outbox.register(conn_id, outbound);
            }
            ServerEvent::EnvelopeReceived { conn_id, envelope } => {
                dispatcher.dispatch(self, conn_id, &envelope);
            }
            ServerEvent::Disconnected { conn_id } => {
                self.outbox.unregister(conn_id);
                self.sessions.mark_offline(conn_id);
            }
        }
    }

    /// Advances the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.server_time += dt;

        if let Some(next) = self.phase.update(dt) {
            self.broadcast(&GameStateNtf {
                state: next,
                time: self.phase.remaining(),
            });
            match next {
                GamePhase::End => self.broadcast(&GameOverNtf {}),
                GamePhase::Destroy => self.shutdown = true,
                _ => {}
            }
        }

        self.entities.update_protection(dt);

        let events = combat::step_bullets(&mut self.entities, &self.config, dt);
        for event in events {
            self.publish_combat_event(event);
        }

        self.sweep_accum += dt;
        if self.sweep_accum >= SWEEP_INTERVAL {
            let removed = self.sessions.sweep_offline(self.sweep_accum);
            self.sweep_accum = 0.0;
            for player_id in removed {
                self.entities.remove_tank(&player_id);
                self.broadcast(&PlayerDisappearNtf {
                    id: player_id.clone(),
                });
            }
        }
    }

    fn publish_combat_event(&mut self, event: CombatEvent) {
        match event {
            CombatEvent::BulletOutOfBounds { bullet_id, pos } => {
                self.broadcast(&BulletDestroyNtf { id: bullet_id, pos });
            }
            CombatEvent::BulletHit {
                bullet_id,
                impact,
                target_id,
                hp,
            } => {
                self.broadcast(&BulletDestroyNtf {
                    id: bullet_id,
                    pos: impact,
                });
                self.broadcast(&TankHpSyncNtf { id: target_id, hp });
            }
            CombatEvent::TankKilled {
                killed_id,
                killer_id,
            } => {
                self.broadcast(&PlayerDieNtf {
                    killed_id: killed_id.clone(),
                    killer_id,
                    reborn_protect_end: self.server_time + self.config.reborn_protect_time,
                });
                // The respawned tank is back at full health.
                self.broadcast(&TankHpSyncNtf {
                    id: killed_id,
                    hp: self.config.max_hp,
                });
            }
        }
    }

    fn on_ping(&mut self, conn_id: ConnId, ping: Ping) {
        self.outbox.send(
            conn_id,
            &Pong {
                ts: ping.ts,
                server_time: self.server_time,
            },
        );
    }

    fn on_login(&mut self, conn_id: ConnId, req: LoginReq) {
        if req.id.is_empty() {
            self.outbox.send(
                conn_id,
                &LoginRsp {
                    code: LoginCode::Failed,
                    msg: "empty player id".to_string(),
                },
            );
            return;
        }

        let outcome = self.sessions.login(conn_id, &req.id, &req.name);
        let rejoin = match outcome {
            LoginOutcome::New => false,
            LoginOutcome::Rejoin { evicted_conn } => {
                // The newer connection always wins; close the stale one.
                if let Some(old_conn) = evicted_conn {
                    self.outbox.close(old_conn);
                }
                true
            }
        };

        let tank = self.entities.spawn_tank(&req.id).clone();
        if let Some(session) = self.sessions.lookup_mut(conn_id) {
            session.last_transform = tank.transform;
            session.last_validated_pos = tank.transform.position;
        }

        self.outbox.send(
            conn_id,
            &LoginRsp {
                code: LoginCode::Ok,
                msg: String::new(),
            },
        );
        self.outbox.send(
            conn_id,
            &GameStateNtf {
                state: self.phase.current(),
                time: self.phase.remaining(),
            },
        );

        // Full roster to the fresh session, own tank included.
        for other in self.sessions.iter() {
            if let Some(other_tank) = self.entities.tank(&other.player_id) {
                self.outbox.send(
                    conn_id,
                    &PlayerAppearanceNtf {
                        id: other.player_id.clone(),
                        name: other.name.clone(),
                        hp: other_tank.hp,
                        transform: other_tank.transform,
                        reborn_protect_time: other_tank.protect_remaining,
                        rejoin: false,
                    },
                );
            }
        }

        self.broadcast_except(
            conn_id,
            &PlayerAppearanceNtf {
                id: req.id.clone(),
                name: req.name.clone(),
                hp: tank.hp,
                transform: tank.transform,
                reborn_protect_time: tank.protect_remaining,
                rejoin,
            },
        );
        info!(
            "Player {} ({}) entered the match, rejoin={}",
            req.id, req.name, rejoin
        );
    }

    fn on_state_sync(&mut self, conn_id: ConnId, req: PlayerStateSyncReq) {
        let (player_id, last_validated, last_sync_time) = match self.sessions.lookup(conn_id) {
            Some(session) => (
                session.player_id.clone(),
                session.last_validated_pos,
                session.last_sync_time,
            ),
            None => {
                warn!("Snapshot from connection {} without a session", conn_id);
                return;
            }
        };

        let transform = match req.transform {
            Some(t) => t,
            None => {
                // Idle snapshot: nothing moved, only the timestamp advances.
                if let Some(session) = self.sessions.lookup_mut(conn_id) {
                    session.last_sync_time = req.sync_time;
                }
                return;
            }
        };

        let elapsed = req.sync_time - last_sync_time;
        let verdict = validation::check_displacement(
            last_validated,
            transform.position,
            self.config.tank_speed,
            elapsed,
            self.config.speed_check_slack,
        );

        if let SnapshotVerdict::Violation { distance, allowed } = verdict {
            warn!(
                "Player {} moved {:.2} in {:.3}s (allowed {:.2})",
                player_id, distance, elapsed, allowed
            );
            if self.config.speed_check == SpeedCheckPolicy::RejectAndResync {
                let authoritative = match self.sessions.lookup_mut(conn_id) {
                    Some(session) => {
                        session.last_sync_time = req.sync_time;
                        session.last_transform
                    }
                    None => return,
                };
                self.outbox.send(
                    conn_id,
                    &ResyncNtf {
                        transform: authoritative,
                    },
                );
                return;
            }
            // LogOnly: fall through and accept the position.
        }

        let stored = match self.entities.set_tank_transform(&player_id, transform) {
            Some(t) => t,
            None => return,
        };
        if let Some(session) = self.sessions.lookup_mut(conn_id) {
            session.last_transform = stored;
            session.last_validated_pos = stored.position;
            session.last_sync_time = req.sync_time;
        }

        self.broadcast_except(
            conn_id,
            &PlayerStateNtf {
                id: player_id,
                transform: stored,
                sync_time: req.sync_time,
            },
        );
    }

    fn on_shoot(&mut self, conn_id: ConnId, req: PlayerShootReq) {
        if self.phase.current() != GamePhase::Fight {
            debug!("Shot outside the fight phase ignored");
            return;
        }
        let player_id = match self.sessions.lookup(conn_id) {
            Some(session) => session.player_id.clone(),
            None => {
                warn!("Shot from connection {} without a session", conn_id);
                return;
            }
        };

        self.entities
            .spawn_bullet(&player_id, req.transform, self.config.bullet_speed);

        // The shooter already plays its own muzzle effect locally.
        self.broadcast_except(
            conn_id,
            &PlayerShootNtf {
                id: player_id,
                transform: req.transform,
                speed: self.config.bullet_speed,
            },
        );
    }

    fn broadcast<M: Message>(&self, msg: &M) {
        match Envelope::pack(msg) {
            Ok(envelope) => {
                for conn_id in self.sessions.online_conns() {
                    self.outbox.send_envelope(conn_id, &envelope);
                }
            }
            Err(e) => warn!("Failed to encode broadcast {}: {}", M::TAG, e),
        }
    }

    fn broadcast_except<M: Message>(&self, skip: ConnId, msg: &M) {
        match Envelope::pack(msg) {
            Ok(envelope) => {
                for conn_id in self.sessions.online_conns() {
                    if conn_id != skip {
                        self.outbox.send_envelope(conn_id, &envelope);
                    }
                }
            }
            Err(e) => warn!("Failed to encode broadcast {}: {}", M::TAG, e),
        }
    }
}
