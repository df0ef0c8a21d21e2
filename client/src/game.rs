//! Client-side view of the match.
//!
//! The client owns its tank transform outright between server corrections
//! and treats everything else as replicated state: remote tanks play back
//! through interpolation buffers, bullets are purely visual predictions,
//! and health always comes from the server.

use crate::interp::{Snapshot, SnapshotBuffer};
use log::{debug, info, warn};
use shared::clock::VirtualClock;
use shared::config::GameConfig;
use shared::envelope::{ConnId, Dispatcher};
use shared::math::{Transform, Vec2};
use shared::messages::{
    BulletDestroyNtf, GameOverNtf, GamePhase, GameStateNtf, LoginCode, LoginRsp,
    PlayerAppearanceNtf, PlayerDieNtf, PlayerDisappearNtf, PlayerShootNtf, PlayerShootReq,
    PlayerStateNtf, PlayerStateSyncReq, Pong, ResyncNtf, TankHpSyncNtf,
};
use std::collections::HashMap;

/// A replicated opponent and its playback state.
pub struct RemotePlayer {
    pub name: String,
    pub hp: i32,
    pub transform: Transform,
    pub buffer: SnapshotBuffer,
}

/// Locally simulated bullet visual. The server never corrects these; the
/// authoritative outcome arrives as `BulletDestroyNtf` / hp syncs.
pub struct VisualBullet {
    pub transform: Transform,
    pub speed: f32,
}

pub struct ClientGameState {
    pub player_id: String,
    pub name: String,
    config: GameConfig,

    /// Own tank, simulated locally.
    pub local: Transform,
    pub hp: i32,
    moved: bool,

    /// Wall-clock seconds since this client started, used as the ping echo.
    local_time: f32,
    pub clock: VirtualClock,
    /// Added to each measured heartbeat latency, for netcode testing.
    pub fake_latency: f32,

    pub phase: GamePhase,
    pub phase_remaining: f32,
    pub game_over: bool,
    pub logged_in: bool,

    remotes: HashMap<String, RemotePlayer>,
    bullets: Vec<VisualBullet>,
}

impl ClientGameState {
    pub fn new(player_id: &str, name: &str, config: GameConfig) -> Self {
        Self {
            player_id: player_id.to_string(),
            name: name.to_string(),
            config,
            local: Transform::default(),
            hp: 0,
            moved: false,
            local_time: 0.0,
            clock: VirtualClock::new(),
            fake_latency: 0.0,
            phase: GamePhase::None,
            phase_remaining: 0.0,
            game_over: false,
            logged_in: false,
            remotes: HashMap::new(),
            bullets: Vec::new(),
        }
    }

    /// Routing table for everything the server may send.
    pub fn dispatcher() -> Dispatcher<ClientGameState> {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register::<Pong>(ClientGameState::on_pong);
        dispatcher.register::<LoginRsp>(ClientGameState::on_login_rsp);
        dispatcher.register::<PlayerAppearanceNtf>(ClientGameState::on_appearance);
        dispatcher.register::<PlayerStateNtf>(ClientGameState::on_state);
        dispatcher.register::<PlayerShootNtf>(ClientGameState::on_shoot);
        dispatcher.register::<BulletDestroyNtf>(ClientGameState::on_bullet_destroy);
        dispatcher.register::<TankHpSyncNtf>(ClientGameState::on_hp_sync);
        dispatcher.register::<PlayerDieNtf>(ClientGameState::on_die);
        dispatcher.register::<PlayerDisappearNtf>(ClientGameState::on_disappear);
        dispatcher.register::<GameStateNtf>(ClientGameState::on_game_state);
        dispatcher.register::<GameOverNtf>(ClientGameState::on_game_over);
        dispatcher.register::<ResyncNtf>(ClientGameState::on_resync);
        dispatcher
    }

    pub fn local_time(&self) -> f32 {
        self.local_time
    }

    pub fn remotes(&self) -> &HashMap<String, RemotePlayer> {
        &self.remotes
    }

    pub fn bullets(&self) -> &[VisualBullet] {
        &self.bullets
    }

    /// Integrates local movement intent for one step. The position is
    /// clamped to the arena so the local view never claims the impossible.
    pub fn apply_move(&mut self, direction: Vec2, dt: f32) {
        if direction.length() == 0.0 {
            return;
        }
        let step = direction.scaled(self.config.tank_speed * dt / direction.length());
        let next = self.config.arena.clamp(self.local.position.add(step));
        self.local = Transform::new(next, direction.y.atan2(direction.x));
        self.moved = true;
    }

    /// Builds the 8 Hz movement snapshot. The transform rides along only
    /// when movement happened since the last one; an idle send still tells
    /// the server we are alive.
    pub fn take_snapshot(&mut self) -> PlayerStateSyncReq {
        let transform = if self.moved {
            self.moved = false;
            Some(self.local)
        } else {
            None
        };
        PlayerStateSyncReq {
            transform,
            sync_time: self.clock.now(),
        }
    }

    /// Fires locally: spawns the predicted visual and returns the request
    /// for the server.
    pub fn shoot(&mut self) -> PlayerShootReq {
        self.bullets.push(VisualBullet {
            transform: self.local,
            speed: self.config.bullet_speed,
        });
        PlayerShootReq {
            transform: self.local,
        }
    }

    /// Per-frame update: clocks, bullet visuals, remote playback.
    pub fn update(&mut self, dt: f32) {
        self.local_time += dt;
        self.clock.advance(dt);

        let arena = self.config.arena;
        for bullet in &mut self.bullets {
            let step = bullet.transform.facing().scaled(bullet.speed * dt);
            bullet.transform.position = bullet.transform.position.add(step);
        }
        self.bullets
            .retain(|b| arena.contains(b.transform.position));

        if self.clock.is_started() {
            let cursor = self.clock.now();
            for remote in self.remotes.values_mut() {
                if let Some(transform) = remote.buffer.sample(cursor) {
                    remote.transform = transform;
                }
            }
        }
    }

    fn on_pong(&mut self, _conn: ConnId, pong: Pong) {
        let latency = (self.local_time - pong.ts).max(0.0) + self.fake_latency;
        self.clock.correct(pong.server_time, latency);
    }

    fn on_login_rsp(&mut self, _conn: ConnId, rsp: LoginRsp) {
        match rsp.code {
            LoginCode::Ok => {
                info!("Logged in as {}", self.player_id);
                self.logged_in = true;
            }
            LoginCode::Failed => {
                warn!("Login rejected: {}", rsp.msg);
            }
        }
    }

    fn on_appearance(&mut self, _conn: ConnId, ntf: PlayerAppearanceNtf) {
        if ntf.id == self.player_id {
            // Our own spawn state is authoritative on (re)entry.
            self.local = ntf.transform;
            self.hp = ntf.hp;
            self.moved = false;
            return;
        }
        debug!("Player {} appeared (rejoin={})", ntf.id, ntf.rejoin);
        let remote = self
            .remotes
            .entry(ntf.id)
            .or_insert_with(|| RemotePlayer {
                name: ntf.name,
                hp: ntf.hp,
                transform: ntf.transform,
                buffer: SnapshotBuffer::new(),
            });
        remote.hp = ntf.hp;
        remote.transform = ntf.transform;
        remote.buffer.clear();
    }

    fn on_state(&mut self, _conn: ConnId, ntf: PlayerStateNtf) {
        if let Some(remote) = self.remotes.get_mut(&ntf.id) {
            remote.buffer.push(Snapshot {
                transform: ntf.transform,
                time: ntf.sync_time,
            });
        }
    }

    fn on_shoot(&mut self, _conn: ConnId, ntf: PlayerShootNtf) {
        self.bullets.push(VisualBullet {
            transform: ntf.transform,
            speed: ntf.speed,
        });
    }

    fn on_bullet_destroy(&mut self, _conn: ConnId, ntf: BulletDestroyNtf) {
        // Visual bullets are not id-matched with server bullets; retire the
        // one closest to the impact point, if any survived this long.
        debug!("Bullet {} destroyed at ({:.2}, {:.2})", ntf.id, ntf.pos.x, ntf.pos.y);
        if let Some((idx, _)) = self
            .bullets
            .iter()
            .enumerate()
            .map(|(i, b)| (i, b.transform.position.distance(ntf.pos)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
        {
            self.bullets.swap_remove(idx);
        }
    }

    fn on_hp_sync(&mut self, _conn: ConnId, ntf: TankHpSyncNtf) {
        if ntf.id == self.player_id {
            self.hp = ntf.hp;
        } else if let Some(remote) = self.remotes.get_mut(&ntf.id) {
            remote.hp = ntf.hp;
        }
    }

    fn on_die(&mut self, _conn: ConnId, ntf: PlayerDieNtf) {
        info!("{} was destroyed by {}", ntf.killed_id, ntf.killer_id);
    }

    fn on_disappear(&mut self, _conn: ConnId, ntf: PlayerDisappearNtf) {
        info!("Player {} left the match", ntf.id);
        self.remotes.remove(&ntf.id);
    }

    fn on_game_state(&mut self, _conn: ConnId, ntf: GameStateNtf) {
        info!("Match phase {:?}, {:.1}s remaining", ntf.state, ntf.time);
        self.phase = ntf.state;
        self.phase_remaining = ntf.time;
    }

    fn on_game_over(&mut self, _conn: ConnId, _ntf: GameOverNtf) {
        info!("Match over");
        self.game_over = true;
    }

    fn on_resync(&mut self, _conn: ConnId, ntf: ResyncNtf) {
        warn!("Server resynced our position");
        self.local = ntf.transform;
        self.moved = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::envelope::Envelope;
    use shared::Message;

    fn state() -> ClientGameState {
        ClientGameState::new("me", "Me", GameConfig::default())
    }

    fn deliver<M: Message + 'static>(state: &mut ClientGameState, msg: &M) {
        let dispatcher = ClientGameState::dispatcher();
        let envelope = Envelope::pack(msg).unwrap();
        dispatcher.dispatch(state, 0, &envelope);
    }

    #[test]
    fn test_pong_seeds_clock_with_latency() {
        let mut s = state();
        s.update(0.4);
        deliver(
            &mut s,
            &Pong {
                ts: 0.2,
                server_time: 50.0,
            },
        );
        assert!(s.clock.is_started());
        // Half the measured 0.2s round trip is added to the server time.
        assert_approx_eq!(s.clock.now(), 50.1);
    }

    #[test]
    fn test_own_appearance_sets_local_tank() {
        let mut s = state();
        deliver(
            &mut s,
            &PlayerAppearanceNtf {
                id: "me".to_string(),
                name: "Me".to_string(),
                hp: 100,
                transform: Transform::new(Vec2::new(2.0, 1.0), 0.0),
                reborn_protect_time: 0.0,
                rejoin: false,
            },
        );
        assert_eq!(s.hp, 100);
        assert_eq!(s.local.position, Vec2::new(2.0, 1.0));
        assert!(s.remotes().is_empty());
    }

    #[test]
    fn test_remote_appearance_and_disappearance() {
        let mut s = state();
        deliver(
            &mut s,
            &PlayerAppearanceNtf {
                id: "other".to_string(),
                name: "Other".to_string(),
                hp: 80,
                transform: Transform::default(),
                reborn_protect_time: 0.0,
                rejoin: false,
            },
        );
        assert_eq!(s.remotes().len(), 1);
        assert_eq!(s.remotes()["other"].hp, 80);

        deliver(
            &mut s,
            &PlayerDisappearNtf {
                id: "other".to_string(),
            },
        );
        assert!(s.remotes().is_empty());
    }

    #[test]
    fn test_remote_playback_follows_snapshots() {
        let mut s = state();
        deliver(
            &mut s,
            &PlayerAppearanceNtf {
                id: "other".to_string(),
                name: "Other".to_string(),
                hp: 100,
                transform: Transform::default(),
                reborn_protect_time: 0.0,
                rejoin: false,
            },
        );
        // Clock tracking server time 10.0.
        deliver(
            &mut s,
            &Pong {
                ts: 0.0,
                server_time: 10.0,
            },
        );

        deliver(
            &mut s,
            &PlayerStateNtf {
                id: "other".to_string(),
                transform: Transform::new(Vec2::new(0.0, 0.0), 0.0),
                sync_time: 10.0,
            },
        );
        deliver(
            &mut s,
            &PlayerStateNtf {
                id: "other".to_string(),
                transform: Transform::new(Vec2::new(1.0, 0.0), 0.0),
                sync_time: 10.25,
            },
        );

        // Advance a frame past the first snapshot and sample.
        s.update(0.125);
        let x = s.remotes()["other"].transform.position.x;
        assert!(x > 0.0 && x < 1.0, "expected interpolation, got {}", x);
    }

    #[test]
    fn test_snapshot_carries_transform_only_after_movement() {
        let mut s = state();
        deliver(
            &mut s,
            &Pong {
                ts: 0.0,
                server_time: 1.0,
            },
        );

        let idle = s.take_snapshot();
        assert!(idle.transform.is_none());

        s.apply_move(Vec2::new(1.0, 0.0), 0.03);
        let moving = s.take_snapshot();
        assert!(moving.transform.is_some());

        // Movement flag is consumed by the send.
        let idle_again = s.take_snapshot();
        assert!(idle_again.transform.is_none());
    }

    #[test]
    fn test_apply_move_clamps_to_arena() {
        let mut s = state();
        s.local = Transform::new(Vec2::new(7.99, 0.0), 0.0);
        for _ in 0..100 {
            s.apply_move(Vec2::new(1.0, 0.0), 0.03);
        }
        assert_eq!(s.local.position.x, 8.0);
    }

    #[test]
    fn test_hp_sync_routes_by_id() {
        let mut s = state();
        deliver(
            &mut s,
            &PlayerAppearanceNtf {
                id: "other".to_string(),
                name: "Other".to_string(),
                hp: 100,
                transform: Transform::default(),
                reborn_protect_time: 0.0,
                rejoin: false,
            },
        );
        s.hp = 100;

        deliver(
            &mut s,
            &TankHpSyncNtf {
                id: "other".to_string(),
                hp: 90,
            },
        );
        assert_eq!(s.remotes()["other"].hp, 90);
        assert_eq!(s.hp, 100);

        deliver(
            &mut s,
            &TankHpSyncNtf {
                id: "me".to_string(),
                hp: 70,
            },
        );
        assert_eq!(s.hp, 70);
    }

    #[test]
    fn test_visual_bullets_expire_at_bounds() {
        let mut s = state();
        s.local = Transform::new(Vec2::new(7.9, 0.0), 0.0);
        s.shoot();
        assert_eq!(s.bullets().len(), 1);

        s.update(0.1);
        assert!(s.bullets().is_empty());
    }

    #[test]
    fn test_resync_overrides_local_transform() {
        let mut s = state();
        s.apply_move(Vec2::new(1.0, 1.0), 0.03);
        deliver(
            &mut s,
            &ResyncNtf {
                transform: Transform::new(Vec2::new(-1.0, -1.0), 0.0),
            },
        );
        assert_eq!(s.local.position, Vec2::new(-1.0, -1.0));
        assert!(s.take_snapshot().transform.is_none());
    }

    #[test]
    fn test_game_over_flag() {
        let mut s = state();
        deliver(
            &mut s,
            &GameStateNtf {
                state: GamePhase::End,
                time: 10.0,
            },
        );
        deliver(&mut s, &GameOverNtf {});
        assert_eq!(s.phase, GamePhase::End);
        assert!(s.game_over);
    }
}
