//! Wire messages exchanged between client and server.
//!
//! Tags keep the `tank_game.*` naming of the original protocol so captures
//! stay recognizable. Requests (`*Req`) flow client to server, responses
//! (`*Rsp`) and notifications (`*Ntf`) flow server to client.

use crate::envelope::Message;
use crate::math::{Transform, Vec2};
use serde::{Deserialize, Serialize};

/// Match phase as broadcast by the server.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    None,
    Ready,
    Fight,
    End,
    Destroy,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LoginCode {
    Ok,
    Failed,
}

/// Heartbeat request. `ts` echoes back in the reply so the client can
/// measure round-trip latency.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Ping {
    pub ts: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Pong {
    pub ts: f32,
    pub server_time: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginReq {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginRsp {
    pub code: LoginCode,
    pub msg: String,
}

/// Announces a player's tank to a session: sent to everyone on login, and
/// as a full roster to the newly logged-in session.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerAppearanceNtf {
    pub id: String,
    pub name: String,
    pub hp: i32,
    pub transform: Transform,
    pub reborn_protect_time: f32,
    pub rejoin: bool,
}

/// Client movement snapshot. `transform` is `None` on a cadence boundary
/// without movement; the send still refreshes the server's liveness view.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerStateSyncReq {
    pub transform: Option<Transform>,
    pub sync_time: f32,
}

/// Rebroadcast of another player's snapshot, stamped with the sender's
/// virtual-clock time for interpolation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerStateNtf {
    pub id: String,
    pub transform: Transform,
    pub sync_time: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerShootReq {
    pub transform: Transform,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerShootNtf {
    pub id: String,
    pub transform: Transform,
    pub speed: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BulletDestroyNtf {
    pub id: u32,
    pub pos: Vec2,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TankHpSyncNtf {
    pub id: String,
    pub hp: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerDieNtf {
    pub killed_id: String,
    pub killer_id: String,
    /// Server-clock time at which respawn protection expires.
    pub reborn_protect_end: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerDisappearNtf {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GameStateNtf {
    pub state: GamePhase,
    pub time: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GameOverNtf {}

/// Authoritative position correction, sent only under the
/// reject-and-resync speed-check policy.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResyncNtf {
    pub transform: Transform,
}

impl Message for Ping {
    const TAG: &'static str = "tank_game.Ping";
}
impl Message for Pong {
    const TAG: &'static str = "tank_game.Pong";
}
impl Message for LoginReq {
    const TAG: &'static str = "tank_game.LoginReq";
}
impl Message for LoginRsp {
    const TAG: &'static str = "tank_game.LoginRsp";
}
impl Message for PlayerAppearanceNtf {
    const TAG: &'static str = "tank_game.PlayerAppearanceNtf";
}
impl Message for PlayerStateSyncReq {
    const TAG: &'static str = "tank_game.PlayerStateSyncReq";
}
impl Message for PlayerStateNtf {
    const TAG: &'static str = "tank_game.PlayerStateNtf";
}
impl Message for PlayerShootReq {
    const TAG: &'static str = "tank_game.PlayerShootReq";
}
impl Message for PlayerShootNtf {
    const TAG: &'static str = "tank_game.PlayerShootNtf";
}
impl Message for BulletDestroyNtf {
    const TAG: &'static str = "tank_game.BulletDestroyNtf";
}
impl Message for TankHpSyncNtf {
    const TAG: &'static str = "tank_game.TankHpSyncNtf";
}
impl Message for PlayerDieNtf {
    const TAG: &'static str = "tank_game.PlayerDieNtf";
}
impl Message for PlayerDisappearNtf {
    const TAG: &'static str = "tank_game.PlayerDisappearNtf";
}
impl Message for GameStateNtf {
    const TAG: &'static str = "tank_game.GameStateNtf";
}
impl Message for GameOverNtf {
    const TAG: &'static str = "tank_game.GameOverNtf";
}
impl Message for ResyncNtf {
    const TAG: &'static str = "tank_game.ResyncNtf";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::math::Vec2;

    #[test]
    fn test_login_roundtrip() {
        let req = LoginReq {
            id: "player-1".to_string(),
            name: "Alice".to_string(),
        };
        let envelope = Envelope::pack(&req).unwrap();
        assert_eq!(envelope.tag, "tank_game.LoginReq");

        let back: LoginReq = envelope.unpack().unwrap();
        assert_eq!(back.id, "player-1");
        assert_eq!(back.name, "Alice");
    }

    #[test]
    fn test_snapshot_without_movement() {
        let req = PlayerStateSyncReq {
            transform: None,
            sync_time: 12.5,
        };
        let envelope = Envelope::pack(&req).unwrap();
        let back: PlayerStateSyncReq = envelope.unpack().unwrap();
        assert!(back.transform.is_none());
        assert_eq!(back.sync_time, 12.5);
    }

    #[test]
    fn test_die_ntf_roundtrip() {
        let ntf = PlayerDieNtf {
            killed_id: "b".to_string(),
            killer_id: "a".to_string(),
            reborn_protect_end: 33.0,
        };
        let envelope = Envelope::pack(&ntf).unwrap();
        let back: PlayerDieNtf = envelope.unpack().unwrap();
        assert_eq!(back.killed_id, "b");
        assert_eq!(back.killer_id, "a");
        assert_eq!(back.reborn_protect_end, 33.0);
    }

    #[test]
    fn test_phase_ntf_roundtrip() {
        let ntf = GameStateNtf {
            state: GamePhase::Fight,
            time: 180.0,
        };
        let envelope = Envelope::pack(&ntf).unwrap();
        let back: GameStateNtf = envelope.unpack().unwrap();
        assert_eq!(back.state, GamePhase::Fight);
    }

    #[test]
    fn test_bullet_destroy_roundtrip() {
        let ntf = BulletDestroyNtf {
            id: 3,
            pos: Vec2::new(1.0, -2.0),
        };
        let envelope = Envelope::pack(&ntf).unwrap();
        let back: BulletDestroyNtf = envelope.unpack().unwrap();
        assert_eq!(back.id, 3);
        assert_eq!(back.pos, Vec2::new(1.0, -2.0));
    }
}
