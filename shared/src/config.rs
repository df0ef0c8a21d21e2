//! Game tuning values shared by server and client.

use crate::math::Vec2;
use serde::{Deserialize, Serialize};

/// Cadence of client movement snapshots (8 Hz).
pub const SNAPSHOT_INTERVAL: f32 = 0.125;
/// Heartbeat cadence for clock synchronization.
pub const HEARTBEAT_INTERVAL: f32 = 1.0;
/// Local movement integration step on the client.
pub const MOVE_INTERVAL: f32 = 0.03;

/// Axis-aligned playable area. Authoritative writes clamp into it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl ArenaBounds {
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= self.left && pos.x <= self.right && pos.y >= self.bottom && pos.y <= self.top
    }

    pub fn clamp(&self, pos: Vec2) -> Vec2 {
        Vec2 {
            x: pos.x.clamp(self.left, self.right),
            y: pos.y.clamp(self.bottom, self.top),
        }
    }
}

impl Default for ArenaBounds {
    fn default() -> Self {
        // 16:9 play field centered on the origin, world units.
        Self {
            left: -8.0,
            right: 8.0,
            bottom: -4.5,
            top: 4.5,
        }
    }
}

/// How the server reacts to a snapshot that moved further than the tank's
/// speed allows.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedCheckPolicy {
    /// Log the violation and accept the position anyway.
    #[default]
    LogOnly,
    /// Revert to the last validated position and tell the client to resync.
    RejectAndResync,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GameConfig {
    pub tank_speed: f32,
    pub max_hp: i32,
    pub bullet_speed: f32,
    pub bullet_damage: i32,
    /// Bullet-to-tank distance that counts as a hit.
    pub hit_radius: f32,
    pub reborn_protect_time: f32,
    /// Seconds a disconnected session survives before the sweep removes it.
    pub offline_grace: f32,
    pub ready_duration: f32,
    pub fight_duration: f32,
    pub end_duration: f32,
    pub speed_check: SpeedCheckPolicy,
    /// Multiplicative slack on the allowed displacement.
    pub speed_check_slack: f32,
    pub allow_self_damage: bool,
    pub arena: ArenaBounds,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tank_speed: 3.0,
            max_hp: 100,
            bullet_speed: 8.0,
            bullet_damage: 10,
            hit_radius: 0.5,
            reborn_protect_time: 3.0,
            offline_grace: 10.0,
            ready_duration: 10.0,
            fight_duration: 180.0,
            end_duration: 10.0,
            speed_check: SpeedCheckPolicy::LogOnly,
            speed_check_slack: 1.01,
            allow_self_damage: false,
            arena: ArenaBounds::default(),
        }
    }
}
