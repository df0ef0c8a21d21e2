//! Server-authoritative combat resolution.
//!
//! Bullets only ever exist as simulated entities on the server; clients
//! render locally predicted visuals that are never corrected. Each tick the
//! engine advances every bullet along its facing, expires the ones that
//! leave the arena, and resolves tank overlaps into damage and deaths. The
//! resulting events are translated into broadcasts by the game loop.

use crate::entity::{DamageOutcome, EntityStore};
use log::{debug, info};
use shared::config::GameConfig;
use shared::math::Vec2;

/// Outcomes of one bullet simulation step, in resolution order.
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    /// Bullet crossed the arena boundary without hitting anything.
    BulletOutOfBounds { bullet_id: u32, pos: Vec2 },
    /// Bullet struck an unprotected tank.
    BulletHit {
        bullet_id: u32,
        impact: Vec2,
        target_id: String,
        hp: i32,
    },
    /// The hit reduced the target to zero health. The tank has already
    /// been respawned (full hp, protection running) by the time this
    /// event is observed.
    TankKilled {
        killed_id: String,
        killer_id: String,
    },
}

/// Advances all bullets by `dt` and resolves collisions.
///
/// A bullet passing over a protected tank (or its own owner, unless
/// self-damage is enabled) keeps flying; protection means the hit never
/// happened.
pub fn step_bullets(store: &mut EntityStore, config: &GameConfig, dt: f32) -> Vec<CombatEvent> {
    let mut events = Vec::new();

    let bullet_ids: Vec<u32> = store.bullets_mut().keys().copied().collect();
    for bullet_id in bullet_ids {
        let (pos, owner_id) = {
            let bullet = match store.bullets_mut().get_mut(&bullet_id) {
                Some(b) => b,
                None => continue,
            };
            let step = bullet.transform.facing().scaled(bullet.speed * dt);
            bullet.transform.position = bullet.transform.position.add(step);
            (bullet.transform.position, bullet.owner_id.clone())
        };

        if !config.arena.contains(pos) {
            store.remove_bullet(bullet_id);
            debug!("Bullet {} left arena at ({:.2}, {:.2})", bullet_id, pos.x, pos.y);
            events.push(CombatEvent::BulletOutOfBounds { bullet_id, pos });
            continue;
        }

        let target_id = store
            .tanks()
            .find(|tank| {
                if tank.owner_id == owner_id && !config.allow_self_damage {
                    return false;
                }
                if !tank.collider_enabled || tank.is_protected() {
                    return false;
                }
                tank.transform.position.distance(pos) <= config.hit_radius
            })
            .map(|tank| tank.owner_id.clone());

        let target_id = match target_id {
            Some(id) => id,
            None => continue,
        };

        match store.apply_damage(&target_id, config.bullet_damage) {
            Some(DamageOutcome::Damaged { hp }) => {
                store.remove_bullet(bullet_id);
                events.push(CombatEvent::BulletHit {
                    bullet_id,
                    impact: pos,
                    target_id,
                    hp,
                });
            }
            Some(DamageOutcome::Killed) => {
                store.remove_bullet(bullet_id);
                store.respawn_tank(&target_id, config.reborn_protect_time);
                info!("Tank {} destroyed by {}", target_id, owner_id);
                events.push(CombatEvent::BulletHit {
                    bullet_id,
                    impact: pos,
                    target_id: target_id.clone(),
                    hp: 0,
                });
                events.push(CombatEvent::TankKilled {
                    killed_id: target_id,
                    killer_id: owner_id,
                });
            }
            // Protection was checked before damage; reaching here means the
            // tank vanished between lookup and application.
            Some(DamageOutcome::Protected) | None => {}
        }
    }

    events
}
