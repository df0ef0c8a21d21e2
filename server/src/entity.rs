//! Authoritative entity state: tanks and bullets.
//!
//! The store owns state and enforces the arena-bounds invariant on every
//! write; combat policy (who takes damage, what happens on death) lives in
//! the combat engine.

use log::info;
use rand::Rng;
use shared::config::ArenaBounds;
use shared::math::{Transform, Vec2};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Tank {
    pub owner_id: String,
    pub transform: Transform,
    pub hp: i32,
    /// Seconds of respawn protection left; damage is ignored while > 0.
    pub protect_remaining: f32,
    /// Cleared while protection is active.
    pub collider_enabled: bool,
}

impl Tank {
    pub fn is_protected(&self) -> bool {
        self.protect_remaining > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: u32,
    pub owner_id: String,
    pub transform: Transform,
    pub speed: f32,
}

/// What a damage application did, so the combat engine can react.
#[derive(Debug, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Respawn protection swallowed the hit; health unchanged.
    Protected,
    Damaged { hp: i32 },
    /// Health reached zero. The store leaves the death sequence (hp reset,
    /// protection, notifications) to the combat engine.
    Killed,
}

pub struct EntityStore {
    arena: ArenaBounds,
    max_hp: i32,
    tanks: HashMap<String, Tank>,
    bullets: HashMap<u32, Bullet>,
    next_bullet_id: u32,
}

impl EntityStore {
    pub fn new(arena: ArenaBounds, max_hp: i32) -> Self {
        Self {
            arena,
            max_hp,
            tanks: HashMap::new(),
            bullets: HashMap::new(),
            next_bullet_id: 1,
        }
    }

    pub fn arena(&self) -> &ArenaBounds {
        &self.arena
    }

    /// Creates a tank for `owner_id` at a random spot inside the arena,
    /// or returns the existing one on reconnect.
    pub fn spawn_tank(&mut self, owner_id: &str) -> &Tank {
        if !self.tanks.contains_key(owner_id) {
            let mut rng = rand::thread_rng();
            let margin = 0.5;
            let pos = Vec2::new(
                rng.gen_range(self.arena.left + margin..self.arena.right - margin),
                rng.gen_range(self.arena.bottom + margin..self.arena.top - margin),
            );
            info!("Spawned tank for {} at ({:.2}, {:.2})", owner_id, pos.x, pos.y);
            self.tanks.insert(
                owner_id.to_string(),
                Tank {
                    owner_id: owner_id.to_string(),
                    transform: Transform::new(pos, 0.0),
                    hp: self.max_hp,
                    protect_remaining: 0.0,
                    collider_enabled: true,
                },
            );
        }
        &self.tanks[owner_id]
    }

    pub fn remove_tank(&mut self, owner_id: &str) -> bool {
        self.tanks.remove(owner_id).is_some()
    }

    pub fn tank(&self, owner_id: &str) -> Option<&Tank> {
        self.tanks.get(owner_id)
    }

    pub fn tanks(&self) -> impl Iterator<Item = &Tank> {
        self.tanks.values()
    }

    pub fn tank_count(&self) -> usize {
        self.tanks.len()
    }

    /// Stores a tank transform, clamping the position into arena bounds.
    /// Returns the transform actually stored.
    pub fn set_tank_transform(&mut self, owner_id: &str, transform: Transform) -> Option<Transform> {
        let tank = self.tanks.get_mut(owner_id)?;
        let clamped = Transform::new(self.arena.clamp(transform.position), transform.rotation);
        tank.transform = clamped;
        Some(clamped)
    }

    /// Subtracts health unless protection is active. Death policy is the
    /// combat engine's job; this only reports what happened.
    pub fn apply_damage(&mut self, owner_id: &str, amount: i32) -> Option<DamageOutcome> {
        let tank = self.tanks.get_mut(owner_id)?;
        if tank.is_protected() {
            return Some(DamageOutcome::Protected);
        }
        tank.hp -= amount;
        if tank.hp <= 0 {
            Some(DamageOutcome::Killed)
        } else {
            Some(DamageOutcome::Damaged { hp: tank.hp })
        }
    }

    /// Death sequence state reset: full health, protection timer running,
    /// collider suppressed until it elapses.
    pub fn respawn_tank(&mut self, owner_id: &str, protect_time: f32) -> Option<&Tank> {
        let tank = self.tanks.get_mut(owner_id)?;
        tank.hp = self.max_hp;
        tank.protect_remaining = protect_time;
        tank.collider_enabled = false;
        Some(tank)
    }

    /// Winds down protection timers; collision re-enables when a timer
    /// reaches zero.
    pub fn update_protection(&mut self, dt: f32) {
        for tank in self.tanks.values_mut() {
            if tank.protect_remaining > 0.0 {
                tank.protect_remaining = (tank.protect_remaining - dt).max(0.0);
                if tank.protect_remaining == 0.0 {
                    tank.collider_enabled = true;
                }
            }
        }
    }

    pub fn spawn_bullet(&mut self, owner_id: &str, transform: Transform, speed: f32) -> u32 {
        let id = self.next_bullet_id;
        self.next_bullet_id += 1;
        self.bullets.insert(
            id,
            Bullet {
                id,
                owner_id: owner_id.to_string(),
                transform,
                speed,
            },
        );
        id
    }

    pub fn remove_bullet(&mut self, id: u32) -> Option<Bullet> {
        self.bullets.remove(&id)
    }

    pub fn bullet(&self, id: u32) -> Option<&Bullet> {
        self.bullets.get(&id)
    }

    pub fn bullets_mut(&mut self) -> &mut HashMap<u32, Bullet> {
        &mut self.bullets
    }

    pub fn bullet_count(&self) -> usize {
        self.bullets.len()
    }
}
