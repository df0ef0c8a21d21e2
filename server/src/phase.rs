//! Match phase progression.
//!
//! A match walks Ready -> Fight -> End -> Destroy on fixed timers. The
//! machine only tracks time and phase; the game loop turns transitions into
//! broadcasts and, on Destroy, shuts the server down.

use log::info;
use shared::config::GameConfig;
use shared::messages::GamePhase;

pub struct PhaseMachine {
    phase: GamePhase,
    remaining: f32,
    fight_duration: f32,
    end_duration: f32,
}

impl PhaseMachine {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            phase: GamePhase::Ready,
            remaining: config.ready_duration,
            fight_duration: config.fight_duration,
            end_duration: config.end_duration,
        }
    }

    pub fn current(&self) -> GamePhase {
        self.phase
    }

    /// Seconds left in the current phase.
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn is_destroyed(&self) -> bool {
        self.phase == GamePhase::Destroy
    }

    /// Advances the phase timer. Returns the new phase when this step
    /// crossed a transition, `None` otherwise.
    pub fn update(&mut self, dt: f32) -> Option<GamePhase> {
        if self.phase == GamePhase::Destroy {
            return None;
        }
        self.remaining -= dt;
        if self.remaining > 0.0 {
            return None;
        }

        let next = match self.phase {
            GamePhase::Ready => {
                self.remaining = self.fight_duration;
                GamePhase::Fight
            }
            GamePhase::Fight => {
                self.remaining = self.end_duration;
                GamePhase::End
            }
            GamePhase::End => {
                self.remaining = 0.0;
                GamePhase::Destroy
            }
            GamePhase::None | GamePhase::Destroy => return None,
        };
        info!("Match phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
        Some(next)
    }
}
