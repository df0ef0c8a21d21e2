//! Movement plausibility checking for incoming snapshots.
//!
//! The server cannot reconstruct client inputs, so it bounds the claimed
//! displacement instead: between two snapshots a tank may move at most
//! `speed * elapsed`, with a small multiplicative slack for jitter between
//! the client's simulation step and its snapshot timer.

use shared::math::Vec2;

/// Result of checking one snapshot against the previous validated position.
#[derive(Debug, PartialEq)]
pub enum SnapshotVerdict {
    Accepted,
    /// Claimed displacement exceeds the speed budget.
    Violation { distance: f32, allowed: f32 },
}

/// Compares the displacement since the last validated position against the
/// distance the tank could legitimately cover in `elapsed` seconds.
///
/// The first snapshot of a session and any snapshot with a non-positive
/// elapsed time (clock correction can step the client's virtual clock
/// backwards) are accepted without a check.
pub fn check_displacement(
    last_validated: Vec2,
    new_pos: Vec2,
    speed: f32,
    elapsed: f32,
    slack: f32,
) -> SnapshotVerdict {
    if elapsed <= 0.0 {
        return SnapshotVerdict::Accepted;
    }
    let distance = last_validated.distance(new_pos);
    let allowed = speed * elapsed * slack;
    if distance <= allowed {
        SnapshotVerdict::Accepted
    } else {
        SnapshotVerdict::Violation { distance, allowed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_movement_within_budget() {
        // 3 u/s over 0.125s allows 0.375 plus slack.
        let verdict = check_displacement(
            Vec2::ZERO,
            Vec2::new(0.3, 0.0),
            3.0,
            0.125,
            1.01,
        );
        assert_eq!(verdict, SnapshotVerdict::Accepted);
    }

    #[test]
    fn test_accepts_exactly_at_budget_with_slack() {
        let verdict = check_displacement(
            Vec2::ZERO,
            Vec2::new(0.375, 0.0),
            3.0,
            0.125,
            1.01,
        );
        assert_eq!(verdict, SnapshotVerdict::Accepted);
    }

    #[test]
    fn test_flags_teleport() {
        let verdict = check_displacement(
            Vec2::ZERO,
            Vec2::new(5.0, 0.0),
            3.0,
            0.125,
            1.01,
        );
        match verdict {
            SnapshotVerdict::Violation { distance, allowed } => {
                assert!((distance - 5.0).abs() < 1e-5);
                assert!((allowed - 0.378_75).abs() < 1e-5);
            }
            SnapshotVerdict::Accepted => panic!("Teleport accepted"),
        }
    }

    #[test]
    fn test_non_positive_elapsed_is_accepted() {
        // Clock corrections can reorder timestamps; do not punish that.
        let far = Vec2::new(100.0, 0.0);
        assert_eq!(
            check_displacement(Vec2::ZERO, far, 3.0, 0.0, 1.01),
            SnapshotVerdict::Accepted
        );
        assert_eq!(
            check_displacement(Vec2::ZERO, far, 3.0, -0.5, 1.01),
            SnapshotVerdict::Accepted
        );
    }
}
