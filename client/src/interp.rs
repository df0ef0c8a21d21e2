//! Snapshot interpolation for remote tanks.
//!
//! Remote players replicate at 8 Hz while the client renders much faster,
//! so playback samples between the two snapshots bracketing the virtual
//! clock cursor. Snapshots are inserted in timestamp order, which makes
//! out-of-order network delivery harmless.

use shared::math::{lerp_angle, Transform};

/// One received remote state, stamped with the sender's clock.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub transform: Transform,
    pub time: f32,
}

/// Time-ordered snapshot history for a single remote tank.
#[derive(Debug, Default)]
pub struct SnapshotBuffer {
    snapshots: Vec<Snapshot>,
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }

    /// Inserts a snapshot at its timestamp position.
    pub fn push(&mut self, snapshot: Snapshot) {
        let idx = self
            .snapshots
            .partition_point(|s| s.time <= snapshot.time);
        self.snapshots.insert(idx, snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Samples the buffer at the playback cursor.
    ///
    /// Entries at or before the cursor are consumed, except the most recent
    /// one which stays as the lower interpolation bracket. With both
    /// brackets present the result is a linear position blend and a
    /// shortest-arc rotation blend; with a single snapshot the transform
    /// snaps to it.
    pub fn sample(&mut self, cursor: f32) -> Option<Transform> {
        while self.snapshots.len() >= 2 && self.snapshots[1].time <= cursor {
            self.snapshots.remove(0);
        }

        let lower = *self.snapshots.first()?;
        if self.snapshots.len() == 1 || cursor <= lower.time {
            return Some(lower.transform);
        }

        let upper = self.snapshots[1];
        let span = upper.time - lower.time;
        let s = if span > 0.0 {
            ((cursor - lower.time) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };

        Some(Transform::new(
            lower
                .transform
                .position
                .lerp(upper.transform.position, s),
            lerp_angle(lower.transform.rotation, upper.transform.rotation, s),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::math::Vec2;

    fn snap(x: f32, rotation: f32, time: f32) -> Snapshot {
        Snapshot {
            transform: Transform::new(Vec2::new(x, 0.0), rotation),
            time,
        }
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let mut buffer = SnapshotBuffer::new();
        assert!(buffer.sample(1.0).is_none());
    }

    #[test]
    fn test_single_snapshot_snaps() {
        let mut buffer = SnapshotBuffer::new();
        buffer.push(snap(3.0, 0.5, 10.0));

        // Before and after the lone timestamp, same answer.
        assert_eq!(buffer.sample(9.0).unwrap().position.x, 3.0);
        assert_eq!(buffer.sample(11.0).unwrap().position.x, 3.0);
    }

    #[test]
    fn test_interpolates_between_brackets() {
        let mut buffer = SnapshotBuffer::new();
        buffer.push(snap(0.0, 0.0, 10.0));
        buffer.push(snap(1.0, 1.0, 10.125));

        let mid = buffer.sample(10.0625).unwrap();
        assert_approx_eq!(mid.position.x, 0.5);
        assert_approx_eq!(mid.rotation, 0.5);
    }

    #[test]
    fn test_cursor_past_upper_clamps() {
        let mut buffer = SnapshotBuffer::new();
        buffer.push(snap(0.0, 0.0, 10.0));
        buffer.push(snap(1.0, 0.0, 10.125));

        // Upper becomes the new lower bracket and the position holds there.
        let held = buffer.sample(10.5).unwrap();
        assert_eq!(held.position.x, 1.0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_stale_entries_consumed_keeping_lower_bracket() {
        let mut buffer = SnapshotBuffer::new();
        for i in 0..5 {
            buffer.push(snap(i as f32, 0.0, 10.0 + i as f32 * 0.125));
        }

        // Cursor inside the fourth interval: three entries are stale.
        let sampled = buffer.sample(10.4).unwrap();
        assert_eq!(buffer.len(), 2);
        assert!(sampled.position.x > 3.0 && sampled.position.x < 4.0);
    }

    #[test]
    fn test_out_of_order_insertion_is_sorted() {
        let mut buffer = SnapshotBuffer::new();
        buffer.push(snap(2.0, 0.0, 10.25));
        buffer.push(snap(0.0, 0.0, 10.0));
        buffer.push(snap(1.0, 0.0, 10.125));

        let mid = buffer.sample(10.0625).unwrap();
        assert_approx_eq!(mid.position.x, 0.5);
    }

    #[test]
    fn test_playback_is_monotonic_under_reordered_delivery() {
        // Snapshots of a tank moving steadily along +x arrive shuffled; the
        // sampled x must still never move backwards as the cursor advances.
        let mut buffer = SnapshotBuffer::new();
        for &i in &[3, 0, 4, 1, 6, 2, 5] {
            buffer.push(snap(i as f32, 0.0, 10.0 + i as f32 * 0.125));
        }

        let mut cursor = 10.0;
        let mut last_x = f32::MIN;
        while cursor < 10.8 {
            let x = buffer.sample(cursor).unwrap().position.x;
            assert!(x >= last_x, "x went backwards: {} < {}", x, last_x);
            last_x = x;
            cursor += 0.016;
        }
    }

    #[test]
    fn test_shortest_arc_rotation_across_seam() {
        use std::f32::consts::PI;
        let mut buffer = SnapshotBuffer::new();
        buffer.push(snap(0.0, PI - 0.1, 10.0));
        buffer.push(snap(0.0, -PI + 0.1, 10.125));

        let mid = buffer.sample(10.0625).unwrap();
        // Midpoint heading points along the seam, not backwards through 0.
        assert_approx_eq!(mid.rotation.cos(), PI.cos(), 1e-4);
    }
}
