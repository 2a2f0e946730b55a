//! Wall-clock timestamps for monotonic instants.

use std::time::SystemTime;

use tokio::time::Instant;

/// Pairs a monotonic instant with the wall-clock time it was taken at, so
/// any later `Instant` maps to a consistent `SystemTime`.
#[derive(Debug, Clone, Copy)]
pub struct ClockAnchor {
    instant: Instant,
    wall: SystemTime,
}

impl ClockAnchor {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: SystemTime::now(),
        }
    }

    /// Wall-clock time of `at`.
    pub fn wall_at(&self, at: Instant) -> SystemTime {
        if at >= self.instant {
            self.wall + at.duration_since(self.instant)
        } else {
            self.wall - self.instant.duration_since(at)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_wall_time_follows_instant() {
        let anchor = ClockAnchor::now();
        tokio::time::advance(Duration::from_secs(90)).await;
        let later = Instant::now();

        let elapsed = anchor.wall_at(later).duration_since(anchor.wall_at(anchor.instant));
        assert_eq!(elapsed.unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_instants_before_the_anchor() {
        let anchor = ClockAnchor::now();
        let earlier = anchor.instant - Duration::from_secs(3);
        assert_eq!(anchor.wall_at(earlier), anchor.wall - Duration::from_secs(3));
    }
}
