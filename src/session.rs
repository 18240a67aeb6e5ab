//! In-memory session lifetime tracking for the single admin session.

use chrono::{DateTime, Duration, Utc};

/// Tracks one active session under two timeouts: an absolute cap on session
/// age and a tighter inactivity cap at half the absolute value.
///
/// State machine: Unauthenticated -> Active -> (Expired | LoggedOut).
/// Arming overwrites any prior session unconditionally; nothing here is
/// persisted.
#[derive(Debug)]
pub struct SessionGuard {
    session_start: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    timeout_minutes: i64,
}

impl SessionGuard {
    pub const DEFAULT_TIMEOUT_MINUTES: i64 = 30;

    #[must_use]
    pub fn new(timeout_minutes: i64) -> Self {
        Self {
            session_start: None,
            last_activity: None,
            timeout_minutes,
        }
    }

    /// Start a fresh session. Called after successful authentication.
    pub fn arm(&mut self) {
        self.arm_at(Utc::now());
    }

    /// Refresh the activity timestamp. Callers invoke this on every accepted
    /// privileged request, never on rejected ones.
    pub fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    /// Forget the session entirely (logout).
    pub fn clear(&mut self) {
        self.session_start = None;
        self.last_activity = None;
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Whole minutes left before the absolute timeout; 0 when unarmed.
    #[must_use]
    pub fn remaining_minutes(&self) -> i64 {
        self.remaining_minutes_at(Utc::now())
    }

    fn arm_at(&mut self, now: DateTime<Utc>) {
        self.session_start = Some(now);
        self.last_activity = Some(now);
    }

    fn touch_at(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let (Some(start), Some(activity)) = (self.session_start, self.last_activity) else {
            return false;
        };

        // Absolute cap bounds total lifetime regardless of activity.
        if now - start > Duration::minutes(self.timeout_minutes) {
            return false;
        }

        // Inactivity cap forces earlier re-authentication when idle.
        // Computed in seconds so an odd timeout keeps its half-minute.
        if now - activity > Duration::seconds(self.timeout_minutes * 60 / 2) {
            return false;
        }

        true
    }

    fn remaining_minutes_at(&self, now: DateTime<Utc>) -> i64 {
        let Some(start) = self.session_start else {
            return 0;
        };

        let remaining_secs = self.timeout_minutes * 60 - (now - start).num_seconds();
        (remaining_secs / 60).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(n: i64) -> Duration {
        Duration::minutes(n)
    }

    #[test]
    fn test_unarmed_session_is_invalid() {
        let guard = SessionGuard::new(30);
        assert!(!guard.is_valid());
        assert_eq!(guard.remaining_minutes(), 0);
    }

    #[test]
    fn test_armed_session_is_valid_immediately() {
        let now = Utc::now();
        let mut guard = SessionGuard::new(30);
        guard.arm_at(now);

        assert!(guard.is_valid_at(now));
        assert_eq!(guard.remaining_minutes_at(now), 30);
    }

    #[test]
    fn test_absolute_timeout_dominates_activity() {
        let start = Utc::now();
        let mut guard = SessionGuard::new(30);
        guard.arm_at(start);

        // Keep touching every 10 minutes; the absolute cap still expires it.
        for step in 1..=3 {
            guard.touch_at(start + minutes(step * 10));
        }
        assert!(guard.is_valid_at(start + minutes(30)));
        assert!(!guard.is_valid_at(start + minutes(31)));
    }

    #[test]
    fn test_inactivity_timeout_expires_idle_session() {
        let start = Utc::now();
        let mut guard = SessionGuard::new(30);
        guard.arm_at(start);

        // Under the absolute cap but idle past half of it.
        assert!(guard.is_valid_at(start + minutes(15)));
        assert!(!guard.is_valid_at(start + minutes(16)));
    }

    #[test]
    fn test_odd_timeout_keeps_half_minute_of_idle_window() {
        let start = Utc::now();
        let mut guard = SessionGuard::new(45);
        guard.arm_at(start);

        // Half of 45 minutes is 22.5 minutes, not a truncated 22.
        assert!(guard.is_valid_at(start + Duration::seconds(22 * 60 + 30)));
        assert!(!guard.is_valid_at(start + Duration::seconds(22 * 60 + 31)));
    }

    #[test]
    fn test_touch_extends_idle_window() {
        let start = Utc::now();
        let mut guard = SessionGuard::new(30);
        guard.arm_at(start);
        guard.touch_at(start + minutes(14));

        assert!(guard.is_valid_at(start + minutes(29)));
    }

    #[test]
    fn test_clear_returns_to_unauthenticated() {
        let now = Utc::now();
        let mut guard = SessionGuard::new(30);
        guard.arm_at(now);
        guard.clear();

        assert!(!guard.is_valid_at(now));
        assert_eq!(guard.remaining_minutes_at(now), 0);
    }

    #[test]
    fn test_rearming_overwrites_expired_session() {
        let start = Utc::now();
        let mut guard = SessionGuard::new(30);
        guard.arm_at(start);
        let later = start + minutes(45);
        assert!(!guard.is_valid_at(later));

        guard.arm_at(later);
        assert!(guard.is_valid_at(later));
        assert_eq!(guard.remaining_minutes_at(later), 30);
    }

    #[test]
    fn test_remaining_minutes_counts_down_and_floors_at_zero() {
        let start = Utc::now();
        let mut guard = SessionGuard::new(30);
        guard.arm_at(start);

        assert_eq!(guard.remaining_minutes_at(start + minutes(12)), 18);
        // Partial minutes floor downwards.
        assert_eq!(guard.remaining_minutes_at(start + Duration::seconds(750)), 17);
        assert_eq!(guard.remaining_minutes_at(start + minutes(30)), 0);
        assert_eq!(guard.remaining_minutes_at(start + minutes(90)), 0);
    }
}
