//! Version-timestamp gate for one-off operations.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Window after the target version timestamp in which a one-off operation
/// may still run.
pub const MAX_VERSION_TIMESTAMP_AGE: Duration = Duration::from_secs(30 * 60);

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Decides whether a one-off operation tagged with a target version may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationGate {
    max_age_ms: u64,
}

impl MigrationGate {
    /// Gate with a custom staleness window.
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age_ms: max_age.as_millis() as u64,
        }
    }

    /// Staleness window of this gate.
    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }

    /// Whether a migration targeting `target_ms` may run at `now_ms`.
    ///
    /// Denied when no target is set (`target_ms <= 0`), when the persisted
    /// version already reached the target, or when `now_ms` is at least
    /// `max_age` away from the target in either direction.
    pub fn can_apply(&self, persisted_ms: Option<i64>, target_ms: i64, now_ms: i64) -> bool {
        if target_ms <= 0 {
            return false;
        }
        if persisted_ms.is_some_and(|persisted| persisted >= target_ms) {
            tracing::debug!(?persisted_ms, target_ms, "One-off target already applied");
            return false;
        }
        let distance = now_ms.abs_diff(target_ms);
        if distance >= self.max_age_ms {
            tracing::warn!(
                target_ms,
                now_ms,
                max_age_ms = self.max_age_ms,
                "One-off target is stale, skipping"
            );
            return false;
        }
        true
    }

    /// [`can_apply`](Self::can_apply) against the system clock.
    pub fn can_apply_now(&self, persisted_ms: Option<i64>, target_ms: i64) -> bool {
        self.can_apply(persisted_ms, target_ms, now_ms())
    }
}

impl Default for MigrationGate {
    fn default() -> Self {
        Self::new(MAX_VERSION_TIMESTAMP_AGE)
    }
}
