use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::errors::{AppError, AppResult};

pub const DEFAULT_RATE_LIMIT_ATTEMPTS: usize = 3;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Process-wide sliding-window attempt accounting, keyed by identity.
///
/// The prune + check + append step for one identity runs while holding the
/// map's shard entry, so two concurrent requests for the same identity can
/// never both observe the last free slot. Entries older than the window
/// are dropped lazily on each check; nothing is persisted.
#[derive(Debug)]
pub struct AttemptLedger {
    attempts: DashMap<String, Vec<Instant>>,
    limit: usize,
    window: Duration,
}

impl AttemptLedger {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            attempts: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Atomically records the attempt if the identity is under the limit.
    /// An admitted attempt is appended so the window keeps sliding; a
    /// rejected attempt is NOT appended, so a blocked client recovers as
    /// soon as its oldest admitted attempt leaves the window.
    pub fn check_and_record(&self, identity: &str) -> AppResult<()> {
        self.check_and_record_at(identity, Instant::now())
    }

    pub fn check_and_record_at(&self, identity: &str, now: Instant) -> AppResult<()> {
        let mut entry = self.attempts.entry(identity.to_string()).or_default();
        entry.retain(|stamp| now.duration_since(*stamp) < self.window);

        if entry.len() >= self.limit {
            return Err(AppError::RateLimitExceeded {
                limit: self.limit,
                window: self.window,
            });
        }

        entry.push(now);
        Ok(())
    }

    #[cfg(test)]
    fn recorded(&self, identity: &str) -> usize {
        self.attempts
            .get(identity)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}

impl Default for AttemptLedger {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_ATTEMPTS, DEFAULT_RATE_LIMIT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let ledger = AttemptLedger::new(3, Duration::from_secs(60));
        let base = Instant::now();

        ledger.check_and_record_at("stu-1", base).unwrap();
        ledger
            .check_and_record_at("stu-1", base + Duration::from_secs(1))
            .unwrap();
        ledger
            .check_and_record_at("stu-1", base + Duration::from_secs(2))
            .unwrap();

        let err = ledger
            .check_and_record_at("stu-1", base + Duration::from_secs(3))
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimitExceeded { limit: 3, .. }));
    }

    #[test]
    fn rejected_attempts_are_not_recorded() {
        let ledger = AttemptLedger::new(2, Duration::from_secs(60));
        let base = Instant::now();

        ledger.check_and_record_at("stu-1", base).unwrap();
        ledger.check_and_record_at("stu-1", base).unwrap();
        for _ in 0..5 {
            let _ = ledger.check_and_record_at("stu-1", base + Duration::from_secs(1));
        }
        assert_eq!(ledger.recorded("stu-1"), 2);
    }

    #[test]
    fn window_expiry_frees_a_slot() {
        let ledger = AttemptLedger::new(3, Duration::from_secs(60));
        let base = Instant::now();

        for offset in 0..3 {
            ledger
                .check_and_record_at("stu-1", base + Duration::from_secs(offset))
                .unwrap();
        }
        ledger
            .check_and_record_at("stu-1", base + Duration::from_secs(30))
            .unwrap_err();

        // First attempt has left the trailing window by now.
        ledger
            .check_and_record_at("stu-1", base + Duration::from_secs(61))
            .unwrap();
    }

    #[test]
    fn identities_are_accounted_independently() {
        let ledger = AttemptLedger::new(1, Duration::from_secs(60));
        let base = Instant::now();

        ledger.check_and_record_at("stu-1", base).unwrap();
        ledger.check_and_record_at("stu-2", base).unwrap();
        ledger.check_and_record_at("stu-1", base).unwrap_err();
    }

    #[test]
    fn concurrent_checks_cannot_both_take_the_last_slot() {
        let ledger = Arc::new(AttemptLedger::new(1, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || {
                ledger.check_and_record("stu-race").is_ok()
            }));
        }

        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
