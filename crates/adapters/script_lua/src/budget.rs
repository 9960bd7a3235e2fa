//! Wall-clock budget shared by everything that can end a run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::TIMEOUT_MESSAGE;

/// Deadline of one run plus a sticky "expired" flag.
///
/// Once any check trips the flag, every later check fails too, so a script
/// cannot resume normal work by catching the timeout error.
#[derive(Debug, Clone)]
pub(crate) struct Budget {
    deadline: Instant,
    expired: Arc<AtomicBool>,
}

impl Budget {
    pub(crate) fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            expired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub(crate) fn expire(&self) {
        self.expired.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Relaxed) || Instant::now() >= self.deadline
    }

    /// Fail with the timeout error once the budget is spent.
    pub(crate) fn check(&self) -> mlua::Result<()> {
        if self.is_expired() {
            self.expire();
            return Err(timeout());
        }
        Ok(())
    }
}

pub(crate) fn timeout() -> mlua::Error {
    mlua::Error::runtime(TIMEOUT_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_pass_check_when_deadline_ahead() {
        let budget = Budget::new(Instant::now() + Duration::from_secs(60));

        assert!(budget.check().is_ok());
        assert!(!budget.is_expired());
    }

    #[test]
    fn should_stay_expired_when_flag_tripped_early() {
        let budget = Budget::new(Instant::now() + Duration::from_secs(60));
        let shared = budget.clone();

        shared.expire();

        assert!(budget.is_expired());
        assert!(budget.check().is_err());
    }

    #[test]
    fn should_fail_check_when_deadline_passed() {
        let budget = Budget::new(Instant::now());

        assert!(budget.check().is_err());
        assert!(budget.is_expired());
    }
}
