//! Forced master promotion after repeated join attempts

use std::sync::atomic::{AtomicU32, Ordering};

/// Join attempt at which a node stops waiting and takes the master role
pub const MASTER_PROMOTION_THRESHOLD: u32 = 5;

/// Counts join attempts of one coordinator
///
/// The counter only ever grows. Promotion fires on exactly the threshold
/// attempt, so it happens at most once per coordinator.
#[derive(Debug, Default)]
pub struct MasterPromotionPolicy {
    attempts: AtomicU32,
}

impl MasterPromotionPolicy {
    /// Create a policy with no recorded attempts
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt and return its number, starting at 1
    pub fn record_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Whether attempt number `attempt` must promote the node
    pub fn should_promote(&self, attempt: u32) -> bool {
        attempt == MASTER_PROMOTION_THRESHOLD
    }
}
