//! One-shot deadline timer for the cooperative main loop.
//!
//! There is no timer service underneath: the owner polls `fire` with the
//! current time. A timer fires at most once per `arm`.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OneShotTimer {
    deadline_ms: Option<u64>,
}

impl OneShotTimer {
    pub const fn new() -> Self {
        Self { deadline_ms: None }
    }

    /// Arm (or re-arm) the timer `duration_ms` after `now_ms`.
    pub fn arm(&mut self, now_ms: u64, duration_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(duration_ms));
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.deadline_ms.map(|d| d.saturating_sub(now_ms))
    }

    /// Returns true exactly once when the deadline has passed, then disarms.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}
