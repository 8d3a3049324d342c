//! crates/cohort_core/src/access.rs
//!
//! The unlock-time and deadline predicates. Unlocking is never an
//! active event: both predicates are pure functions of `now()` and are
//! evaluated lazily on each read, against the authoritative clock only.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::ScheduleSlot;
use crate::error::{EngineError, EngineResult};
use crate::ports::{ClockSource, PortError};

/// True once the slot has unlocked. Monotonic in `now`: reads stay
/// allowed forever after `open_at`.
pub fn is_open(slot: &ScheduleSlot, now: DateTime<Utc>) -> bool {
    now >= slot.open_at
}

/// True while writes are still accepted for the slot.
pub fn is_within_deadline(slot: &ScheduleSlot, now: DateTime<Utc>) -> bool {
    now <= slot.due_at
}

//=========================================================================================
// AccessGate
//=========================================================================================

/// Evaluates the access predicates against the authoritative clock.
#[derive(Clone)]
pub struct AccessGate {
    clock: Arc<dyn ClockSource>,
}

impl AccessGate {
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        Self { clock }
    }

    /// Fetches the authoritative time. A clock failure is fatal for any
    /// deadline-gated operation; there is no local-time fallback.
    pub async fn now(&self) -> EngineResult<DateTime<Utc>> {
        self.clock.now().await.map_err(|e| match e {
            PortError::Unavailable(msg) => EngineError::ClockUnavailable(msg),
            other => EngineError::ClockUnavailable(other.to_string()),
        })
    }

    pub async fn is_open(&self, slot: &ScheduleSlot) -> EngineResult<bool> {
        Ok(is_open(slot, self.now().await?))
    }

    /// Returns the authoritative time if the slot still accepts writes,
    /// otherwise fails with [`EngineError::DeadlineExceeded`].
    pub async fn ensure_within_deadline(
        &self,
        slot: &ScheduleSlot,
    ) -> EngineResult<DateTime<Utc>> {
        let now = self.now().await?;
        if !is_within_deadline(slot, now) {
            return Err(EngineError::DeadlineExceeded {
                slot_id: slot.id,
                due_at: slot.due_at,
            });
        }
        Ok(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn slot() -> ScheduleSlot {
        let open_at = "2024-03-01T00:00:00Z".parse().unwrap();
        ScheduleSlot {
            id: Uuid::new_v4(),
            challenge_id: Uuid::new_v4(),
            lecture_id: Uuid::new_v4(),
            sequence: 1,
            open_at,
            due_at: open_at + Duration::days(1),
        }
    }

    #[test]
    fn open_is_monotonic() {
        let s = slot();
        let mut t = s.open_at - Duration::hours(1);
        assert!(!is_open(&s, t));
        // Once open, every later instant stays open.
        t = s.open_at;
        for _ in 0..48 {
            assert!(is_open(&s, t));
            t = t + Duration::hours(6);
        }
    }

    #[test]
    fn deadline_is_inclusive() {
        let s = slot();
        assert!(is_within_deadline(&s, s.due_at));
        assert!(is_within_deadline(&s, s.due_at - Duration::minutes(1)));
        assert!(!is_within_deadline(&s, s.due_at + Duration::minutes(1)));
    }
}
