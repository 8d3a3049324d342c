//! crates/cohort_core/src/schedule.rs
//!
//! Derives each slot's open/due window from the challenge's open date
//! and the slot's position, and keeps every persisted window in step
//! when a challenge is re-dated.

use std::sync::Arc;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::domain::{Challenge, ScheduleSlot};
use crate::error::{EngineError, EngineResult};
use crate::ports::{ChallengeRepository, LectureRepository, ScheduleSlotRepository};

/// Computes the open/due window for a slot at the given 1-based
/// sequence position.
///
/// `open_at` is midnight UTC of `open_date + (sequence - 1)` days and
/// `due_at` is exactly one day later.
pub fn slot_window(
    open_date: NaiveDate,
    sequence: i32,
) -> EngineResult<(DateTime<Utc>, DateTime<Utc>)> {
    if sequence < 1 {
        return Err(EngineError::Validation(format!(
            "sequence must be >= 1, got {sequence}"
        )));
    }
    let day = open_date
        .checked_add_days(Days::new((sequence - 1) as u64))
        .ok_or_else(|| {
            EngineError::Validation(format!("sequence {sequence} overflows the calendar"))
        })?;
    let open_at = day.and_time(NaiveTime::MIN).and_utc();
    let due_at = open_at + Duration::days(1);
    Ok((open_at, due_at))
}

fn check_dates(open_date: NaiveDate, close_date: NaiveDate) -> EngineResult<()> {
    if close_date <= open_date {
        return Err(EngineError::Validation(format!(
            "close_date {close_date} must be after open_date {open_date}"
        )));
    }
    Ok(())
}

//=========================================================================================
// ScheduleService
//=========================================================================================

/// Creates challenges, attaches lectures as schedule slots, and
/// bulk-recomputes slot windows when a challenge is re-dated.
#[derive(Clone)]
pub struct ScheduleService {
    challenges: Arc<dyn ChallengeRepository>,
    lectures: Arc<dyn LectureRepository>,
    slots: Arc<dyn ScheduleSlotRepository>,
}

impl ScheduleService {
    pub fn new(
        challenges: Arc<dyn ChallengeRepository>,
        lectures: Arc<dyn LectureRepository>,
        slots: Arc<dyn ScheduleSlotRepository>,
    ) -> Self {
        Self {
            challenges,
            lectures,
            slots,
        }
    }

    pub async fn create_challenge(
        &self,
        name: &str,
        open_date: NaiveDate,
        close_date: NaiveDate,
    ) -> EngineResult<Challenge> {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("challenge name is required".into()));
        }
        check_dates(open_date, close_date)?;
        let challenge = Challenge {
            id: Uuid::new_v4(),
            name: name.to_string(),
            open_date,
            close_date,
            lecture_count: 0,
        };
        Ok(self.challenges.insert(challenge).await?)
    }

    /// Attaches a lecture to a challenge at an explicitly assigned
    /// sequence position. Duplicate sequence values are allowed and
    /// produce distinct, independently-unlocking slots.
    pub async fn attach_lecture(
        &self,
        challenge_id: Uuid,
        lecture_id: Uuid,
        sequence: i32,
    ) -> EngineResult<ScheduleSlot> {
        let challenge = self
            .challenges
            .find(challenge_id)
            .await?
            .ok_or(EngineError::NotFound {
                kind: "challenge",
                id: challenge_id,
            })?;
        self.lectures
            .find(lecture_id)
            .await?
            .ok_or(EngineError::NotFound {
                kind: "lecture",
                id: lecture_id,
            })?;

        let (open_at, due_at) = slot_window(challenge.open_date, sequence)?;
        let slot = ScheduleSlot {
            id: Uuid::new_v4(),
            challenge_id,
            lecture_id,
            sequence,
            open_at,
            due_at,
        };
        Ok(self.slots.insert(slot).await?)
    }

    /// Re-dates a challenge and recomputes every existing slot window.
    ///
    /// The recompute is bulk but not transactional: a failure partway
    /// through surfaces as [`EngineError::PartialScheduleUpdate`] naming
    /// the slots already persisted, so the caller can retry the edit.
    pub async fn reschedule(
        &self,
        challenge_id: Uuid,
        open_date: NaiveDate,
        close_date: NaiveDate,
    ) -> EngineResult<Vec<ScheduleSlot>> {
        check_dates(open_date, close_date)?;
        self.challenges
            .find(challenge_id)
            .await?
            .ok_or(EngineError::NotFound {
                kind: "challenge",
                id: challenge_id,
            })?;
        self.challenges
            .update_dates(challenge_id, open_date, close_date)
            .await?;

        let slots = self.slots.list_for_challenge(challenge_id).await?;
        let total = slots.len();
        let mut updated = Vec::with_capacity(total);
        let mut recomputed = Vec::with_capacity(total);
        for mut slot in slots {
            let (open_at, due_at) = slot_window(open_date, slot.sequence)?;
            if let Err(source) = self.slots.update_window(slot.id, open_at, due_at).await {
                return Err(EngineError::PartialScheduleUpdate {
                    updated,
                    failed: slot.id,
                    total,
                    source,
                });
            }
            updated.push(slot.id);
            slot.open_at = open_at;
            slot.due_at = due_at;
            recomputed.push(slot);
        }
        Ok(recomputed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_offsets_follow_sequence() {
        let open = date(2024, 3, 1);
        for seq in 1..=30 {
            let (open_at, due_at) = slot_window(open, seq).unwrap();
            let expected = open
                .checked_add_days(Days::new((seq - 1) as u64))
                .unwrap()
                .and_time(NaiveTime::MIN)
                .and_utc();
            assert_eq!(open_at, expected);
            assert_eq!(due_at, open_at + Duration::days(1));
        }
    }

    #[test]
    fn three_lecture_challenge_opens_daily() {
        let open = date(2024, 3, 1);
        let days: Vec<_> = (1..=3)
            .map(|seq| slot_window(open, seq).unwrap().0.date_naive())
            .collect();
        assert_eq!(days, vec![date(2024, 3, 1), date(2024, 3, 2), date(2024, 3, 3)]);
    }

    #[test]
    fn zero_sequence_is_rejected() {
        assert!(matches!(
            slot_window(date(2024, 3, 1), 0),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn window_crosses_month_boundaries() {
        let (open_at, _) = slot_window(date(2024, 2, 28), 3).unwrap();
        assert_eq!(open_at.date_naive(), date(2024, 3, 1));
    }
}
