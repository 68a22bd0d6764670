use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use uuid::Uuid;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Seconds of allowance consumed given the remaining value at finish.
///
/// Overtime (negative remaining) yields a result above the allowance; a
/// remaining larger than the allowance clamps to zero.
pub fn time_used_secs(allowed_secs: i64, remaining_secs: i64) -> i64 {
    (allowed_secs - remaining_secs).max(0)
}

/// Violation of the running/start-stamp coupling on a timer record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerStateError {
    /// A record claims to be running but carries no start timestamp.
    #[error("timer for {occupant_id} is running without a start timestamp")]
    RunningWithoutStart {
        /// Occupant whose record is inconsistent.
        occupant_id: Uuid,
    },
    /// A paused record still carries a start timestamp.
    #[error("timer for {occupant_id} is paused but keeps a start timestamp")]
    PausedWithStart {
        /// Occupant whose record is inconsistent.
        occupant_id: Uuid,
    },
}

/// Countdown state for one occupied slot.
///
/// The record never ticks: a running timer is the pair (base, start stamp)
/// and the displayed value is recomputed from the wall clock on demand, so
/// any number of independent viewers converge on the same count without the
/// writer pushing per-second updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerRecord {
    /// Student occupying the slot this countdown belongs to.
    pub occupant_id: Uuid,
    /// Whether the countdown is currently consuming wall-clock time.
    pub is_running: bool,
    /// Wall-clock instant (Unix ms) the current running stretch began.
    /// Set exactly when `is_running` is true.
    pub started_at_ms: Option<u64>,
    /// Seconds remaining at `started_at_ms` (running) or the frozen
    /// remaining value (paused). Negative once the session runs overtime.
    pub base_remaining_secs: i64,
    /// Stamp of the last accepted mutation, used for last-writer-wins.
    pub updated_at_ms: u64,
}

impl TimerRecord {
    /// Build the paused, full-allowance record created when a session starts.
    pub fn fresh(occupant_id: Uuid, allowed_secs: i64, now_ms: u64) -> Self {
        Self {
            occupant_id,
            is_running: false,
            started_at_ms: None,
            base_remaining_secs: allowed_secs,
            updated_at_ms: now_ms,
        }
    }

    /// Seconds remaining at the given wall-clock instant.
    ///
    /// Running records subtract the whole seconds elapsed since the start
    /// stamp; paused records return the base untouched. The result is not
    /// clamped at zero, so overtime shows as a negative count. A clock
    /// sitting before the start stamp contributes zero elapsed time.
    pub fn remaining_at(&self, now_ms: u64) -> i64 {
        match self.started_at_ms {
            Some(started_at_ms) if self.is_running => {
                let elapsed_secs = (now_ms.saturating_sub(started_at_ms) / 1000) as i64;
                self.base_remaining_secs - elapsed_secs
            }
            _ => self.base_remaining_secs,
        }
    }

    /// Freeze the countdown: the live remaining value becomes the new base
    /// and the start stamp is cleared.
    pub fn paused(&self, now_ms: u64) -> Self {
        Self {
            occupant_id: self.occupant_id,
            is_running: false,
            started_at_ms: None,
            base_remaining_secs: self.remaining_at(now_ms),
            updated_at_ms: now_ms,
        }
    }

    /// Start consuming wall-clock time again from the current base.
    pub fn resumed(&self, now_ms: u64) -> Self {
        Self {
            occupant_id: self.occupant_id,
            is_running: true,
            started_at_ms: Some(now_ms),
            base_remaining_secs: self.base_remaining_secs,
            updated_at_ms: now_ms,
        }
    }

    /// Flip between running and paused at the given instant.
    pub fn toggled(&self, now_ms: u64) -> Self {
        if self.is_running {
            self.paused(now_ms)
        } else {
            self.resumed(now_ms)
        }
    }

    /// Check the running/start-stamp coupling.
    pub fn validate(&self) -> Result<(), TimerStateError> {
        match (self.is_running, self.started_at_ms) {
            (true, None) => Err(TimerStateError::RunningWithoutStart {
                occupant_id: self.occupant_id,
            }),
            (false, Some(_)) => Err(TimerStateError::PausedWithStart {
                occupant_id: self.occupant_id,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    fn running(base_secs: i64) -> TimerRecord {
        TimerRecord {
            occupant_id: Uuid::new_v4(),
            is_running: true,
            started_at_ms: Some(T0),
            base_remaining_secs: base_secs,
            updated_at_ms: T0,
        }
    }

    #[test]
    fn recovery_subtracts_whole_elapsed_seconds() {
        let record = running(3600);
        assert_eq!(record.remaining_at(T0 + 90_000), 3510);
        assert_eq!(record.remaining_at(T0 + 90_999), 3510);
        assert_eq!(record.remaining_at(T0 + 91_000), 3509);
    }

    #[test]
    fn recovery_is_idempotent_at_a_fixed_instant() {
        let record = running(3600);
        let first = record.remaining_at(T0 + 42_000);
        let second = record.remaining_at(T0 + 42_000);
        assert_eq!(first, second);
    }

    #[test]
    fn recovery_never_increases_as_the_clock_advances() {
        let record = running(120);
        let mut previous = record.remaining_at(T0);
        for step in 1..=200u64 {
            let current = record.remaining_at(T0 + step * 997);
            assert!(current <= previous, "remaining increased at step {step}");
            previous = current;
        }
    }

    #[test]
    fn paused_record_ignores_the_wall_clock() {
        let record = TimerRecord::fresh(Uuid::new_v4(), 3600, T0);
        assert_eq!(record.remaining_at(T0), 3600);
        assert_eq!(record.remaining_at(T0 + 3_600_000), 3600);
    }

    #[test]
    fn overtime_goes_negative_without_clamping() {
        let record = running(60);
        assert_eq!(record.remaining_at(T0 + 90_000), -30);
    }

    #[test]
    fn clock_before_the_start_stamp_contributes_no_elapsed_time() {
        let record = running(3600);
        assert_eq!(record.remaining_at(T0 - 5_000), 3600);
    }

    #[test]
    fn pause_freezes_the_live_remaining_value() {
        let paused = running(3600).paused(T0 + 90_000);
        assert!(!paused.is_running);
        assert_eq!(paused.started_at_ms, None);
        assert_eq!(paused.base_remaining_secs, 3510);
        assert_eq!(paused.updated_at_ms, T0 + 90_000);
    }

    #[test]
    fn toggle_round_trip_preserves_remaining_at_the_same_instant() {
        let record = running(3600);
        let paused = record.toggled(T0 + 90_000);
        let resumed = paused.toggled(T0 + 90_000);
        assert!(resumed.is_running);
        assert_eq!(resumed.started_at_ms, Some(T0 + 90_000));
        assert_eq!(resumed.remaining_at(T0 + 90_000), 3510);
    }

    #[test]
    fn fresh_record_is_paused_at_full_allowance() {
        let record = TimerRecord::fresh(Uuid::new_v4(), 3600, T0);
        assert!(!record.is_running);
        assert_eq!(record.started_at_ms, None);
        assert_eq!(record.base_remaining_secs, 3600);
        record.validate().unwrap();
    }

    #[test]
    fn validate_rejects_decoupled_running_flag() {
        let mut record = TimerRecord::fresh(Uuid::new_v4(), 3600, T0);
        record.is_running = true;
        assert!(matches!(
            record.validate(),
            Err(TimerStateError::RunningWithoutStart { .. })
        ));

        let mut record = running(3600);
        record.is_running = false;
        assert!(matches!(
            record.validate(),
            Err(TimerStateError::PausedWithStart { .. })
        ));
    }

    #[test]
    fn time_used_counts_overtime_beyond_the_allowance() {
        assert_eq!(time_used_secs(3600, 3510), 90);
        assert_eq!(time_used_secs(3600, -30), 3630);
        assert_eq!(time_used_secs(3600, 3700), 0);
    }
}
