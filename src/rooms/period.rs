//! Period arithmetic for a room's saving schedule.

use crate::api::types::Room;

/// Where a room is in its schedule at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodStatus {
    /// Start time unknown.
    Unscheduled,
    /// Before period 0.
    NotStarted { starts_in_ms: u64 },
    /// Inside period `index` (0-based).
    Running { index: u32, remaining_ms: u64 },
    /// All periods elapsed.
    Finished,
}

/// Schedule position of `room` at `now_ms`.
pub fn period_status(room: &Room, now_ms: u64) -> PeriodStatus {
    let Some(start) = room.start_time_ms else {
        return PeriodStatus::Unscheduled;
    };
    if room.period_length_ms == 0 || room.total_periods == 0 {
        return PeriodStatus::Unscheduled;
    }
    if now_ms < start {
        return PeriodStatus::NotStarted {
            starts_in_ms: start - now_ms,
        };
    }

    let elapsed = now_ms - start;
    let index = elapsed / room.period_length_ms;
    if index >= room.total_periods as u64 {
        return PeriodStatus::Finished;
    }
    PeriodStatus::Running {
        index: index as u32,
        remaining_ms: room.period_length_ms - elapsed % room.period_length_ms,
    }
}

/// 0-based current period, if one is running.
pub fn current_period(room: &Room, now_ms: u64) -> Option<u32> {
    match period_status(room, now_ms) {
        PeriodStatus::Running { index, .. } => Some(index),
        _ => None,
    }
}

/// Milliseconds until the current period closes.
pub fn time_remaining_ms(room: &Room, now_ms: u64) -> Option<u64> {
    match period_status(room, now_ms) {
        PeriodStatus::Running { remaining_ms, .. } => Some(remaining_ms),
        _ => None,
    }
}

/// Number of periods that have opened so far (including the running one).
pub fn periods_opened(room: &Room, now_ms: u64) -> u32 {
    match period_status(room, now_ms) {
        PeriodStatus::Running { index, .. } => index + 1,
        PeriodStatus::Finished => room.total_periods,
        PeriodStatus::Unscheduled | PeriodStatus::NotStarted { .. } => 0,
    }
}

/// Fraction of opened periods the participant deposited in, in `[0, 1]`.
///
/// Rewards are split by this score; nobody is penalized before a period opens.
pub fn consistency_score(deposits_made: u32, periods_opened: u32) -> f64 {
    if periods_opened == 0 {
        return 1.0;
    }
    (deposits_made.min(periods_opened) as f64) / periods_opened as f64
}

/// Whether the room accepts claims at `now_ms`.
pub fn is_claimable(room: &Room, now_ms: u64) -> bool {
    matches!(period_status(room, now_ms), PeriodStatus::Finished)
        || room.status == crate::api::types::RoomStatus::Ended
}
