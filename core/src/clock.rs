//! Ledger clock: reference zone for calendar days, and the clocks that
//! drive the scheduler.
//!
//! RULE: Nothing in the accrual path reads the wall clock directly.
//! `now` is always passed in; only `SystemClock` touches `Utc::now()`.

use crate::{
    error::{LedgerError, LedgerResult},
    types::Timestamp,
};
use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use std::sync::Mutex;

/// The fixed UTC offset that defines where one calendar day ends and the
/// next begins. Daylight-saving rules never apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone {
    offset_minutes: i32,
}

impl ReferenceZone {
    pub fn utc() -> Self {
        Self { offset_minutes: 0 }
    }

    /// Offset east of UTC in minutes (IST is +330).
    pub fn from_offset_minutes(offset_minutes: i32) -> LedgerResult<Self> {
        if offset_minutes.abs() >= 24 * 60 {
            return Err(LedgerError::InvalidInput(format!(
                "utc offset {offset_minutes} minutes out of range"
            )));
        }
        Ok(Self { offset_minutes })
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset_minutes
    }

    fn fixed(&self) -> FixedOffset {
        // Range is validated at construction.
        FixedOffset::east_opt(self.offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Calendar date of `now` in this zone.
    pub fn local_date(&self, now: Timestamp) -> NaiveDate {
        now.with_timezone(&self.fixed()).date_naive()
    }

    /// The UTC instant at which `date` starts in this zone.
    pub fn start_of(&self, date: NaiveDate) -> Timestamp {
        self.at(date, NaiveTime::MIN)
    }

    /// Start of the calendar day that contains `now`.
    pub fn day_start(&self, now: Timestamp) -> Timestamp {
        self.start_of(self.local_date(now))
    }

    /// The UTC instant of local wall time `time` on `date`.
    pub fn at(&self, date: NaiveDate, time: NaiveTime) -> Timestamp {
        let local = date.and_time(time);
        Utc.from_utc_datetime(&(local - Duration::minutes(self.offset_minutes as i64)))
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        Self::utc()
    }
}

/// Source of "now" for long-running loops.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Reads the host wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by tests and replay tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, now: Timestamp) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }

    /// Move forward by `by`. Returns the new instant.
    pub fn advance(&self, by: Duration) -> Timestamp {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
        *guard
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn utc_day_start_truncates_to_midnight() {
        let zone = ReferenceZone::utc();
        assert_eq!(
            zone.day_start(ts("2026-03-14T17:45:12Z")),
            ts("2026-03-14T00:00:00Z")
        );
    }

    #[test]
    fn positive_offset_moves_day_boundary_earlier_in_utc() {
        // IST: local midnight is 18:30 UTC of the previous day.
        let zone = ReferenceZone::from_offset_minutes(330).unwrap();
        assert_eq!(
            zone.day_start(ts("2026-03-14T20:00:00Z")),
            ts("2026-03-14T18:30:00Z")
        );
        assert_eq!(
            zone.day_start(ts("2026-03-14T10:00:00Z")),
            ts("2026-03-13T18:30:00Z")
        );
    }

    #[test]
    fn negative_offset_day_start() {
        let zone = ReferenceZone::from_offset_minutes(-300).unwrap();
        assert_eq!(
            zone.day_start(ts("2026-03-14T03:00:00Z")),
            ts("2026-03-13T05:00:00Z")
        );
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        assert!(ReferenceZone::from_offset_minutes(24 * 60).is_err());
        assert!(ReferenceZone::from_offset_minutes(-24 * 60).is_err());
    }

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new(ts("2026-01-01T00:00:00Z"));
        assert_eq!(clock.now(), ts("2026-01-01T00:00:00Z"));
        let next = clock.advance(Duration::hours(25));
        assert_eq!(next, ts("2026-01-02T01:00:00Z"));
        assert_eq!(clock.now(), next);
    }
}
