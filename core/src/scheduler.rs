//! Daily scheduler. Fires registered jobs once per calendar day.
//!
//! RULES:
//!   - No process-global registration. A `Scheduler` is a value; whoever
//!     owns it decides when to poll it.
//!   - `poll(now)` is a pure step: same `now`, same state → same decision.
//!   - A day counts as fired only for this scheduler instance. A restart
//!     fires again; jobs must be idempotent per day (the accrual job is).
//!   - One failing job is logged and reported; the others still run.

use crate::{
    accrual::AccrualJob,
    clock::{Clock, ReferenceZone},
    error::LedgerResult,
    types::Timestamp,
};
use chrono::{Days, NaiveDate, NaiveTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// The contract every scheduled job fulfils.
pub trait ScheduledJob: Send {
    /// Unique stable name for logs.
    fn name(&self) -> &'static str;

    /// Do one day's work as of `now`.
    fn run(&mut self, now: Timestamp) -> LedgerResult<JobOutcome>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub processed: u32,
    pub summary:   String,
}

/// What happened to one job during one firing.
#[derive(Debug)]
pub struct JobRun {
    pub job:    &'static str,
    pub result: LedgerResult<JobOutcome>,
}

impl ScheduledJob for AccrualJob {
    fn name(&self) -> &'static str {
        "daily_accrual"
    }

    fn run(&mut self, now: Timestamp) -> LedgerResult<JobOutcome> {
        let report = AccrualJob::run(self, now)?;
        Ok(JobOutcome {
            processed: report.credited,
            summary: format!(
                "credited {} of {} (matured {}, failed {}, missing wallet {})",
                report.credited,
                report.candidates,
                report.matured,
                report.failed,
                report.missing_wallet
            ),
        })
    }
}

/// Local wall time, once a day, in a fixed reference zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    zone: ReferenceZone,
    at:   NaiveTime,
}

impl DailyTrigger {
    pub fn new(zone: ReferenceZone, at: NaiveTime) -> Self {
        Self { zone, at }
    }

    /// Local midnight.
    pub fn midnight(zone: ReferenceZone) -> Self {
        Self::new(zone, NaiveTime::MIN)
    }

    pub fn zone(&self) -> ReferenceZone {
        self.zone
    }

    pub fn fire_instant(&self, date: NaiveDate) -> Timestamp {
        self.zone.at(date, self.at)
    }

    /// The local date whose firing is due at `now`, if today's has passed.
    pub fn due_date(&self, now: Timestamp) -> Option<NaiveDate> {
        let today = self.zone.local_date(now);
        (now >= self.fire_instant(today)).then_some(today)
    }

    /// First firing strictly after `now`.
    pub fn next_fire_after(&self, now: Timestamp) -> Timestamp {
        let today = self.zone.local_date(now);
        let candidate = self.fire_instant(today);
        if candidate > now {
            return candidate;
        }
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        self.fire_instant(tomorrow)
    }
}

pub struct Scheduler {
    trigger:    DailyTrigger,
    jobs:       Vec<Box<dyn ScheduledJob>>,
    last_fired: Option<NaiveDate>,
}

impl Scheduler {
    pub fn new(trigger: DailyTrigger) -> Self {
        Self {
            trigger,
            jobs: Vec::new(),
            last_fired: None,
        }
    }

    /// Jobs run in registration order.
    pub fn register(&mut self, job: Box<dyn ScheduledJob>) {
        self.jobs.push(job);
    }

    pub fn trigger(&self) -> DailyTrigger {
        self.trigger
    }

    pub fn last_fired(&self) -> Option<NaiveDate> {
        self.last_fired
    }

    /// Fire every job if today's trigger has passed and has not fired yet.
    /// Returns an empty vec when nothing was due.
    pub fn poll(&mut self, now: Timestamp) -> Vec<JobRun> {
        let Some(date) = self.trigger.due_date(now) else {
            return Vec::new();
        };
        if self.last_fired == Some(date) {
            return Vec::new();
        }
        log::info!("scheduler: firing {} job(s) for {date}", self.jobs.len());
        self.last_fired = Some(date);
        self.run_all(now)
    }

    /// Fire every job immediately, regardless of the trigger.
    /// Used for the on-demand administrative run.
    pub fn run_now(&mut self, now: Timestamp) -> Vec<JobRun> {
        self.run_all(now)
    }

    fn run_all(&mut self, now: Timestamp) -> Vec<JobRun> {
        self.jobs
            .iter_mut()
            .map(|job| {
                let result = job.run(now);
                match &result {
                    Ok(outcome) => log::info!("job {}: {}", job.name(), outcome.summary),
                    Err(e) => log::error!("job {} failed: {e}", job.name()),
                }
                JobRun { job: job.name(), result }
            })
            .collect()
    }

    /// Blocking loop. Wakes at most every `poll_interval` (and exactly at the
    /// next firing if that comes sooner) until `stop` is set.
    pub fn run_until(&mut self, clock: &dyn Clock, stop: &AtomicBool, poll_interval: Duration) {
        log::info!(
            "scheduler: started, next firing at {}",
            self.trigger.next_fire_after(clock.now())
        );
        while !stop.load(Ordering::SeqCst) {
            let now = clock.now();
            self.poll(now);

            let until_next = (self.trigger.next_fire_after(now) - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            std::thread::sleep(until_next.min(poll_interval).max(Duration::from_millis(10)));
        }
        log::info!("scheduler: stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use std::sync::{atomic::AtomicU32, Arc};

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    struct CountingJob {
        runs: Arc<AtomicU32>,
        fail: bool,
    }

    impl ScheduledJob for CountingJob {
        fn name(&self) -> &'static str {
            if self.fail { "failing" } else { "counting" }
        }

        fn run(&mut self, _now: Timestamp) -> LedgerResult<JobOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LedgerError::InvalidInput("boom".into()));
            }
            Ok(JobOutcome { processed: 1, summary: "ok".into() })
        }
    }

    fn counting(fail: bool) -> (Box<dyn ScheduledJob>, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        (Box::new(CountingJob { runs: runs.clone(), fail }), runs)
    }

    #[test]
    fn next_fire_rolls_to_tomorrow_once_passed() {
        let trigger = DailyTrigger::new(
            ReferenceZone::utc(),
            NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
        );
        assert_eq!(
            trigger.next_fire_after(ts("2026-05-01T01:00:00Z")),
            ts("2026-05-01T02:30:00Z")
        );
        assert_eq!(
            trigger.next_fire_after(ts("2026-05-01T02:30:00Z")),
            ts("2026-05-02T02:30:00Z")
        );
    }

    #[test]
    fn trigger_respects_reference_zone() {
        let ist = ReferenceZone::from_offset_minutes(330).unwrap();
        let trigger = DailyTrigger::midnight(ist);
        // 18:30 UTC is local midnight in IST.
        let due = |s: &str| trigger.due_date(ts(s)).map(|d| d.to_string());
        assert_eq!(due("2026-05-01T18:29:59Z"), Some("2026-05-01".into()));
        assert_eq!(due("2026-05-01T18:30:00Z"), Some("2026-05-02".into()));
    }

    #[test]
    fn poll_fires_once_per_local_day() {
        let trigger = DailyTrigger::new(
            ReferenceZone::utc(),
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        );
        let mut scheduler = Scheduler::new(trigger);
        let (job, runs) = counting(false);
        scheduler.register(job);

        assert!(scheduler.poll(ts("2026-05-01T05:59:00Z")).is_empty());
        assert_eq!(scheduler.poll(ts("2026-05-01T06:00:00Z")).len(), 1);
        assert!(scheduler.poll(ts("2026-05-01T06:01:00Z")).is_empty());
        assert!(scheduler.poll(ts("2026-05-01T23:59:00Z")).is_empty());
        assert!(scheduler.poll(ts("2026-05-02T05:00:00Z")).is_empty());
        assert_eq!(scheduler.poll(ts("2026-05-02T06:00:01Z")).len(), 1);

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_job_does_not_block_later_jobs() {
        let mut scheduler = Scheduler::new(DailyTrigger::midnight(ReferenceZone::utc()));
        let (bad, bad_runs) = counting(true);
        let (good, good_runs) = counting(false);
        scheduler.register(bad);
        scheduler.register(good);

        let runs = scheduler.run_now(ts("2026-05-01T12:00:00Z"));
        assert_eq!(runs.len(), 2);
        assert!(runs[0].result.is_err());
        assert!(runs[1].result.is_ok());
        assert_eq!(bad_runs.load(Ordering::SeqCst), 1);
        assert_eq!(good_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_until_returns_when_stop_is_set() {
        let mut scheduler = Scheduler::new(DailyTrigger::midnight(ReferenceZone::utc()));
        let (job, runs) = counting(false);
        scheduler.register(job);
        let clock = crate::clock::ManualClock::new(ts("2026-05-01T12:00:00Z"));
        let stop = AtomicBool::new(true);

        scheduler.run_until(&clock, &stop, Duration::from_millis(1));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
