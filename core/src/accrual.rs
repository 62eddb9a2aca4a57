//! Daily ROI accrual. Credits every active investment's payout once per
//! calendar day.
//!
//! ORDER OF WORK PER INVESTMENT (fixed):
//!   1. Skip if last credit falls on/after today's start (cheap pre-check).
//!   2. Retire without credit if no days are left.
//!   3. In ONE immediate transaction:
//!        wallet lookup → claim the day (compare-and-swap) →
//!        credit wallet → append roi_payout txn → append events.
//!
//! RULES:
//!   - `now` is an input. Nothing here reads the wall clock.
//!   - The claim in step 3 is the only double-credit guard that counts;
//!     the pre-check in step 1 just avoids opening a transaction.
//!   - A failure on one investment rolls back that investment alone.
//!   - Failing to enumerate active investments fails the whole run.

use crate::{
    clock::ReferenceZone,
    error::{LedgerError, LedgerResult},
    event::{EventLogEntry, LedgerEvent, SkipReason},
    store::{AccrualRunRow, InvestmentRow, LedgerStore},
    types::{Amount, RunId, Timestamp, TxnKind, TxnStatus},
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use uuid::Uuid;

const EVENT_SOURCE: &str = "accrual";

/// Counts from one invocation. `credited` is the headline number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccrualReport {
    pub run_id:           RunId,
    pub day_start:        Timestamp,
    pub candidates:       u32,
    pub credited:         u32,
    pub already_credited: u32,
    pub missing_wallet:   u32,
    pub failed:           u32,
    pub matured:          u32,
    pub retired:          u32,
    pub total_paid:       Amount,
    pub cancelled:        bool,
}

impl AccrualReport {
    fn new(run_id: RunId, day_start: Timestamp, candidates: usize) -> Self {
        Self {
            run_id,
            day_start,
            candidates: candidates as u32,
            credited: 0,
            already_credited: 0,
            missing_wallet: 0,
            failed: 0,
            matured: 0,
            retired: 0,
            total_paid: 0.0,
            cancelled: false,
        }
    }

    fn to_row(&self, started_at: Timestamp, finished_at: Timestamp) -> AccrualRunRow {
        AccrualRunRow {
            run_id: self.run_id.clone(),
            started_at,
            day_start: self.day_start,
            candidates: self.candidates,
            credited: self.credited,
            already_credited: self.already_credited,
            missing_wallet: self.missing_wallet,
            failed: self.failed,
            matured: self.matured,
            retired: self.retired,
            total_paid: self.total_paid,
            cancelled: self.cancelled,
            finished_at: Some(finished_at),
            error: None,
        }
    }
}

/// Stops a run from starting further investments.
/// An investment already inside its transaction always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    Credited { amount: Amount, matured: bool },
    Skipped(SkipReason),
}

/// The accrual job bound to its own store connection.
pub struct AccrualJob {
    store:  LedgerStore,
    zone:   ReferenceZone,
    cancel: CancelToken,
}

impl AccrualJob {
    pub fn new(store: LedgerStore, zone: ReferenceZone) -> Self {
        Self {
            store,
            zone,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn zone(&self) -> ReferenceZone {
        self.zone
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn run(&self, now: Timestamp) -> LedgerResult<AccrualReport> {
        run_daily_accrual(&self.store, self.zone, now, &self.cancel)
    }
}

/// Bring every active investment up to date for the calendar day of `now`.
pub fn run_daily_accrual(
    store: &LedgerStore,
    zone: ReferenceZone,
    now: Timestamp,
    cancel: &CancelToken,
) -> LedgerResult<AccrualReport> {
    accrue(store, zone, now, cancel, |_| {})
}

/// `after_each` sees every investment once its own work has finished.
fn accrue(
    store: &LedgerStore,
    zone: ReferenceZone,
    now: Timestamp,
    cancel: &CancelToken,
    mut after_each: impl FnMut(&InvestmentRow),
) -> LedgerResult<AccrualReport> {
    let day_start = zone.day_start(now);
    let run_id: RunId = Uuid::new_v4().to_string();

    let investments = match store.active_investments() {
        Ok(list) => list,
        Err(e) => {
            log::error!("accrual run {run_id}: cannot load active investments: {e}");
            record_fatal(store, &run_id, now, day_start, &e);
            return Err(e);
        }
    };

    store.insert_accrual_run(&run_id, now, day_start)?;
    let mut report = AccrualReport::new(run_id.clone(), day_start, investments.len());
    log::info!(
        "accrual run {run_id} started: {} active investments, day starts {day_start}",
        investments.len()
    );
    record(store, now, &LedgerEvent::AccrualRunStarted {
        run_id: run_id.clone(),
        day_start,
        candidates: investments.len(),
    });

    for inv in &investments {
        if cancel.is_cancelled() {
            log::warn!("accrual run {run_id} cancelled; stopping before {}", inv.investment_id);
            report.cancelled = true;
            break;
        }

        match process_investment(store, &run_id, inv, day_start, now) {
            Ok(Outcome::Credited { amount, matured }) => {
                report.credited += 1;
                report.total_paid += amount;
                if matured {
                    report.matured += 1;
                }
            }
            // Routine on repeat runs; only anomalies reach the event log.
            Ok(Outcome::Skipped(SkipReason::AlreadyCredited)) => report.already_credited += 1,
            Ok(Outcome::Skipped(reason)) => {
                if reason == SkipReason::MissingWallet {
                    report.missing_wallet += 1;
                } else {
                    report.retired += 1;
                }
                record(store, now, &LedgerEvent::InvestmentSkipped {
                    run_id: run_id.clone(),
                    investment_id: inv.investment_id.clone(),
                    reason,
                });
            }
            Err(e) => {
                report.failed += 1;
                log::error!(
                    "accrual run {run_id}: investment {} (user {}) failed: {e}",
                    inv.investment_id,
                    inv.user_id
                );
                record(store, now, &LedgerEvent::InvestmentFailed {
                    run_id: run_id.clone(),
                    investment_id: inv.investment_id.clone(),
                    error: e.to_string(),
                });
            }
        }
        after_each(inv);
    }

    if let Err(e) = store.finish_accrual_run(&report.to_row(now, now)) {
        log::error!("accrual run {run_id}: cannot record run summary: {e}");
    }
    record(store, now, &LedgerEvent::AccrualRunCompleted {
        run_id: run_id.clone(),
        credited: report.credited,
        failed: report.failed,
        cancelled: report.cancelled,
    });
    log::info!(
        "accrual run {run_id} completed: credited {} (paid {:.2}), matured {}, already credited {}, missing wallet {}, failed {}",
        report.credited,
        report.total_paid,
        report.matured,
        report.already_credited,
        report.missing_wallet,
        report.failed
    );

    Ok(report)
}

fn process_investment(
    store: &LedgerStore,
    run_id: &str,
    inv: &InvestmentRow,
    day_start: Timestamp,
    now: Timestamp,
) -> LedgerResult<Outcome> {
    if inv.last_credit_at.is_some_and(|last| last >= day_start) {
        log::debug!("investment {} already credited today", inv.investment_id);
        return Ok(Outcome::Skipped(SkipReason::AlreadyCredited));
    }

    if inv.days_completed >= inv.duration_days {
        store.retire_investment(&inv.investment_id)?;
        log::warn!(
            "investment {} active with {}/{} days completed; retired without credit",
            inv.investment_id,
            inv.days_completed,
            inv.duration_days
        );
        return Ok(Outcome::Skipped(SkipReason::StaleActive));
    }

    store.atomically(|s| {
        if !s.wallet_exists(&inv.user_id)? {
            log::warn!(
                "investment {} is active but user {} has no wallet; skipped",
                inv.investment_id,
                inv.user_id
            );
            return Ok(Outcome::Skipped(SkipReason::MissingWallet));
        }

        let Some(claimed) = s.claim_daily_credit(&inv.investment_id, day_start, now)? else {
            log::debug!("investment {} claimed by a concurrent run", inv.investment_id);
            return Ok(Outcome::Skipped(SkipReason::AlreadyCredited));
        };

        let amount = inv.daily_income;
        if s.apply_wallet_delta(&inv.user_id, amount, 0.0, amount, now)? != 1 {
            return Err(LedgerError::MissingWallet { user_id: inv.user_id.clone() });
        }

        s.insert_txn(
            &Uuid::new_v4().to_string(),
            &inv.user_id,
            TxnKind::RoiPayout,
            amount,
            TxnStatus::Success,
            &serde_json::json!({
                "investment_id": inv.investment_id,
                "run_id": run_id,
                "day": claimed.days_completed,
            }),
            now,
        )?;

        append(s, now, &LedgerEvent::InvestmentCredited {
            run_id: run_id.to_string(),
            investment_id: inv.investment_id.clone(),
            user_id: inv.user_id.clone(),
            amount,
            days_completed: claimed.days_completed,
        })?;

        let matured = !claimed.still_active;
        if matured {
            append(s, now, &LedgerEvent::InvestmentMatured {
                run_id: run_id.to_string(),
                investment_id: inv.investment_id.clone(),
                user_id: inv.user_id.clone(),
                days_completed: claimed.days_completed,
            })?;
            log::info!(
                "investment {} matured after {} days",
                inv.investment_id,
                claimed.days_completed
            );
        }

        Ok(Outcome::Credited { amount, matured })
    })
}

fn append(store: &LedgerStore, now: Timestamp, event: &LedgerEvent) -> LedgerResult<()> {
    store.append_event(&EventLogEntry::new(EVENT_SOURCE, now, event)?)
}

/// Leaves a run row carrying the error for a run that could not start.
fn record_fatal(
    store: &LedgerStore,
    run_id: &str,
    now: Timestamp,
    day_start: Timestamp,
    err: &LedgerError,
) {
    let mut row = AccrualReport::new(run_id.to_string(), day_start, 0).to_row(now, now);
    row.error = Some(err.to_string());
    let written = store
        .insert_accrual_run(run_id, now, day_start)
        .and_then(|()| store.finish_accrual_run(&row));
    if let Err(e) = written {
        log::warn!("accrual run {run_id}: cannot record failure: {e}");
    }
}

/// Best-effort: a lost bookkeeping event never blocks a credit.
fn record(store: &LedgerStore, now: Timestamp, event: &LedgerEvent) {
    if let Err(e) = append(store, now, event) {
        log::warn!("accrual: cannot record {} event: {e}", event.type_name());
    }
}
