//! The ledger event log: every balance-affecting decision, as data.
//!
//! RULE: Events are appended, never updated.
//! Operators read them to see why an investment was or was not credited.

use crate::types::{Amount, EntityId, RunId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Every event the ledger records.
/// Variants are added over time; never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // ── Accrual events ─────────────────────────────
    AccrualRunStarted {
        run_id: RunId,
        day_start: Timestamp,
        candidates: usize,
    },
    InvestmentCredited {
        run_id: RunId,
        investment_id: EntityId,
        user_id: UserId,
        amount: Amount,
        days_completed: u32,
    },
    InvestmentMatured {
        run_id: RunId,
        investment_id: EntityId,
        user_id: UserId,
        days_completed: u32,
    },
    InvestmentSkipped {
        run_id: RunId,
        investment_id: EntityId,
        reason: SkipReason,
    },
    InvestmentFailed {
        run_id: RunId,
        investment_id: EntityId,
        error: String,
    },
    AccrualRunCompleted {
        run_id: RunId,
        credited: u32,
        failed: u32,
        cancelled: bool,
    },

    // ── Desk events ────────────────────────────────
    UserRegistered {
        user_id: UserId,
        referred_by: Option<UserId>,
    },
    PlanPurchased {
        user_id: UserId,
        plan_id: EntityId,
        investment_id: EntityId,
        amount: Amount,
    },
    DepositRequested {
        user_id: UserId,
        transaction_id: EntityId,
        amount: Amount,
    },
    DepositSettled {
        user_id: UserId,
        transaction_id: EntityId,
        approved: bool,
    },
    ReferralCommissionPaid {
        referrer_id: UserId,
        referred_user_id: UserId,
        amount: Amount,
    },
    WithdrawalRequested {
        user_id: UserId,
        transaction_id: EntityId,
        amount: Amount,
    },
    WithdrawalSettled {
        user_id: UserId,
        transaction_id: EntityId,
        approved: bool,
    },
    AdminCredit {
        user_id: UserId,
        amount: Amount,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyCredited,
    MissingWallet,
    /// Active with no days left; retired without credit.
    StaleActive,
}

impl LedgerEvent {
    /// Stable string name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::AccrualRunStarted { .. }      => "accrual_run_started",
            Self::InvestmentCredited { .. }     => "investment_credited",
            Self::InvestmentMatured { .. }      => "investment_matured",
            Self::InvestmentSkipped { .. }      => "investment_skipped",
            Self::InvestmentFailed { .. }       => "investment_failed",
            Self::AccrualRunCompleted { .. }    => "accrual_run_completed",
            Self::UserRegistered { .. }         => "user_registered",
            Self::PlanPurchased { .. }          => "plan_purchased",
            Self::DepositRequested { .. }       => "deposit_requested",
            Self::DepositSettled { .. }         => "deposit_settled",
            Self::ReferralCommissionPaid { .. } => "referral_commission_paid",
            Self::WithdrawalRequested { .. }    => "withdrawal_requested",
            Self::WithdrawalSettled { .. }      => "withdrawal_settled",
            Self::AdminCredit { .. }            => "admin_credit",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub occurred_at: Timestamp,
    pub source: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized LedgerEvent
}

impl EventLogEntry {
    pub fn new(
        source: &str,
        occurred_at: Timestamp,
        event: &LedgerEvent,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            id: None,
            occurred_at,
            source: source.to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
        })
    }

    pub fn decode(&self) -> serde_json::Result<LedgerEvent> {
        serde_json::from_str(&self.payload)
    }
}
