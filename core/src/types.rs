//! Shared primitive types used across the whole ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stable, unique identifier for any stored entity.
pub type EntityId = String;

/// Owner of a wallet, investments and transactions.
pub type UserId = String;

/// Identifier of one accrual job invocation.
pub type RunId = String;

/// Wall-clock instant. Always UTC inside the ledger.
pub type Timestamp = DateTime<Utc>;

/// Rupee amount.
pub type Amount = f64;

/// What a ledger transaction records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TxnKind {
    Deposit,
    Withdrawal,
    PlanPurchase,
    RoiPayout,
    ReferralCommission,
    AdminCredit,
}

impl TxnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit            => "deposit",
            Self::Withdrawal         => "withdrawal",
            Self::PlanPurchase       => "plan_purchase",
            Self::RoiPayout          => "roi_payout",
            Self::ReferralCommission => "referral_commission",
            Self::AdminCredit        => "admin_credit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "deposit"             => Self::Deposit,
            "withdrawal"          => Self::Withdrawal,
            "plan_purchase"       => Self::PlanPurchase,
            "roi_payout"          => Self::RoiPayout,
            "referral_commission" => Self::ReferralCommission,
            "admin_credit"        => Self::AdminCredit,
            _ => return None,
        })
    }
}

/// Lifecycle of a transaction. Only `Pending` ever changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TxnStatus {
    Pending,
    Success,
    Failed,
}

impl TxnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed  => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "success" => Self::Success,
            "failed"  => Self::Failed,
            _ => return None,
        })
    }
}
