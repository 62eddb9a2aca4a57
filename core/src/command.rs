use crate::{
    accrual::AccrualReport,
    store::SettingsRow,
    types::{Amount, EntityId, TxnStatus, UserId},
};
use serde::{Deserialize, Serialize};

/// All operator-issued commands.
/// Variants are added over time; never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    // ── Accrual ───────────────────────────────────
    RunAccrual,

    // ── Plans ─────────────────────────────────────
    SeedPlans,
    SetPlanActive {
        plan_id: EntityId,
        active:  bool,
    },

    // ── Payments ──────────────────────────────────
    ApproveDeposit    { txn_id: EntityId },
    RejectDeposit     { txn_id: EntityId },
    ApproveWithdrawal { txn_id: EntityId },
    RejectWithdrawal  { txn_id: EntityId },

    // ── Users ─────────────────────────────────────
    ToggleUserBlock { user_id: UserId },
    AdminCredit {
        user_id: UserId,
        amount:  Amount,
    },

    // ── Settings ──────────────────────────────────
    UpdateSettings {
        upi_id: String,
        #[serde(default)]
        qr_code_url: String,
    },
}

impl AdminCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunAccrual             => "run_accrual",
            Self::SeedPlans              => "seed_plans",
            Self::SetPlanActive { .. }   => "set_plan_active",
            Self::ApproveDeposit { .. }  => "approve_deposit",
            Self::RejectDeposit { .. }   => "reject_deposit",
            Self::ApproveWithdrawal { .. } => "approve_withdrawal",
            Self::RejectWithdrawal { .. }  => "reject_withdrawal",
            Self::ToggleUserBlock { .. } => "toggle_user_block",
            Self::AdminCredit { .. }     => "admin_credit",
            Self::UpdateSettings { .. }  => "update_settings",
        }
    }
}

/// What a command did, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Accrual(AccrualReport),
    PlansSeeded { count: usize },
    PlanUpdated { plan_id: EntityId, active: bool },
    Settled { txn_id: EntityId, status: TxnStatus },
    UserBlocked { user_id: UserId, blocked: bool },
    WalletCredited { user_id: UserId, balance: Amount },
    Settings(SettingsRow),
}
