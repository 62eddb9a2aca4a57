//! The desk: every platform operation around the accrual job.
//!
//! RULES:
//!   - Operations take `now` explicitly, like the accrual job.
//!   - Anything that moves money runs inside `LedgerStore::atomically`.
//!   - Wallet balances change only through increment-in-place updates.
//!   - Every state change the operator may need to explain is appended
//!     to the event log.

use crate::{
    accrual::{run_daily_accrual, AccrualJob, AccrualReport, CancelToken},
    command::{AdminCommand, CommandOutcome},
    config::DeskConfig,
    error::{LedgerError, LedgerResult},
    event::{EventLogEntry, LedgerEvent},
    store::LedgerStore,
    types::Timestamp,
};

mod accounts;
mod admin;
mod payments;
mod plans;

pub use accounts::{NewBankAccount, TeamInfo, WalletSummary};

const EVENT_SOURCE: &str = "desk";

pub struct Desk {
    pub store: LedgerStore,
    config:    DeskConfig,
}

impl Desk {
    pub fn new(store: LedgerStore, config: DeskConfig) -> Self {
        Self { store, config }
    }

    /// In-memory store, migrated, with test config. Used by tests.
    pub fn in_memory_test() -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, DeskConfig::default_test()))
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// An accrual job on its own connection to the same database.
    pub fn accrual_job(&self) -> LedgerResult<AccrualJob> {
        Ok(AccrualJob::new(self.store.reopen()?, self.config.accrual.zone()?))
    }

    /// Run the accrual job on the desk's own connection.
    pub fn run_daily_accrual(&self, now: Timestamp) -> LedgerResult<AccrualReport> {
        run_daily_accrual(&self.store, self.config.accrual.zone()?, now, &CancelToken::new())
    }

    pub fn apply_command(
        &self,
        command: AdminCommand,
        now: Timestamp,
    ) -> LedgerResult<CommandOutcome> {
        log::debug!("desk: applying {}", command.name());
        let outcome = match command {
            AdminCommand::RunAccrual => CommandOutcome::Accrual(self.run_daily_accrual(now)?),
            AdminCommand::SeedPlans => CommandOutcome::PlansSeeded {
                count: self.seed_plans(now)?.len(),
            },
            AdminCommand::SetPlanActive { plan_id, active } => {
                self.set_plan_active(&plan_id, active)?;
                CommandOutcome::PlanUpdated { plan_id, active }
            }
            AdminCommand::ApproveDeposit { txn_id } => {
                CommandOutcome::Settled { status: self.approve_deposit(&txn_id, now)?, txn_id }
            }
            AdminCommand::RejectDeposit { txn_id } => {
                CommandOutcome::Settled { status: self.reject_deposit(&txn_id, now)?, txn_id }
            }
            AdminCommand::ApproveWithdrawal { txn_id } => {
                CommandOutcome::Settled { status: self.approve_withdrawal(&txn_id, now)?, txn_id }
            }
            AdminCommand::RejectWithdrawal { txn_id } => {
                CommandOutcome::Settled { status: self.reject_withdrawal(&txn_id, now)?, txn_id }
            }
            AdminCommand::ToggleUserBlock { user_id } => {
                let blocked = self.toggle_user_block(&user_id)?;
                CommandOutcome::UserBlocked { user_id, blocked }
            }
            AdminCommand::AdminCredit { user_id, amount } => {
                let balance = self.admin_credit(&user_id, amount, now)?;
                CommandOutcome::WalletCredited { user_id, balance }
            }
            AdminCommand::UpdateSettings { upi_id, qr_code_url } => {
                CommandOutcome::Settings(self.update_settings(&upi_id, &qr_code_url)?)
            }
        };
        Ok(outcome)
    }

    fn append(&self, now: Timestamp, event: &LedgerEvent) -> LedgerResult<()> {
        self.store
            .append_event(&EventLogEntry::new(EVENT_SOURCE, now, event)?)
    }

    fn require_user(&self, user_id: &str) -> LedgerResult<crate::store::UserRow> {
        self.store.user(user_id)?.ok_or_else(|| LedgerError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })
    }
}
