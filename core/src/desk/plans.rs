use super::Desk;
use crate::{
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    store::{InvestmentRow, PlanRow},
    types::{Timestamp, TxnKind, TxnStatus},
};
use uuid::Uuid;

impl Desk {
    // ── Plan catalog ──────────────────────────────────────────────

    /// Insert the configured catalog. One-time: fails if any plan exists.
    pub fn seed_plans(&self, now: Timestamp) -> LedgerResult<Vec<PlanRow>> {
        self.store.atomically(|s| {
            if s.plan_count()? > 0 {
                return Err(LedgerError::PlansAlreadySeeded);
            }
            let mut created = Vec::with_capacity(self.config.plans.len());
            for cfg in &self.config.plans {
                let plan = PlanRow {
                    plan_id: Uuid::new_v4().to_string(),
                    name: cfg.name.clone(),
                    invest_amount: cfg.invest_amount,
                    daily_income: cfg.daily_income,
                    duration_days: cfg.duration_days,
                    total_income: cfg.total_income(),
                    is_active: true,
                    created_at: now,
                };
                s.insert_plan(&plan)?;
                created.push(plan);
            }
            log::info!("seeded {} plans", created.len());
            Ok(created)
        })
    }

    /// Purchasable plans, cheapest first.
    pub fn active_plans(&self) -> LedgerResult<Vec<PlanRow>> {
        self.store.active_plans()
    }

    pub fn set_plan_active(&self, plan_id: &str, active: bool) -> LedgerResult<()> {
        if self.store.set_plan_active(plan_id, active)? == 0 {
            return Err(LedgerError::NotFound { entity: "plan", id: plan_id.to_string() });
        }
        Ok(())
    }

    // ── Purchase ──────────────────────────────────────────────────

    /// Debit the plan price and open an investment that accrues from the
    /// next accrual run.
    pub fn purchase_plan(
        &self,
        user_id: &str,
        plan_id: &str,
        now: Timestamp,
    ) -> LedgerResult<InvestmentRow> {
        let plan = match self.store.plan(plan_id)? {
            Some(p) if p.is_active => p,
            _ => return Err(LedgerError::InactivePlan { plan_id: plan_id.to_string() }),
        };
        let user = self.require_user(user_id)?;
        if user.is_blocked {
            return Err(LedgerError::UserBlocked { user_id: user_id.to_string() });
        }

        let investment = self.store.atomically(|s| {
            s.ensure_wallet(user_id, now)?;
            if !s.debit_wallet_if_covered(user_id, plan.invest_amount, now)? {
                let balance = s.wallet(user_id)?.map(|w| w.balance).unwrap_or(0.0);
                return Err(LedgerError::InsufficientBalance {
                    user_id: user_id.to_string(),
                    balance,
                    required: plan.invest_amount,
                });
            }

            let investment = InvestmentRow {
                investment_id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                plan_id: plan.plan_id.clone(),
                invest_amount: plan.invest_amount,
                daily_income: plan.daily_income,
                duration_days: plan.duration_days,
                total_income: plan.total_income,
                days_completed: 0,
                is_active: true,
                last_credit_at: None,
                created_at: now,
            };
            s.insert_investment(&investment)?;
            s.insert_txn(
                &Uuid::new_v4().to_string(),
                user_id,
                TxnKind::PlanPurchase,
                plan.invest_amount,
                TxnStatus::Success,
                &serde_json::json!({
                    "plan_id": plan.plan_id,
                    "investment_id": investment.investment_id,
                }),
                now,
            )?;
            self.append(now, &LedgerEvent::PlanPurchased {
                user_id: user_id.to_string(),
                plan_id: plan.plan_id.clone(),
                investment_id: investment.investment_id.clone(),
                amount: plan.invest_amount,
            })?;
            Ok(investment)
        })?;

        log::info!(
            "user {user_id} bought plan '{}' ({:.2}); investment {}",
            plan.name,
            plan.invest_amount,
            investment.investment_id
        );
        Ok(investment)
    }

    /// Newest first.
    pub fn user_investments(&self, user_id: &str) -> LedgerResult<Vec<InvestmentRow>> {
        self.store.investments_for_user(user_id)
    }
}
