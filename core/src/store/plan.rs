use super::{millis, ts_at, LedgerStore, PlanRow};
use crate::error::LedgerResult;
use rusqlite::{params, OptionalExtension, Row};

const PLAN_COLUMNS: &str =
    "plan_id, name, invest_amount, daily_income, duration_days, total_income, is_active, created_at";

fn plan_row(row: &Row<'_>) -> rusqlite::Result<PlanRow> {
    Ok(PlanRow {
        plan_id: row.get(0)?,
        name: row.get(1)?,
        invest_amount: row.get(2)?,
        daily_income: row.get(3)?,
        duration_days: row.get(4)?,
        total_income: row.get(5)?,
        is_active: row.get::<_, i32>(6)? != 0,
        created_at: ts_at(row, 7)?,
    })
}

impl LedgerStore {
    // ── Plan catalog ──────────────────────────────────────────────

    pub fn insert_plan(&self, plan: &PlanRow) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO plan (plan_id, name, invest_amount, daily_income, duration_days, total_income, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                plan.plan_id,
                plan.name,
                plan.invest_amount,
                plan.daily_income,
                plan.duration_days,
                plan.total_income,
                plan.is_active as i32,
                millis(plan.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn plan_count(&self) -> LedgerResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM plan", [], |row| row.get(0))?;
        Ok(n)
    }

    pub fn plan(&self, plan_id: &str) -> LedgerResult<Option<PlanRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {PLAN_COLUMNS} FROM plan WHERE plan_id = ?1"),
                params![plan_id],
                plan_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Purchasable plans, cheapest first.
    pub fn active_plans(&self) -> LedgerResult<Vec<PlanRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PLAN_COLUMNS} FROM plan WHERE is_active = 1
             ORDER BY invest_amount ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map([], plan_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn set_plan_active(&self, plan_id: &str, active: bool) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE plan SET is_active = ?1 WHERE plan_id = ?2",
            params![active as i32, plan_id],
        )?;
        Ok(n)
    }
}
