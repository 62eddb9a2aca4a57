use super::{millis, opt_ts_at, ts_at, InvestmentRow, LedgerStore};
use crate::{error::LedgerResult, types::Timestamp};
use rusqlite::{params, OptionalExtension, Row};

const INVESTMENT_COLUMNS: &str =
    "investment_id, user_id, plan_id, invest_amount, daily_income, duration_days,
     total_income, days_completed, is_active, last_credit_at, created_at";

fn investment_row(row: &Row<'_>) -> rusqlite::Result<InvestmentRow> {
    Ok(InvestmentRow {
        investment_id: row.get(0)?,
        user_id: row.get(1)?,
        plan_id: row.get(2)?,
        invest_amount: row.get(3)?,
        daily_income: row.get(4)?,
        duration_days: row.get(5)?,
        total_income: row.get(6)?,
        days_completed: row.get(7)?,
        is_active: row.get::<_, i32>(8)? != 0,
        last_credit_at: opt_ts_at(row, 9)?,
        created_at: ts_at(row, 10)?,
    })
}

/// Progress after a successful daily claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedDay {
    pub days_completed: u32,
    pub still_active: bool,
}

impl LedgerStore {
    // ── Investment ────────────────────────────────────────────────

    pub fn insert_investment(&self, inv: &InvestmentRow) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO investment (
                investment_id, user_id, plan_id, invest_amount, daily_income, duration_days,
                total_income, days_completed, is_active, last_credit_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                inv.investment_id,
                inv.user_id,
                inv.plan_id,
                inv.invest_amount,
                inv.daily_income,
                inv.duration_days,
                inv.total_income,
                inv.days_completed,
                inv.is_active as i32,
                inv.last_credit_at.map(millis),
                millis(inv.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn investment(&self, investment_id: &str) -> LedgerResult<Option<InvestmentRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {INVESTMENT_COLUMNS} FROM investment WHERE investment_id = ?1"),
                params![investment_id],
                investment_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Every investment still flagged active, oldest first.
    pub fn active_investments(&self) -> LedgerResult<Vec<InvestmentRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investment WHERE is_active = 1
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map([], investment_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn investments_for_user(&self, user_id: &str) -> LedgerResult<Vec<InvestmentRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investment WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], investment_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Compare-and-swap one day of progress.
    ///
    /// Applies only if the investment is active, has days left, and was not
    /// credited at or after `day_start`. Returns `None` when another writer
    /// already claimed this day (or the investment is no longer eligible).
    pub fn claim_daily_credit(
        &self,
        investment_id: &str,
        day_start: Timestamp,
        now: Timestamp,
    ) -> LedgerResult<Option<ClaimedDay>> {
        let claimed = self
            .conn
            .query_row(
                "UPDATE investment
                 SET days_completed = days_completed + 1,
                     last_credit_at = ?1,
                     is_active = CASE WHEN days_completed + 1 >= duration_days THEN 0 ELSE 1 END
                 WHERE investment_id = ?2
                   AND is_active = 1
                   AND days_completed < duration_days
                   AND (last_credit_at IS NULL OR last_credit_at < ?3)
                 RETURNING days_completed, is_active",
                params![millis(now), investment_id, millis(day_start)],
                |row| {
                    Ok(ClaimedDay {
                        days_completed: row.get(0)?,
                        still_active: row.get::<_, i32>(1)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(claimed)
    }

    /// Deactivate without crediting. Returns rows touched.
    pub fn retire_investment(&self, investment_id: &str) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE investment SET is_active = 0 WHERE investment_id = ?1 AND is_active = 1",
            params![investment_id],
        )?;
        Ok(n)
    }

    pub fn active_investment_count(&self) -> LedgerResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM investment WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}
