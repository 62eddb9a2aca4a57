use super::{millis, opt_ts_at, ts_at, AccrualRunRow, LedgerStore};
use crate::{error::LedgerResult, types::Timestamp};
use rusqlite::{params, OptionalExtension, Row};

const RUN_COLUMNS: &str =
    "run_id, started_at, day_start, candidates, credited, already_credited, missing_wallet,
     failed, matured, retired, total_paid, cancelled, finished_at, error";

fn run_row(row: &Row<'_>) -> rusqlite::Result<AccrualRunRow> {
    Ok(AccrualRunRow {
        run_id: row.get(0)?,
        started_at: ts_at(row, 1)?,
        day_start: ts_at(row, 2)?,
        candidates: row.get(3)?,
        credited: row.get(4)?,
        already_credited: row.get(5)?,
        missing_wallet: row.get(6)?,
        failed: row.get(7)?,
        matured: row.get(8)?,
        retired: row.get(9)?,
        total_paid: row.get(10)?,
        cancelled: row.get::<_, i32>(11)? != 0,
        finished_at: opt_ts_at(row, 12)?,
        error: row.get(13)?,
    })
}

impl LedgerStore {
    // ── Accrual run bookkeeping ───────────────────────────────────

    pub fn insert_accrual_run(
        &self,
        run_id: &str,
        started_at: Timestamp,
        day_start: Timestamp,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO accrual_run (run_id, started_at, day_start) VALUES (?1, ?2, ?3)",
            params![run_id, millis(started_at), millis(day_start)],
        )?;
        Ok(())
    }

    pub fn finish_accrual_run(&self, run: &AccrualRunRow) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE accrual_run
             SET candidates = ?1, credited = ?2, already_credited = ?3, missing_wallet = ?4,
                 failed = ?5, matured = ?6, retired = ?7, total_paid = ?8, cancelled = ?9,
                 finished_at = ?10, error = ?11
             WHERE run_id = ?12",
            params![
                run.candidates,
                run.credited,
                run.already_credited,
                run.missing_wallet,
                run.failed,
                run.matured,
                run.retired,
                run.total_paid,
                run.cancelled as i32,
                run.finished_at.map(millis),
                run.error,
                run.run_id,
            ],
        )?;
        Ok(())
    }

    pub fn accrual_run(&self, run_id: &str) -> LedgerResult<Option<AccrualRunRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM accrual_run WHERE run_id = ?1"),
                params![run_id],
                run_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Most recent first.
    pub fn recent_accrual_runs(&self, limit: u32) -> LedgerResult<Vec<AccrualRunRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM accrual_run ORDER BY started_at DESC, rowid DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], run_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
