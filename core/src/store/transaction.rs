use super::{millis, ts_at, LedgerStore, TxnRow};
use crate::{
    error::LedgerResult,
    types::{Amount, Timestamp, TxnKind, TxnStatus},
};
use rusqlite::{
    params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    OptionalExtension, Row, ToSql,
};

impl ToSql for TxnKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TxnKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        TxnKind::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown txn kind '{s}'").into()))
    }
}

impl ToSql for TxnStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TxnStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        TxnStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown txn status '{s}'").into()))
    }
}

const TXN_COLUMNS: &str = "txn_id, user_id, kind, amount, status, meta, created_at, updated_at";

fn txn_row(row: &Row<'_>) -> rusqlite::Result<TxnRow> {
    let meta: String = row.get(5)?;
    let meta = serde_json::from_str(&meta).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(TxnRow {
        txn_id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        amount: row.get(3)?,
        status: row.get(4)?,
        meta,
        created_at: ts_at(row, 6)?,
        updated_at: ts_at(row, 7)?,
    })
}

impl LedgerStore {
    // ── Transaction log ───────────────────────────────────────────

    pub fn insert_txn(
        &self,
        txn_id: &str,
        user_id: &str,
        kind: TxnKind,
        amount: Amount,
        status: TxnStatus,
        meta: &serde_json::Value,
        now: Timestamp,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO txn (txn_id, user_id, kind, amount, status, meta, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                txn_id,
                user_id,
                kind,
                amount,
                status,
                serde_json::to_string(meta)?,
                millis(now),
            ],
        )?;
        Ok(())
    }

    pub fn txn(&self, txn_id: &str) -> LedgerResult<Option<TxnRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {TXN_COLUMNS} FROM txn WHERE txn_id = ?1"),
                params![txn_id],
                txn_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Move a pending row of `kind` to `status`. Returns false when the row
    /// is missing, of another kind, or already settled.
    pub fn settle_txn(
        &self,
        txn_id: &str,
        kind: TxnKind,
        status: TxnStatus,
        now: Timestamp,
    ) -> LedgerResult<bool> {
        let n = self.conn.execute(
            "UPDATE txn SET status = ?1, updated_at = ?2
             WHERE txn_id = ?3 AND kind = ?4 AND status = 'pending'",
            params![status, millis(now), txn_id, kind],
        )?;
        Ok(n == 1)
    }

    /// Newest first.
    pub fn txns_for_user(&self, user_id: &str) -> LedgerResult<Vec<TxnRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM txn WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], txn_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Newest first.
    pub fn pending_txns(&self) -> LedgerResult<Vec<TxnRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM txn WHERE status = 'pending'
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], txn_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn sum_txns(
        &self,
        user_id: &str,
        kind: TxnKind,
        status: TxnStatus,
    ) -> LedgerResult<Amount> {
        let total: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0.0) FROM txn
             WHERE user_id = ?1 AND kind = ?2 AND status = ?3",
            params![user_id, kind, status],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn txn_count_by_kind(&self, kind: TxnKind) -> LedgerResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM txn WHERE kind = ?1",
            params![kind],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}
