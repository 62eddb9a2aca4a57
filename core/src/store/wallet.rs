use super::{millis, ts_at, LedgerStore, WalletRow};
use crate::{
    error::LedgerResult,
    types::{Amount, Timestamp},
};
use rusqlite::{params, OptionalExtension};

impl LedgerStore {
    // ── Wallet ────────────────────────────────────────────────────

    /// Create an empty wallet unless one exists. Returns true if created.
    pub fn ensure_wallet(&self, user_id: &str, now: Timestamp) -> LedgerResult<bool> {
        let n = self.conn.execute(
            "INSERT OR IGNORE INTO wallet (user_id, balance, total_recharge, total_income, created_at, updated_at)
             VALUES (?1, 0, 0, 0, ?2, ?2)",
            params![user_id, millis(now)],
        )?;
        Ok(n == 1)
    }

    pub fn wallet(&self, user_id: &str) -> LedgerResult<Option<WalletRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, balance, total_recharge, total_income, updated_at
                 FROM wallet WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(WalletRow {
                        user_id: row.get(0)?,
                        balance: row.get(1)?,
                        total_recharge: row.get(2)?,
                        total_income: row.get(3)?,
                        updated_at: ts_at(row, 4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn wallet_exists(&self, user_id: &str) -> LedgerResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM wallet WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Increment-in-place. Each delta is added to the stored value, never
    /// written back from a prior read. Returns the number of wallets touched.
    pub fn apply_wallet_delta(
        &self,
        user_id: &str,
        balance: Amount,
        total_recharge: Amount,
        total_income: Amount,
        now: Timestamp,
    ) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE wallet
             SET balance        = balance + ?1,
                 total_recharge = total_recharge + ?2,
                 total_income   = total_income + ?3,
                 updated_at     = ?4
             WHERE user_id = ?5",
            params![balance, total_recharge, total_income, millis(now), user_id],
        )?;
        Ok(n)
    }

    /// Debit only if the balance covers it. Returns false when it does not.
    pub fn debit_wallet_if_covered(
        &self,
        user_id: &str,
        amount: Amount,
        now: Timestamp,
    ) -> LedgerResult<bool> {
        let n = self.conn.execute(
            "UPDATE wallet SET balance = balance - ?1, updated_at = ?2
             WHERE user_id = ?3 AND balance >= ?1",
            params![amount, millis(now), user_id],
        )?;
        Ok(n == 1)
    }
}
