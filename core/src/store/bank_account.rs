use super::{millis, ts_at, BankAccountRow, LedgerStore};
use crate::error::LedgerResult;
use rusqlite::{params, OptionalExtension, Row};

const BANK_COLUMNS: &str =
    "bank_account_id, user_id, account_holder, bank_name, account_number, ifsc, branch, created_at";

fn bank_row(row: &Row<'_>) -> rusqlite::Result<BankAccountRow> {
    Ok(BankAccountRow {
        bank_account_id: row.get(0)?,
        user_id: row.get(1)?,
        account_holder: row.get(2)?,
        bank_name: row.get(3)?,
        account_number: row.get(4)?,
        ifsc: row.get(5)?,
        branch: row.get(6)?,
        created_at: ts_at(row, 7)?,
    })
}

impl LedgerStore {
    // ── Bank accounts ─────────────────────────────────────────────

    pub fn insert_bank_account(&self, acct: &BankAccountRow) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO bank_account (bank_account_id, user_id, account_holder, bank_name, account_number, ifsc, branch, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                acct.bank_account_id,
                acct.user_id,
                acct.account_holder,
                acct.bank_name,
                acct.account_number,
                acct.ifsc,
                acct.branch,
                millis(acct.created_at),
            ],
        )?;
        Ok(())
    }

    /// The account only if it belongs to `user_id`.
    pub fn owned_bank_account(
        &self,
        bank_account_id: &str,
        user_id: &str,
    ) -> LedgerResult<Option<BankAccountRow>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {BANK_COLUMNS} FROM bank_account
                     WHERE bank_account_id = ?1 AND user_id = ?2"
                ),
                params![bank_account_id, user_id],
                bank_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Newest first.
    pub fn bank_accounts_for_user(&self, user_id: &str) -> LedgerResult<Vec<BankAccountRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BANK_COLUMNS} FROM bank_account WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], bank_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
