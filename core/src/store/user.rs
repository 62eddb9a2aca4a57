use super::{millis, ts_at, LedgerStore, UserRow};
use crate::{error::LedgerResult, types::Timestamp};
use rusqlite::{params, OptionalExtension, Row};

const USER_COLUMNS: &str =
    "user_id, name, mobile, referral_code, referred_by, is_blocked, created_at";

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        user_id: row.get(0)?,
        name: row.get(1)?,
        mobile: row.get(2)?,
        referral_code: row.get(3)?,
        referred_by: row.get(4)?,
        is_blocked: row.get::<_, i32>(5)? != 0,
        created_at: ts_at(row, 6)?,
    })
}

impl LedgerStore {
    // ── User ──────────────────────────────────────────────────────

    pub fn insert_user(
        &self,
        user_id: &str,
        name: &str,
        mobile: &str,
        referral_code: Option<&str>,
        referred_by: Option<&str>,
        now: Timestamp,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO user_account (user_id, name, mobile, referral_code, referred_by, is_blocked, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![user_id, name, mobile, referral_code, referred_by, millis(now)],
        )?;
        Ok(())
    }

    pub fn user(&self, user_id: &str) -> LedgerResult<Option<UserRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM user_account WHERE user_id = ?1"),
                params![user_id],
                user_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn user_by_mobile(&self, mobile: &str) -> LedgerResult<Option<UserRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM user_account WHERE mobile = ?1"),
                params![mobile],
                user_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn user_by_referral_code(&self, code: &str) -> LedgerResult<Option<UserRow>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM user_account WHERE referral_code = ?1"),
                params![code],
                user_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Newest first.
    pub fn all_users(&self) -> LedgerResult<Vec<UserRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user_account ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], user_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn set_user_blocked(&self, user_id: &str, blocked: bool) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE user_account SET is_blocked = ?1 WHERE user_id = ?2",
            params![blocked as i32, user_id],
        )?;
        Ok(n)
    }

    // ── Referral tree ─────────────────────────────────────────────

    pub fn referral_count(&self, user_id: &str) -> LedgerResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM user_account WHERE referred_by = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Direct referrals, oldest first.
    pub fn referrals_of(&self, user_id: &str) -> LedgerResult<Vec<UserRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user_account WHERE referred_by = ?1
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![user_id], user_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
