//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Desk operations and the accrual job call store methods and never
//! execute SQL directly.
//!
//! Multi-statement changes go through `atomically`, which holds an
//! IMMEDIATE transaction so the write lock is taken before the first read.

use crate::{
    error::LedgerResult,
    event::EventLogEntry,
    types::{Amount, EntityId, RunId, Timestamp, TxnKind, TxnStatus, UserId},
};
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod accrual_run;
mod bank_account;
mod investment;
mod plan;
mod settings;
mod transaction;
mod user;
mod wallet;

pub use investment::ClaimedDay;

pub struct LedgerStore {
    pub(crate) conn: Connection,
    path: String, // file path or URI
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// Open a fresh in-memory database (used in tests).
    /// Each call gets its own uniquely named shared-cache database, so
    /// `reopen` reaches the same data while this connection stays open.
    pub fn in_memory() -> LedgerResult<Self> {
        let uri = format!("file:ledger_{}?mode=memory&cache=shared", Uuid::new_v4().simple());
        Self::open(&uri)
    }

    /// Open a new connection to the same database.
    pub fn reopen(&self) -> LedgerResult<Self> {
        Self::open(&self.path)
    }

    /// Apply all schema migrations in order. Safe to call more than once.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_users_wallets.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_plans_investments.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_transactions.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_bank_settings.sql"))?;
        Ok(())
    }

    /// Run `f` inside one IMMEDIATE transaction.
    /// Commits on `Ok`; any error rolls back every write `f` made.
    /// Must not be nested.
    pub fn atomically<T>(&self, f: impl FnOnce(&Self) -> LedgerResult<T>) -> LedgerResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (occurred_at, source, event_type, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                millis(entry.occurred_at),
                entry.source,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_of_type(&self, event_type: &str) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, occurred_at, source, event_type, payload
             FROM event_log WHERE event_type = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![event_type], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    occurred_at: ts_at(row, 1)?,
                    source: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self) -> LedgerResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))?;
        Ok(n)
    }
}

// ── Row types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRow {
    pub user_id:       UserId,
    pub name:          String,
    pub mobile:        String,
    pub referral_code: Option<String>,
    pub referred_by:   Option<UserId>,
    pub is_blocked:    bool,
    pub created_at:    Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletRow {
    pub user_id:        UserId,
    pub balance:        Amount,
    pub total_recharge: Amount,
    pub total_income:   Amount,
    pub updated_at:     Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanRow {
    pub plan_id:       EntityId,
    pub name:          String,
    pub invest_amount: Amount,
    pub daily_income:  Amount,
    pub duration_days: u32,
    pub total_income:  Amount,
    pub is_active:     bool,
    pub created_at:    Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestmentRow {
    pub investment_id:  EntityId,
    pub user_id:        UserId,
    pub plan_id:        EntityId,
    pub invest_amount:  Amount,
    pub daily_income:   Amount,
    pub duration_days:  u32,
    pub total_income:   Amount,
    pub days_completed: u32,
    pub is_active:      bool,
    pub last_credit_at: Option<Timestamp>,
    pub created_at:     Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TxnRow {
    pub txn_id:     EntityId,
    pub user_id:    UserId,
    pub kind:       TxnKind,
    pub amount:     Amount,
    pub status:     TxnStatus,
    pub meta:       serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankAccountRow {
    pub bank_account_id: EntityId,
    pub user_id:         UserId,
    pub account_holder:  String,
    pub bank_name:       String,
    pub account_number:  String,
    pub ifsc:            String,
    pub branch:          Option<String>,
    pub created_at:      Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsRow {
    pub upi_id:      String,
    pub qr_code_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccrualRunRow {
    pub run_id:           RunId,
    pub started_at:       Timestamp,
    pub day_start:        Timestamp,
    pub candidates:       u32,
    pub credited:         u32,
    pub already_credited: u32,
    pub missing_wallet:   u32,
    pub failed:           u32,
    pub matured:          u32,
    pub retired:          u32,
    pub total_paid:       Amount,
    pub cancelled:        bool,
    pub finished_at:      Option<Timestamp>,
    pub error:            Option<String>,
}

// ── Column helpers ─────────────────────────────────────────────

pub(crate) fn millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let ms: i64 = row.get(idx)?;
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

pub(crate) fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Timestamp>> {
    match row.get::<_, Option<i64>>(idx)? {
        None => Ok(None),
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms)),
    }
}
