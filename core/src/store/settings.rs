use super::{LedgerStore, SettingsRow};
use crate::error::LedgerResult;
use rusqlite::{params, OptionalExtension};

impl LedgerStore {
    // ── Gateway settings ──────────────────────────────────────────

    pub fn settings(&self) -> LedgerResult<Option<SettingsRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT upi_id, qr_code_url FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(SettingsRow {
                        upi_id: row.get(0)?,
                        qr_code_url: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Insert the singleton row if it does not exist yet.
    pub fn init_settings(&self, defaults: &SettingsRow) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO settings (id, upi_id, qr_code_url) VALUES (1, ?1, ?2)",
            params![defaults.upi_id, defaults.qr_code_url],
        )?;
        Ok(())
    }

    pub fn save_settings(&self, settings: &SettingsRow) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO settings (id, upi_id, qr_code_url) VALUES (1, ?1, ?2)
             ON CONFLICT (id) DO UPDATE SET upi_id = excluded.upi_id, qr_code_url = excluded.qr_code_url",
            params![settings.upi_id, settings.qr_code_url],
        )?;
        Ok(())
    }
}
