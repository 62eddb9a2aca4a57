use super::Desk;
use crate::{
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    store::{SettingsRow, TxnRow},
    types::{Amount, Timestamp, TxnKind, TxnStatus},
};
use uuid::Uuid;

impl Desk {
    // ── Review queue ──────────────────────────────────────────────

    /// Pending deposits and withdrawals, newest first.
    pub fn pending_transactions(&self) -> LedgerResult<Vec<TxnRow>> {
        self.store.pending_txns()
    }

    // ── User administration ───────────────────────────────────────

    /// Flip the blocked flag. Returns the new value.
    pub fn toggle_user_block(&self, user_id: &str) -> LedgerResult<bool> {
        let user = self.require_user(user_id)?;
        let blocked = !user.is_blocked;
        self.store.set_user_blocked(user_id, blocked)?;
        log::info!("user {user_id} {}", if blocked { "blocked" } else { "unblocked" });
        Ok(blocked)
    }

    /// Manual credit to an existing wallet. Returns the new balance.
    pub fn admin_credit(
        &self,
        user_id: &str,
        amount: Amount,
        now: Timestamp,
    ) -> LedgerResult<Amount> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        self.store.atomically(|s| {
            if s.apply_wallet_delta(user_id, amount, 0.0, 0.0, now)? != 1 {
                return Err(LedgerError::MissingWallet { user_id: user_id.to_string() });
            }
            s.insert_txn(
                &Uuid::new_v4().to_string(),
                user_id,
                TxnKind::AdminCredit,
                amount,
                TxnStatus::Success,
                &serde_json::json!({}),
                now,
            )?;
            self.append(now, &LedgerEvent::AdminCredit {
                user_id: user_id.to_string(),
                amount,
            })?;
            let balance = s.wallet(user_id)?.map(|w| w.balance).unwrap_or(amount);
            log::info!("admin credit {amount:.2} to {user_id}; balance {balance:.2}");
            Ok(balance)
        })
    }

    // ── Gateway settings ──────────────────────────────────────────

    /// Created from config defaults on first read.
    pub fn settings(&self) -> LedgerResult<SettingsRow> {
        let defaults = SettingsRow {
            upi_id: self.config.gateway.upi_id.clone(),
            qr_code_url: self.config.gateway.qr_code_url.clone(),
        };
        self.store.init_settings(&defaults)?;
        Ok(self.store.settings()?.unwrap_or(defaults))
    }

    pub fn update_settings(&self, upi_id: &str, qr_code_url: &str) -> LedgerResult<SettingsRow> {
        if upi_id.trim().is_empty() {
            return Err(LedgerError::InvalidInput("upi id is required".into()));
        }
        let settings = SettingsRow {
            upi_id: upi_id.trim().to_string(),
            qr_code_url: qr_code_url.trim().to_string(),
        };
        self.store.save_settings(&settings)?;
        Ok(settings)
    }
}
