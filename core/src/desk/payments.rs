use super::Desk;
use crate::{
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    store::{LedgerStore, TxnRow},
    types::{Amount, Timestamp, TxnKind, TxnStatus},
};
use uuid::Uuid;

impl Desk {
    fn check_minimum(&self, kind: &'static str, amount: Amount) -> LedgerResult<()> {
        let minimum = self.config.payments.min_amount;
        if !amount.is_finite() || amount < minimum {
            return Err(LedgerError::BelowMinimum { kind, amount, minimum });
        }
        Ok(())
    }

    // ── Deposits ──────────────────────────────────────────────────

    /// Record a manual UPI transfer for admin review. No balance change
    /// until it is approved.
    pub fn create_deposit(
        &self,
        user_id: &str,
        amount: Amount,
        utr: &str,
        upi_id: &str,
        now: Timestamp,
    ) -> LedgerResult<TxnRow> {
        if utr.trim().is_empty() || upi_id.trim().is_empty() {
            return Err(LedgerError::InvalidInput("utr and upi id are required".into()));
        }
        self.check_minimum("deposit", amount)?;
        self.require_user(user_id)?;

        let txn_id = Uuid::new_v4().to_string();
        self.store.atomically(|s| {
            s.insert_txn(
                &txn_id,
                user_id,
                TxnKind::Deposit,
                amount,
                TxnStatus::Pending,
                &serde_json::json!({ "utr": utr.trim(), "upi_id": upi_id.trim() }),
                now,
            )?;
            self.append(now, &LedgerEvent::DepositRequested {
                user_id: user_id.to_string(),
                transaction_id: txn_id.clone(),
                amount,
            })
        })?;
        log::info!("deposit {txn_id} of {amount:.2} requested by {user_id}");
        require_txn(&self.store, &txn_id)
    }

    /// Credit the deposit and pay the depositor's referrer their share.
    pub fn approve_deposit(&self, txn_id: &str, now: Timestamp) -> LedgerResult<TxnStatus> {
        let referral_percent = self.config.payments.referral_percent;
        self.store.atomically(|s| {
            let tx = pending_of_kind(s, txn_id, TxnKind::Deposit)?;
            s.settle_txn(txn_id, TxnKind::Deposit, TxnStatus::Success, now)?;

            s.ensure_wallet(&tx.user_id, now)?;
            s.apply_wallet_delta(&tx.user_id, tx.amount, tx.amount, 0.0, now)?;
            self.append(now, &LedgerEvent::DepositSettled {
                user_id: tx.user_id.clone(),
                transaction_id: txn_id.to_string(),
                approved: true,
            })?;

            let referrer = s.user(&tx.user_id)?.and_then(|u| u.referred_by);
            if let Some(referrer_id) = referrer {
                let commission = tx.amount * referral_percent / 100.0;
                if commission > 0.0 {
                    s.ensure_wallet(&referrer_id, now)?;
                    s.apply_wallet_delta(&referrer_id, commission, 0.0, commission, now)?;
                    s.insert_txn(
                        &Uuid::new_v4().to_string(),
                        &referrer_id,
                        TxnKind::ReferralCommission,
                        commission,
                        TxnStatus::Success,
                        &serde_json::json!({
                            "referred_user_id": tx.user_id,
                            "deposit_txn_id": txn_id,
                        }),
                        now,
                    )?;
                    self.append(now, &LedgerEvent::ReferralCommissionPaid {
                        referrer_id: referrer_id.clone(),
                        referred_user_id: tx.user_id.clone(),
                        amount: commission,
                    })?;
                    log::info!("referral commission {commission:.2} paid to {referrer_id}");
                }
            }
            log::info!("deposit {txn_id} approved: {:.2} to {}", tx.amount, tx.user_id);
            Ok(TxnStatus::Success)
        })
    }

    pub fn reject_deposit(&self, txn_id: &str, now: Timestamp) -> LedgerResult<TxnStatus> {
        self.store.atomically(|s| {
            let tx = pending_of_kind(s, txn_id, TxnKind::Deposit)?;
            s.settle_txn(txn_id, TxnKind::Deposit, TxnStatus::Failed, now)?;
            self.append(now, &LedgerEvent::DepositSettled {
                user_id: tx.user_id,
                transaction_id: txn_id.to_string(),
                approved: false,
            })?;
            log::info!("deposit {txn_id} rejected");
            Ok(TxnStatus::Failed)
        })
    }

    // ── Withdrawals ───────────────────────────────────────────────

    /// Hold the amount immediately; the transfer itself is manual.
    /// GST is recorded on the request, not deducted.
    pub fn create_withdrawal(
        &self,
        user_id: &str,
        amount: Amount,
        bank_account_id: &str,
        now: Timestamp,
    ) -> LedgerResult<TxnRow> {
        self.check_minimum("withdrawal", amount)?;
        let user = self.require_user(user_id)?;
        if user.is_blocked {
            return Err(LedgerError::UserBlocked { user_id: user_id.to_string() });
        }
        let gst = amount * self.config.payments.gst_percent / 100.0;

        let txn_id = Uuid::new_v4().to_string();
        self.store.atomically(|s| {
            let bank = s.owned_bank_account(bank_account_id, user_id)?.ok_or_else(|| {
                LedgerError::NotFound { entity: "bank account", id: bank_account_id.to_string() }
            })?;

            s.ensure_wallet(user_id, now)?;
            if !s.debit_wallet_if_covered(user_id, amount, now)? {
                let balance = s.wallet(user_id)?.map(|w| w.balance).unwrap_or(0.0);
                return Err(LedgerError::InsufficientBalance {
                    user_id: user_id.to_string(),
                    balance,
                    required: amount,
                });
            }

            s.insert_txn(
                &txn_id,
                user_id,
                TxnKind::Withdrawal,
                amount,
                TxnStatus::Pending,
                &serde_json::json!({ "bank_account_id": bank.bank_account_id, "gst": gst }),
                now,
            )?;
            self.append(now, &LedgerEvent::WithdrawalRequested {
                user_id: user_id.to_string(),
                transaction_id: txn_id.clone(),
                amount,
            })
        })?;
        log::info!("withdrawal {txn_id} of {amount:.2} requested by {user_id}");
        require_txn(&self.store, &txn_id)
    }

    pub fn approve_withdrawal(&self, txn_id: &str, now: Timestamp) -> LedgerResult<TxnStatus> {
        self.store.atomically(|s| {
            let tx = pending_of_kind(s, txn_id, TxnKind::Withdrawal)?;
            s.settle_txn(txn_id, TxnKind::Withdrawal, TxnStatus::Success, now)?;
            self.append(now, &LedgerEvent::WithdrawalSettled {
                user_id: tx.user_id,
                transaction_id: txn_id.to_string(),
                approved: true,
            })?;
            log::info!("withdrawal {txn_id} approved");
            Ok(TxnStatus::Success)
        })
    }

    /// Return the held amount to the wallet.
    pub fn reject_withdrawal(&self, txn_id: &str, now: Timestamp) -> LedgerResult<TxnStatus> {
        self.store.atomically(|s| {
            let tx = pending_of_kind(s, txn_id, TxnKind::Withdrawal)?;
            s.settle_txn(txn_id, TxnKind::Withdrawal, TxnStatus::Failed, now)?;
            s.ensure_wallet(&tx.user_id, now)?;
            s.apply_wallet_delta(&tx.user_id, tx.amount, 0.0, 0.0, now)?;
            self.append(now, &LedgerEvent::WithdrawalSettled {
                user_id: tx.user_id.clone(),
                transaction_id: txn_id.to_string(),
                approved: false,
            })?;
            log::info!("withdrawal {txn_id} rejected; {:.2} refunded to {}", tx.amount, tx.user_id);
            Ok(TxnStatus::Failed)
        })
    }
}

fn require_txn(store: &LedgerStore, txn_id: &str) -> LedgerResult<TxnRow> {
    store.txn(txn_id)?.ok_or_else(|| LedgerError::NotFound {
        entity: "transaction",
        id: txn_id.to_string(),
    })
}

fn pending_of_kind(store: &LedgerStore, txn_id: &str, kind: TxnKind) -> LedgerResult<TxnRow> {
    let tx = require_txn(store, txn_id)?;
    if tx.kind != kind {
        return Err(LedgerError::InvalidTransaction {
            tx_id: txn_id.to_string(),
            reason: format!("expected {}, found {}", kind.as_str(), tx.kind.as_str()),
        });
    }
    if tx.status != TxnStatus::Pending {
        return Err(LedgerError::InvalidTransaction {
            tx_id: txn_id.to_string(),
            reason: format!("already {}", tx.status.as_str()),
        });
    }
    Ok(tx)
}
