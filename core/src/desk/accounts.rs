use super::Desk;
use crate::{
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    store::{BankAccountRow, TxnRow, UserRow},
    types::{Amount, Timestamp, TxnKind, TxnStatus, UserId},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletSummary {
    pub balance:        Amount,
    pub total_recharge: Amount,
    pub total_income:   Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamInfo {
    pub team_size:   i64,
    pub team_income: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBankAccount {
    pub account_holder: String,
    pub bank_name:      String,
    pub account_number: String,
    pub ifsc:           String,
    #[serde(default)]
    pub branch:         Option<String>,
}

/// Last four of the mobile, then the tail of the id.
/// The tail grows until the code is unused.
fn referral_code_candidates(mobile: &str, user_id: &str) -> impl Iterator<Item = String> {
    let digits: String = mobile.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let mobile_part = digits[digits.len().saturating_sub(4)..].to_string();
    let id_part: String = user_id.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    (4..=id_part.len()).step_by(2).map(move |n| {
        format!("{mobile_part}{}", &id_part[id_part.len() - n..]).to_uppercase()
    })
}

impl Desk {
    // ── Users ─────────────────────────────────────────────────────

    /// Create a user and their wallet. Login credentials live elsewhere.
    pub fn register_user(
        &self,
        name: &str,
        mobile: &str,
        referral_code: Option<&str>,
        now: Timestamp,
    ) -> LedgerResult<UserRow> {
        let name = name.trim();
        let mobile = mobile.trim();
        if name.is_empty() || mobile.is_empty() {
            return Err(LedgerError::InvalidInput("name and mobile are required".into()));
        }

        let user_id: UserId = Uuid::new_v4().to_string();
        self.store.atomically(|s| {
            if s.user_by_mobile(mobile)?.is_some() {
                return Err(LedgerError::DuplicateMobile { mobile: mobile.to_string() });
            }

            let referred_by = match referral_code.map(str::trim).filter(|c| !c.is_empty()) {
                None => None,
                // Issued codes are uppercase; accept them as typed.
                Some(code) => {
                    let referrer = s
                        .user_by_referral_code(&code.to_uppercase())?
                        .ok_or_else(|| LedgerError::InvalidReferralCode {
                            code: code.to_string(),
                        })?;
                    Some(referrer.user_id)
                }
            };

            let mut code = None;
            for candidate in referral_code_candidates(mobile, &user_id) {
                if s.user_by_referral_code(&candidate)?.is_none() {
                    code = Some(candidate);
                    break;
                }
            }
            let code = code.ok_or_else(|| {
                LedgerError::InvalidInput(format!("no free referral code for {mobile}"))
            })?;

            s.insert_user(&user_id, name, mobile, Some(&code), referred_by.as_deref(), now)?;
            s.ensure_wallet(&user_id, now)?;
            self.append(now, &LedgerEvent::UserRegistered {
                user_id: user_id.clone(),
                referred_by,
            })?;
            Ok(())
        })?;

        log::info!("registered user {user_id}");
        self.require_user(&user_id)
    }

    /// Newest first.
    pub fn list_users(&self) -> LedgerResult<Vec<UserRow>> {
        self.store.all_users()
    }

    // ── Wallet & history ──────────────────────────────────────────

    /// Zeros when the user has no wallet yet.
    pub fn wallet_summary(&self, user_id: &str) -> LedgerResult<WalletSummary> {
        Ok(match self.store.wallet(user_id)? {
            Some(w) => WalletSummary {
                balance: w.balance,
                total_recharge: w.total_recharge,
                total_income: w.total_income,
            },
            None => WalletSummary {
                balance: 0.0,
                total_recharge: 0.0,
                total_income: 0.0,
            },
        })
    }

    /// Newest first.
    pub fn user_transactions(&self, user_id: &str) -> LedgerResult<Vec<TxnRow>> {
        self.store.txns_for_user(user_id)
    }

    // ── Referral tree ─────────────────────────────────────────────

    pub fn team_info(&self, user_id: &str) -> LedgerResult<TeamInfo> {
        Ok(TeamInfo {
            team_size: self.store.referral_count(user_id)?,
            team_income: self.store.sum_txns(
                user_id,
                TxnKind::ReferralCommission,
                TxnStatus::Success,
            )?,
        })
    }

    pub fn team_members(&self, user_id: &str) -> LedgerResult<Vec<UserRow>> {
        self.store.referrals_of(user_id)
    }

    // ── Bank accounts ─────────────────────────────────────────────

    pub fn add_bank_account(
        &self,
        user_id: &str,
        details: NewBankAccount,
        now: Timestamp,
    ) -> LedgerResult<BankAccountRow> {
        let required = [
            &details.account_holder,
            &details.bank_name,
            &details.account_number,
            &details.ifsc,
        ];
        if required.iter().any(|f| f.trim().is_empty()) {
            return Err(LedgerError::InvalidInput(
                "account holder, bank name, account number and IFSC are required".into(),
            ));
        }
        self.require_user(user_id)?;

        let row = BankAccountRow {
            bank_account_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            account_holder: details.account_holder.trim().to_string(),
            bank_name: details.bank_name.trim().to_string(),
            account_number: details.account_number.trim().to_string(),
            ifsc: details.ifsc.trim().to_uppercase(),
            branch: details.branch.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()),
            created_at: now,
        };
        self.store.insert_bank_account(&row)?;
        Ok(row)
    }

    /// Newest first.
    pub fn bank_accounts(&self, user_id: &str) -> LedgerResult<Vec<BankAccountRow>> {
        self.store.bank_accounts_for_user(user_id)
    }
}
