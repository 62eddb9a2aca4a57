//! Desk operation tests.

use payout_core::{
    command::{AdminCommand, CommandOutcome},
    desk::Desk,
    error::LedgerError,
    event::LedgerEvent,
    types::{Timestamp, TxnKind, TxnStatus},
};

fn ts(s: &str) -> Timestamp {
    s.parse().unwrap()
}

#[test]
fn registration_creates_wallet_and_unique_code() {
    let desk = Desk::in_memory_test().unwrap();
    let now = ts("2026-05-01T09:00:00Z");

    let asha = desk.register_user("Asha", "9876543210", None, now).unwrap();
    let code = asha.referral_code.clone().unwrap();
    assert!(code.starts_with("3210"));
    assert!(desk.store.wallet(&asha.user_id).unwrap().is_some());

    // Same mobile tail, different code.
    let ravi = desk.register_user("Ravi", "9111113210", None, now).unwrap();
    assert_ne!(ravi.referral_code, asha.referral_code);

    let registered = desk.store.events_of_type("user_registered").unwrap();
    assert_eq!(registered.len(), 2);
}

#[test]
fn duplicate_mobile_and_unknown_code_are_rejected() {
    let desk = Desk::in_memory_test().unwrap();
    let now = ts("2026-05-01T09:00:00Z");
    desk.register_user("Asha", "9000000001", None, now).unwrap();

    assert!(matches!(
        desk.register_user("Other", "9000000001", None, now),
        Err(LedgerError::DuplicateMobile { .. })
    ));
    assert!(matches!(
        desk.register_user("Ravi", "9000000002", Some("NOPE"), now),
        Err(LedgerError::InvalidReferralCode { .. })
    ));
    assert_eq!(desk.list_users().unwrap().len(), 1);
}

#[test]
fn referral_code_matches_regardless_of_case() {
    let desk = Desk::in_memory_test().unwrap();
    let now = ts("2026-05-01T09:00:00Z");
    let asha = desk.register_user("Asha", "9876543210", None, now).unwrap();
    let code = asha.referral_code.clone().unwrap();

    let typed = format!("  {}  ", code.to_lowercase());
    let ravi = desk.register_user("Ravi", "9000000002", Some(&typed), now).unwrap();
    assert_eq!(ravi.referred_by.as_deref(), Some(asha.user_id.as_str()));
    assert_eq!(desk.team_info(&asha.user_id).unwrap().team_size, 1);
}

#[test]
fn team_lists_direct_referrals_only() {
    let desk = Desk::in_memory_test().unwrap();
    let now = ts("2026-05-01T09:00:00Z");
    let root = desk.register_user("Root", "9000000001", None, now).unwrap();
    let root_code = root.referral_code.clone().unwrap();
    let child = desk
        .register_user("Child", "9000000002", Some(&root_code), now)
        .unwrap();
    let child_code = child.referral_code.clone().unwrap();
    desk.register_user("Grandchild", "9000000003", Some(&child_code), now)
        .unwrap();

    let team = desk.team_members(&root.user_id).unwrap();
    assert_eq!(team.len(), 1);
    assert_eq!(team[0].user_id, child.user_id);
    assert_eq!(desk.team_info(&child.user_id).unwrap().team_size, 1);
}

#[test]
fn admin_credit_is_recorded_as_a_transaction() {
    let desk = Desk::in_memory_test().unwrap();
    let now = ts("2026-05-01T09:00:00Z");
    let user = desk.register_user("Asha", "9000000001", None, now).unwrap();

    assert_eq!(desk.admin_credit(&user.user_id, 250.0, now).unwrap(), 250.0);
    assert_eq!(desk.admin_credit(&user.user_id, 50.0, now).unwrap(), 300.0);
    assert!(matches!(
        desk.admin_credit(&user.user_id, -5.0, now),
        Err(LedgerError::InvalidInput(_))
    ));

    let credited = desk
        .store
        .sum_txns(&user.user_id, TxnKind::AdminCredit, TxnStatus::Success)
        .unwrap();
    assert_eq!(credited, 300.0);
    // Admin credit is neither recharge nor income.
    let wallet = desk.wallet_summary(&user.user_id).unwrap();
    assert_eq!(wallet.total_recharge, 0.0);
    assert_eq!(wallet.total_income, 0.0);
}

#[test]
fn commands_drive_the_desk_from_json() {
    let desk = Desk::in_memory_test().unwrap();
    let now = ts("2026-05-01T09:00:00Z");
    let user = desk.register_user("Asha", "9000000001", None, now).unwrap();

    let seed: AdminCommand = serde_json::from_str(r#"{"cmd":"seed_plans"}"#).unwrap();
    assert!(matches!(
        desk.apply_command(seed, now).unwrap(),
        CommandOutcome::PlansSeeded { count } if count == desk.config().plans.len()
    ));

    let deposit = desk
        .create_deposit(&user.user_id, 400.0, "UTR77", "asha@upi", now)
        .unwrap();
    let approve = AdminCommand::ApproveDeposit { txn_id: deposit.txn_id.clone() };
    match desk.apply_command(approve, now).unwrap() {
        CommandOutcome::Settled { txn_id, status } => {
            assert_eq!(txn_id, deposit.txn_id);
            assert_eq!(status, TxnStatus::Success);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let block = AdminCommand::ToggleUserBlock { user_id: user.user_id.clone() };
    assert!(matches!(
        desk.apply_command(block, now).unwrap(),
        CommandOutcome::UserBlocked { blocked: true, .. }
    ));
    assert!(desk.store.user(&user.user_id).unwrap().unwrap().is_blocked);

    match desk.apply_command(AdminCommand::RunAccrual, ts("2026-05-02T00:00:05Z")).unwrap() {
        CommandOutcome::Accrual(report) => assert_eq!(report.candidates, 0),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn settings_default_from_config_then_update() {
    let desk = Desk::in_memory_test().unwrap();

    let initial = desk.settings().unwrap();
    assert_eq!(initial.upi_id, desk.config().gateway.upi_id);

    let updated = desk.update_settings(" pay@upi ", "https://qr.example/1.png").unwrap();
    assert_eq!(updated.upi_id, "pay@upi");
    assert_eq!(desk.settings().unwrap(), updated);

    assert!(desk.update_settings("", "").is_err());
}

#[test]
fn event_log_explains_a_referral_payout() {
    let desk = Desk::in_memory_test().unwrap();
    let now = ts("2026-05-01T09:00:00Z");
    let referrer = desk.register_user("Asha", "9000000001", None, now).unwrap();
    let code = referrer.referral_code.clone().unwrap();
    let user = desk.register_user("Ravi", "9000000002", Some(&code), now).unwrap();
    let deposit = desk
        .create_deposit(&user.user_id, 1000.0, "UTR5", "ravi@upi", now)
        .unwrap();
    desk.approve_deposit(&deposit.txn_id, now).unwrap();

    let paid = desk.store.events_of_type("referral_commission_paid").unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].source, "desk");
    assert_eq!(
        paid[0].decode().unwrap(),
        LedgerEvent::ReferralCommissionPaid {
            referrer_id: referrer.user_id,
            referred_user_id: user.user_id,
            amount: 100.0,
        }
    );
}
