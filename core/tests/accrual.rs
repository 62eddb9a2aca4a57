//! Daily ROI accrual tests.

use payout_core::{
    accrual::{run_daily_accrual, CancelToken},
    clock::ReferenceZone,
    desk::Desk,
    error::LedgerError,
    event::{LedgerEvent, SkipReason},
    store::{InvestmentRow, LedgerStore, PlanRow},
    types::{Timestamp, TxnKind, TxnStatus},
};

fn ts(s: &str) -> Timestamp {
    s.parse().unwrap()
}

fn plan_row(created_at: Timestamp) -> PlanRow {
    PlanRow {
        plan_id: "plan-1".into(),
        name: "Plan 1".into(),
        invest_amount: 999.0,
        daily_income: 80.0,
        duration_days: 99,
        total_income: 7920.0,
        is_active: true,
        created_at,
    }
}

fn investment(
    id: &str,
    user_id: &str,
    days_completed: u32,
    created_at: Timestamp,
) -> InvestmentRow {
    InvestmentRow {
        investment_id: id.into(),
        user_id: user_id.into(),
        plan_id: "plan-1".into(),
        invest_amount: 999.0,
        daily_income: 80.0,
        duration_days: 99,
        total_income: 7920.0,
        days_completed,
        is_active: true,
        last_credit_at: None,
        created_at,
    }
}

/// A registered user with one active 80/day, 99-day investment.
fn desk_with_investment(days_completed: u32) -> (Desk, String) {
    let t0 = ts("2026-05-01T09:00:00Z");
    let desk = Desk::in_memory_test().unwrap();
    let user = desk.register_user("Asha", "9000000001", None, t0).unwrap();
    desk.store.insert_plan(&plan_row(t0)).unwrap();
    desk.store
        .insert_investment(&investment("inv-1", &user.user_id, days_completed, t0))
        .unwrap();
    (desk, user.user_id)
}

#[test]
fn first_credit_updates_wallet_investment_and_ledger() {
    let (desk, user_id) = desk_with_investment(0);
    let now = ts("2026-05-02T00:00:05Z");

    let report = desk.run_daily_accrual(now).unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.credited, 1);
    assert_eq!(report.total_paid, 80.0);

    let wallet = desk.wallet_summary(&user_id).unwrap();
    assert_eq!(wallet.balance, 80.0);
    assert_eq!(wallet.total_income, 80.0);
    assert_eq!(wallet.total_recharge, 0.0);

    let inv = desk.store.investment("inv-1").unwrap().unwrap();
    assert_eq!(inv.days_completed, 1);
    assert!(inv.is_active);
    assert_eq!(inv.last_credit_at, Some(now));

    let txns = desk.user_transactions(&user_id).unwrap();
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0].kind, TxnKind::RoiPayout);
    assert_eq!(txns[0].status, TxnStatus::Success);
    assert_eq!(txns[0].amount, 80.0);
    assert_eq!(txns[0].meta["investment_id"], "inv-1");
    assert_eq!(txns[0].meta["day"], 1);
}

#[test]
fn final_day_credit_matures_the_investment() {
    let (desk, user_id) = desk_with_investment(98);

    let report = desk.run_daily_accrual(ts("2026-05-02T00:00:05Z")).unwrap();
    assert_eq!(report.credited, 1);
    assert_eq!(report.matured, 1);

    let inv = desk.store.investment("inv-1").unwrap().unwrap();
    assert_eq!(inv.days_completed, 99);
    assert!(!inv.is_active);
    assert_eq!(desk.wallet_summary(&user_id).unwrap().balance, 80.0);

    let matured = desk.store.events_of_type("investment_matured").unwrap();
    assert_eq!(matured.len(), 1);

    // Matured investments are no longer candidates.
    let next = desk.run_daily_accrual(ts("2026-05-03T00:00:05Z")).unwrap();
    assert_eq!(next.candidates, 0);
    assert_eq!(desk.wallet_summary(&user_id).unwrap().balance, 80.0);
}

#[test]
fn accrual_job_of_an_in_memory_desk_sees_the_desk_data() {
    let (desk, user_id) = desk_with_investment(0);
    let job = desk.accrual_job().unwrap();

    let report = job.run(ts("2026-05-02T00:00:05Z")).unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.credited, 1);
    assert_eq!(desk.wallet_summary(&user_id).unwrap().balance, 80.0);
    assert_eq!(desk.store.investment("inv-1").unwrap().unwrap().days_completed, 1);

    // Two in-memory desks never share data.
    let other = Desk::in_memory_test().unwrap();
    assert_eq!(other.store.active_investment_count().unwrap(), 0);
}

#[test]
fn second_run_on_the_same_day_credits_nothing() {
    let (desk, user_id) = desk_with_investment(0);

    let first = desk.run_daily_accrual(ts("2026-05-02T00:00:05Z")).unwrap();
    let second = desk.run_daily_accrual(ts("2026-05-02T23:59:59Z")).unwrap();

    assert_eq!(first.credited, 1);
    assert_eq!(second.credited, 0);
    assert_eq!(second.already_credited, 1);
    assert_eq!(desk.wallet_summary(&user_id).unwrap().balance, 80.0);
    assert_eq!(desk.store.investment("inv-1").unwrap().unwrap().days_completed, 1);
    assert_eq!(desk.user_transactions(&user_id).unwrap().len(), 1);
}

#[test]
fn each_new_day_credits_once_more() {
    let (desk, user_id) = desk_with_investment(0);

    for day in ["2026-05-02", "2026-05-03", "2026-05-04"] {
        let report = desk
            .run_daily_accrual(ts(&format!("{day}T00:10:00Z")))
            .unwrap();
        assert_eq!(report.credited, 1, "day {day}");
    }

    let wallet = desk.wallet_summary(&user_id).unwrap();
    assert_eq!(wallet.balance, 240.0);
    assert_eq!(wallet.total_income, 240.0);
    assert_eq!(desk.store.investment("inv-1").unwrap().unwrap().days_completed, 3);
}

#[test]
fn missed_days_are_not_back_filled() {
    let (desk, user_id) = desk_with_investment(0);

    desk.run_daily_accrual(ts("2026-05-02T00:10:00Z")).unwrap();
    // Nothing ran on the 3rd or 4th.
    desk.run_daily_accrual(ts("2026-05-05T00:10:00Z")).unwrap();

    assert_eq!(desk.store.investment("inv-1").unwrap().unwrap().days_completed, 2);
    assert_eq!(desk.wallet_summary(&user_id).unwrap().balance, 160.0);
}

#[test]
fn investment_without_wallet_is_skipped_and_recorded() {
    let t0 = ts("2026-05-01T09:00:00Z");
    let desk = Desk::in_memory_test().unwrap();
    desk.store.insert_plan(&plan_row(t0)).unwrap();
    // Inserted below the desk, so no wallet is created.
    desk.store
        .insert_user("orphan", "Orphan", "9000000002", None, None, t0)
        .unwrap();
    desk.store
        .insert_investment(&investment("inv-orphan", "orphan", 0, t0))
        .unwrap();

    let report = desk.run_daily_accrual(ts("2026-05-02T00:00:05Z")).unwrap();
    assert_eq!(report.credited, 0);
    assert_eq!(report.missing_wallet, 1);
    assert_eq!(report.failed, 0);

    let inv = desk.store.investment("inv-orphan").unwrap().unwrap();
    assert_eq!(inv.days_completed, 0);
    assert!(inv.is_active);
    assert!(desk.store.wallet("orphan").unwrap().is_none());

    let run = desk.store.accrual_run(&report.run_id).unwrap().unwrap();
    assert_eq!(run.missing_wallet, 1);

    let skipped = desk.store.events_of_type("investment_skipped").unwrap();
    assert_eq!(skipped.len(), 1);
    assert!(matches!(
        skipped[0].decode().unwrap(),
        LedgerEvent::InvestmentSkipped { reason: SkipReason::MissingWallet, .. }
    ));
}

#[test]
fn stale_active_investment_is_retired_without_credit() {
    let (desk, user_id) = desk_with_investment(99);

    let report = desk.run_daily_accrual(ts("2026-05-02T00:00:05Z")).unwrap();
    assert_eq!(report.credited, 0);
    assert_eq!(report.retired, 1);

    let inv = desk.store.investment("inv-1").unwrap().unwrap();
    assert!(!inv.is_active);
    assert_eq!(inv.days_completed, 99);
    assert_eq!(desk.wallet_summary(&user_id).unwrap().balance, 0.0);
}

#[test]
fn credit_never_touches_recharge_and_matches_payout_rows() {
    let (desk, user_id) = desk_with_investment(0);
    desk.admin_credit(&user_id, 500.0, ts("2026-05-01T10:00:00Z")).unwrap();
    let before = desk.wallet_summary(&user_id).unwrap();

    desk.run_daily_accrual(ts("2026-05-02T00:10:00Z")).unwrap();
    desk.run_daily_accrual(ts("2026-05-03T00:10:00Z")).unwrap();

    let after = desk.wallet_summary(&user_id).unwrap();
    let paid = desk
        .store
        .sum_txns(&user_id, TxnKind::RoiPayout, TxnStatus::Success)
        .unwrap();
    assert_eq!(paid, 160.0);
    assert_eq!(after.balance - before.balance, paid);
    assert_eq!(after.total_income - before.total_income, paid);
    assert_eq!(after.total_recharge, before.total_recharge);
}

#[test]
fn calendar_day_follows_the_reference_zone() {
    let (desk, user_id) = desk_with_investment(0);
    let ist = ReferenceZone::from_offset_minutes(330).unwrap();

    // 23:30 IST on 1 May, then 00:15 IST on 2 May: two local days.
    let late = ts("2026-05-01T18:00:00Z");
    let early = ts("2026-05-01T18:45:00Z");
    let first = run_daily_accrual(&desk.store, ist, late, &CancelToken::new()).unwrap();
    let second = run_daily_accrual(&desk.store, ist, early, &CancelToken::new()).unwrap();
    assert_eq!(first.credited, 1);
    assert_eq!(second.credited, 1);
    assert_eq!(second.day_start, ts("2026-05-01T18:30:00Z"));

    // Same instants in UTC are one day.
    let (utc_desk, utc_user) = desk_with_investment(0);
    let zone = ReferenceZone::utc();
    run_daily_accrual(&utc_desk.store, zone, late, &CancelToken::new()).unwrap();
    let again = run_daily_accrual(&utc_desk.store, zone, early, &CancelToken::new()).unwrap();
    assert_eq!(again.credited, 0);

    assert_eq!(desk.wallet_summary(&user_id).unwrap().balance, 160.0);
    assert_eq!(utc_desk.wallet_summary(&utc_user).unwrap().balance, 80.0);
}

#[test]
fn daily_claim_is_a_single_winner_compare_and_swap() {
    let (desk, _) = desk_with_investment(0);
    let day_start = ts("2026-05-02T00:00:00Z");
    let now = ts("2026-05-02T00:00:05Z");

    let won = desk.store.claim_daily_credit("inv-1", day_start, now).unwrap();
    assert_eq!(won.map(|c| c.days_completed), Some(1));
    assert!(desk.store.claim_daily_credit("inv-1", day_start, now).unwrap().is_none());
}

#[test]
fn runs_on_separate_connections_share_the_guard() {
    let uri = format!("file:accrual_{}?mode=memory&cache=shared", uuid::Uuid::new_v4().simple());
    let t0 = ts("2026-05-01T09:00:00Z");
    let store = LedgerStore::open(&uri).unwrap();
    store.migrate().unwrap();
    let desk = Desk::new(store, payout_core::config::DeskConfig::default_test());
    let user = desk.register_user("Ravi", "9000000003", None, t0).unwrap();
    desk.store.insert_plan(&plan_row(t0)).unwrap();
    desk.store
        .insert_investment(&investment("inv-1", &user.user_id, 0, t0))
        .unwrap();

    let now = ts("2026-05-02T00:00:05Z");
    let a = desk.accrual_job().unwrap().run(now).unwrap();
    let b = desk.accrual_job().unwrap().run(now).unwrap();

    assert_eq!(a.credited + b.credited, 1);
    assert_eq!(desk.wallet_summary(&user.user_id).unwrap().balance, 80.0);
    assert_eq!(desk.store.recent_accrual_runs(10).unwrap().len(), 2);
}

#[test]
fn concurrent_runs_credit_each_investment_once() {
    let path = std::env::temp_dir().join(format!("accrual-{}.db", uuid::Uuid::new_v4().simple()));
    let path = path.to_string_lossy().into_owned();
    let t0 = ts("2026-05-01T09:00:00Z");
    {
        let store = LedgerStore::open(&path).unwrap();
        store.migrate().unwrap();
        let desk = Desk::new(store, payout_core::config::DeskConfig::default_test());
        desk.store.insert_plan(&plan_row(t0)).unwrap();
        for i in 0..20 {
            let user = desk
                .register_user(&format!("user {i}"), &format!("91000000{i:02}"), None, t0)
                .unwrap();
            desk.store
                .insert_investment(&investment(&format!("inv-{i}"), &user.user_id, 0, t0))
                .unwrap();
        }
    }

    let now = ts("2026-05-02T00:00:05Z");
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            std::thread::spawn(move || {
                let store = LedgerStore::open(&path).unwrap();
                run_daily_accrual(&store, ReferenceZone::utc(), now, &CancelToken::new()).unwrap()
            })
        })
        .collect();
    let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let credited: u32 = reports.iter().map(|r| r.credited).sum();
    let failed: u32 = reports.iter().map(|r| r.failed).sum();
    assert_eq!(credited, 20);
    assert_eq!(failed, 0);

    let store = LedgerStore::open(&path).unwrap();
    assert_eq!(store.txn_count_by_kind(TxnKind::RoiPayout).unwrap(), 20);
    for user in store.all_users().unwrap() {
        assert_eq!(store.wallet(&user.user_id).unwrap().unwrap().balance, 80.0);
    }
    drop(store);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }
}

#[test]
fn admin_credit_to_missing_wallet_is_an_error() {
    let desk = Desk::in_memory_test().unwrap();
    let err = desk
        .admin_credit("nobody", 100.0, ts("2026-05-01T09:00:00Z"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::MissingWallet { .. }));
}
