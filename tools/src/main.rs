//! payout-runner: headless host for the daily ROI accrual job.
//!
//! Usage:
//!   payout-runner --db ledger.db --once
//!   payout-runner --db ledger.db --daemon
//!   payout-runner --db ledger.db --seed-plans
//!   payout-runner --db ledger.db --ipc-mode
//!   payout-runner --db ledger.db --once --at 2026-05-01T00:05:00Z

use anyhow::Result;
use chrono::{DateTime, Utc};
use payout_core::{
    accrual::AccrualReport,
    clock::{Clock, ManualClock, SystemClock},
    command::{AdminCommand, CommandOutcome},
    config::DeskConfig,
    desk::Desk,
    error::LedgerError,
    scheduler::{DailyTrigger, Scheduler},
    store::{AccrualRunRow, LedgerStore, PlanRow, TxnRow},
};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    RunAccrual,
    Command { command: AdminCommand },
    Quit,
}

#[derive(serde::Serialize)]
struct UiState {
    users:               usize,
    active_investments:  i64,
    plans:               Vec<PlanRow>,
    pending:             Vec<TxnRow>,
    recent_runs:         Vec<AccrualRunRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome:             Option<CommandOutcome>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    // --once wins over --daemon; a single run is the default.
    let once = args.iter().any(|a| a == "--once");
    let daemon = !once && args.iter().any(|a| a == "--daemon");
    let seed = args.iter().any(|a| a == "--seed-plans");
    let recent = parse_arg(&args, "--recent", 5u32);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    let config = DeskConfig::load(data_dir)?;

    if !ipc_mode {
        println!("payout-runner");
        println!("  db:          {db}");
        println!("  data_dir:    {data_dir}");
        println!("  utc offset:  {} min", config.accrual.utc_offset_minutes);
        println!("  run at:      {}", config.accrual.run_at);
        println!();
    }

    // in_memory() is shared-cache, so the accrual job's own connection
    // sees the same database as the desk.
    let store = if db == ":memory:" {
        LedgerStore::in_memory()?
    } else {
        LedgerStore::open(db)?
    };
    store.migrate()?;
    let desk = Desk::new(store, config);
    // --at pins the clock for replaying a missed day.
    let clock: Box<dyn Clock> = match args.windows(2).find(|w| w[0] == "--at") {
        Some(w) => {
            let at: DateTime<Utc> = w[1]
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid --at '{}': {e}", w[1]))?;
            Box::new(ManualClock::new(at))
        }
        None => Box::new(SystemClock),
    };

    if seed {
        match desk.seed_plans(clock.now()) {
            Ok(plans) => log::info!("seeded {} plans", plans.len()),
            Err(LedgerError::PlansAlreadySeeded) => log::info!("plans already seeded"),
            Err(e) => return Err(e.into()),
        }
    }

    if ipc_mode {
        run_ipc_loop(&desk, clock.as_ref(), recent)?;
    } else if daemon {
        run_daemon(&desk, clock.as_ref())?;
    } else {
        let report = desk.run_daily_accrual(clock.now())?;
        print_summary(&desk, &report, recent)?;
    }

    Ok(())
}

fn run_daemon(desk: &Desk, clock: &dyn Clock) -> Result<()> {
    let accrual = &desk.config().accrual;
    let trigger = DailyTrigger::new(accrual.zone()?, accrual.run_at_time()?);
    let mut scheduler = Scheduler::new(trigger);
    scheduler.register(Box::new(desk.accrual_job()?));

    // Never set: the daemon runs until the process is killed.
    let stop = AtomicBool::new(false);
    let poll = Duration::from_secs(accrual.poll_interval_secs.max(1));
    scheduler.run_until(clock, &stop, poll);
    Ok(())
}

fn run_ipc_loop(desk: &Desk, clock: &dyn Clock, recent: u32) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_error(&mut stdout, &e.to_string())?;
                continue;
            }
        };

        let outcome = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => Ok(None),
            IpcCommand::RunAccrual => desk
                .apply_command(AdminCommand::RunAccrual, clock.now())
                .map(Some),
            IpcCommand::Command { command } => desk.apply_command(command, clock.now()).map(Some),
        };
        match outcome {
            Ok(outcome) => {
                let state = build_ui_state(desk, recent, outcome)?;
                writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
                stdout.flush()?;
            }
            // Rejected operations are reported to the caller, not fatal.
            Err(e) => write_error(&mut stdout, &e.to_string())?,
        }
    }
    Ok(())
}

fn write_error(out: &mut impl Write, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(out, "{}", err_json)?;
    out.flush()?;
    Ok(())
}

fn build_ui_state(desk: &Desk, recent: u32, outcome: Option<CommandOutcome>) -> Result<UiState> {
    Ok(UiState {
        users: desk.list_users()?.len(),
        active_investments: desk.store.active_investment_count()?,
        plans: desk.active_plans()?,
        pending: desk.pending_transactions()?,
        recent_runs: desk.store.recent_accrual_runs(recent)?,
        outcome,
    })
}

fn print_summary(desk: &Desk, report: &AccrualReport, recent: u32) -> Result<()> {
    println!("=== ACCRUAL RUN ===");
    println!("  run_id:           {}", report.run_id);
    println!("  day start:        {}", report.day_start);
    println!("  candidates:       {}", report.candidates);
    println!("  credited:         {}", report.credited);
    println!("  already credited: {}", report.already_credited);
    println!("  missing wallet:   {}", report.missing_wallet);
    println!("  failed:           {}", report.failed);
    println!("  matured:          {}", report.matured);
    println!("  retired:          {}", report.retired);
    println!("  total paid:       {:.2}", report.total_paid);

    println!();
    println!("=== RECENT RUNS ===");
    let runs = desk.store.recent_accrual_runs(recent).unwrap_or_default();
    if runs.is_empty() {
        println!("  (No runs recorded)");
    } else {
        for r in &runs {
            println!(
                "  {} | day {} | credited {}/{} | paid {:.2}{}",
                r.started_at.format("%Y-%m-%d %H:%M:%S"),
                r.day_start.format("%Y-%m-%d"),
                r.credited,
                r.candidates,
                r.total_paid,
                if r.cancelled { " | cancelled" } else { "" }
            );
        }
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
