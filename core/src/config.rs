use crate::{
    clock::ReferenceZone,
    error::LedgerResult,
    types::Amount,
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// One entry of the plan catalog loaded by `seed_plans`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanConfig {
    pub name: String,
    pub invest_amount: Amount,
    pub daily_income: Amount,
    pub duration_days: u32,
}

impl PlanConfig {
    pub fn total_income(&self) -> Amount {
        self.daily_income * self.duration_days as f64
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PlanCatalogFile {
    plans: Vec<PlanConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Offset east of UTC, in minutes, that defines the calendar day.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Local wall time the daily trigger fires at, "HH:MM".
    #[serde(default = "default_run_at")]
    pub run_at: String,
    /// How often the daemon loop wakes to check the trigger.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_run_at() -> String {
    "00:00".into()
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl AccrualConfig {
    pub fn zone(&self) -> LedgerResult<ReferenceZone> {
        ReferenceZone::from_offset_minutes(self.utc_offset_minutes)
    }

    pub fn run_at_time(&self) -> anyhow::Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.run_at, "%H:%M")
            .map_err(|e| anyhow::anyhow!("Invalid accrual.run_at '{}': {e}", self.run_at))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Floor for both deposits and withdrawals.
    pub min_amount: Amount,
    /// Shown to the user and stored on the withdrawal; never deducted.
    pub gst_percent: f64,
    /// Share of an approved deposit paid to the depositor's referrer.
    pub referral_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayDefaults {
    pub upi_id: String,
    #[serde(default)]
    pub qr_code_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DeskFile {
    accrual: AccrualConfig,
    payments: PaymentConfig,
    gateway: GatewayDefaults,
}

#[derive(Debug, Clone)]
pub struct DeskConfig {
    pub accrual:  AccrualConfig,
    pub payments: PaymentConfig,
    pub gateway:  GatewayDefaults,
    pub plans:    Vec<PlanConfig>,
}

impl DeskConfig {
    /// Load from the data/ directory.
    /// In tests, use DeskConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let desk_path = format!("{data_dir}/desk.json");
        let desk_content = std::fs::read_to_string(&desk_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {desk_path}: {e}"))?;
        let desk_file: DeskFile = serde_json::from_str(&desk_content)?;

        let plan_path = format!("{data_dir}/plans.json");
        let plan_content = std::fs::read_to_string(&plan_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {plan_path}: {e}"))?;
        let plan_file: PlanCatalogFile = serde_json::from_str(&plan_content)?;

        let config = Self {
            accrual: desk_file.accrual,
            payments: desk_file.payments,
            gateway: desk_file.gateway,
            plans: plan_file.plans,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.accrual.zone()?;
        self.accrual.run_at_time()?;
        if self.payments.min_amount < 0.0 {
            anyhow::bail!("payments.min_amount must not be negative");
        }
        if !(0.0..=100.0).contains(&self.payments.referral_percent) {
            anyhow::bail!("payments.referral_percent must be within 0..=100");
        }
        for plan in &self.plans {
            if plan.duration_days == 0 {
                anyhow::bail!("plan '{}' has zero duration", plan.name);
            }
            if plan.invest_amount <= 0.0 || plan.daily_income <= 0.0 {
                anyhow::bail!("plan '{}' must have positive amounts", plan.name);
            }
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self {
            accrual: AccrualConfig {
                utc_offset_minutes: 0,
                run_at: default_run_at(),
                poll_interval_secs: 1,
            },
            payments: PaymentConfig {
                min_amount: 300.0,
                gst_percent: 15.0,
                referral_percent: 10.0,
            },
            gateway: GatewayDefaults {
                upi_id: "tradeindia@upi".into(),
                qr_code_url: String::new(),
            },
            plans: vec![
                PlanConfig { name: "Plan 1".into(), invest_amount: 999.0,  daily_income: 80.0,  duration_days: 99 },
                PlanConfig { name: "Plan 2".into(), invest_amount: 3000.0, daily_income: 400.0, duration_days: 99 },
                PlanConfig { name: "Plan 3".into(), invest_amount: 5000.0, daily_income: 800.0, duration_days: 99 },
            ],
        }
    }
}
