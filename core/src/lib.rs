//! payout-core: ledger, daily ROI accrual and desk operations for the
//! investment platform.

pub mod accrual;
pub mod clock;
pub mod command;
pub mod config;
pub mod desk;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod store;
pub mod types;
