//! bill_splitter library
//!
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod email;
pub mod error;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{
    compute_bill_summary, compute_user_net_balance, simplify_balances, BalanceStatus, BillSummary,
    DomainError, Identity, SettlementPlan, SettlementTransaction, UserBalance,
};
