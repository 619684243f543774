//! Domain layer
//!
//! Pure types and computations: no database, no HTTP.

pub mod balance;
pub mod error;
pub mod identity;
pub mod money;

pub use balance::{
    compute_bill_summary, compute_user_net_balance, simplify_balances, BalanceStatus, BillSummary,
    OwnedShare, SettlementPlan, SettlementTransaction, UserBalance,
};
pub use error::DomainError;
pub use identity::{AccountType, GuestAccess, Identity, RegisteredUser};
pub use money::{is_settled, round_money, ALLOCATION_TOLERANCE};
