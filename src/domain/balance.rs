//! Balance engine
//!
//! Pure computations over a bill's recorded shares: per-bill allocation
//! summaries, per-user net balances across bills, and the greedy reduction of
//! an N-way debt graph to a minimal set of settling transactions.
//!
//! Nothing here touches the database; callers pass in a consistent snapshot
//! and serialize the results directly as JSON.

use rust_decimal::Decimal;
use serde::Serialize;

use super::error::DomainError;
use super::money::{is_settled, round_money, ALLOCATION_TOLERANCE};

/// Allocation summary for a single bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillSummary {
    /// Sum of all participants' `amount_owed`.
    pub total_owed: Decimal,
    /// `total_amount - total_owed`.
    pub remaining_amount: Decimal,
    /// True when the remaining amount is zero within the 0.01 tolerance.
    pub is_fully_allocated: bool,
}

/// Compute the allocation summary for a bill.
///
/// Pure function of its inputs: calling it twice on the same unchanged input
/// yields identical output.
pub fn compute_bill_summary(
    total_amount: Decimal,
    amounts_owed: impl IntoIterator<Item = Decimal>,
) -> BillSummary {
    let total_owed: Decimal = amounts_owed.into_iter().sum();
    let remaining_amount = total_amount - total_owed;

    BillSummary {
        total_owed,
        remaining_amount,
        is_fully_allocated: is_settled(remaining_amount),
    }
}

/// Whether a user is owed money, owes money, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStatus {
    Creditor,
    Debtor,
    Balanced,
}

/// A participant row on a bill the user created. The participant may be a
/// registered user or a guest (`user_id` is None for guests).
#[derive(Debug, Clone)]
pub struct OwnedShare {
    pub participant_user_id: Option<i64>,
    pub amount_owed: Decimal,
}

/// Signed balance for a user across all bills they touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserBalance {
    /// What the user owes others (their rows on bills they participate in).
    pub total_owed: Decimal,
    /// What others owe the user (rows on bills the user created, excluding
    /// the user's own entry).
    pub total_owed_to_user: Decimal,
    /// `total_owed_to_user - total_owed`.
    pub net_balance: Decimal,
    pub status: BalanceStatus,
}

/// Compute a user's net balance.
///
/// `owned_shares` are the participant rows on bills this user created;
/// `participation_amounts` are the amounts this user is recorded as owing on
/// bills they participate in. Empty inputs yield zeros and `Balanced`.
pub fn compute_user_net_balance(
    user_id: i64,
    owned_shares: &[OwnedShare],
    participation_amounts: &[Decimal],
) -> UserBalance {
    let total_owed: Decimal = participation_amounts.iter().copied().sum();

    let total_owed_to_user: Decimal = owned_shares
        .iter()
        .filter(|share| share.participant_user_id != Some(user_id))
        .map(|share| share.amount_owed)
        .sum();

    let net_balance = total_owed_to_user - total_owed;

    let status = if net_balance > Decimal::ZERO {
        BalanceStatus::Creditor
    } else if net_balance < Decimal::ZERO {
        BalanceStatus::Debtor
    } else {
        BalanceStatus::Balanced
    };

    UserBalance {
        total_owed,
        total_owed_to_user,
        net_balance,
        status,
    }
}

/// One point-to-point transfer from the simplification walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementTransaction {
    /// Paying party (debtor).
    pub from: i64,
    /// Receiving party (creditor).
    pub to: i64,
    pub amount: Decimal,
}

/// Result of [`simplify_balances`]: the transfers plus any residual left by
/// input that did not sum to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementPlan {
    pub transactions: Vec<SettlementTransaction>,
    /// Magnitude of balance left unsettled after the walk. Above tolerance
    /// this signals inconsistent input (e.g. a bill not fully allocated),
    /// which callers may surface as a warning.
    pub residual: Decimal,
}

impl SettlementPlan {
    pub fn is_balanced(&self) -> bool {
        self.residual < ALLOCATION_TOLERANCE
    }

    /// Treat leftover balance as an error. Callers that require zero-sum
    /// input check this; others read `residual` directly.
    pub fn require_balanced(&self) -> Result<(), DomainError> {
        if self.is_balanced() {
            Ok(())
        } else {
            Err(DomainError::UnbalancedInput {
                residual: self.residual,
            })
        }
    }
}

/// Reduce a set of signed balances to a minimal sequence of transfers.
///
/// Greedy and deterministic: creditors and debtors are each sorted descending
/// by magnitude (the sort is stable, so equal amounts keep their input
/// order), then a two-pointer walk transfers `min(creditor, debtor)` at each
/// step, rounded to 2 decimal places before emission. A pointer advances when
/// its remaining amount falls below the 0.01 tolerance, so the walk always
/// terminates even on unbalanced input.
pub fn simplify_balances(
    balances: impl IntoIterator<Item = (i64, Decimal)>,
) -> SettlementPlan {
    let mut creditors: Vec<(i64, Decimal)> = Vec::new();
    let mut debtors: Vec<(i64, Decimal)> = Vec::new();

    for (party, balance) in balances {
        if balance > Decimal::ZERO {
            creditors.push((party, balance));
        } else if balance < Decimal::ZERO {
            debtors.push((party, -balance));
        }
    }

    // sort_by is stable: ties keep insertion order.
    creditors.sort_by(|a, b| b.1.cmp(&a.1));
    debtors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut transactions = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < creditors.len() && j < debtors.len() {
        let transfer = round_money(creditors[i].1.min(debtors[j].1));

        if transfer > Decimal::ZERO {
            transactions.push(SettlementTransaction {
                from: debtors[j].0,
                to: creditors[i].0,
                amount: transfer,
            });
            creditors[i].1 -= transfer;
            debtors[j].1 -= transfer;
        }

        if creditors[i].1 < ALLOCATION_TOLERANCE {
            i += 1;
        }
        if debtors[j].1 < ALLOCATION_TOLERANCE {
            j += 1;
        }
    }

    let residual: Decimal = creditors[i..]
        .iter()
        .chain(debtors[j..].iter())
        .map(|(_, remaining)| (*remaining).max(Decimal::ZERO))
        .sum();

    SettlementPlan {
        transactions,
        residual,
    }
}
