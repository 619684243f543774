//! Bill and participant endpoints

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    compute_bill_summary, simplify_balances, BillSummary, Identity, SettlementTransaction,
};
use crate::error::AppError;
use crate::store::bills::{Bill, BillListItem, NewBill, Participant, ParticipantInput};
use crate::store::BillStore;

use super::AppState;

/// Party id standing in for the bill creator in settlement plans when the
/// creator has no participant row of their own. Real participant ids start
/// at 1.
pub const CREATOR_PARTY: i64 = 0;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BillDetailResponse {
    #[serde(flatten)]
    pub bill: Bill,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Serialize)]
pub struct BillListResponse {
    pub bills: Vec<BillListItem>,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
    pub amount_owed: Decimal,
}

#[derive(Debug, Serialize)]
pub struct AddParticipantResponse {
    pub participant_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParticipantRequest {
    pub amount_owed: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub bill_id: i64,
    pub total_amount: Decimal,
    #[serde(flatten)]
    pub summary: BillSummary,
}

#[derive(Debug, Serialize)]
pub struct SettlementParty {
    pub party: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SettlementsResponse {
    pub bill_id: i64,
    pub parties: Vec<SettlementParty>,
    pub transactions: Vec<SettlementTransaction>,
    pub is_balanced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual: Option<Decimal>,
}

// =========================================================================
// Access helpers
// =========================================================================

fn registered_user_id(identity: &Identity) -> Result<i64, AppError> {
    identity
        .as_registered()
        .map(|user| user.id)
        .ok_or(AppError::AuthenticationRequired)
}

async fn load_bill(store: &BillStore, bill_id: i64) -> Result<Bill, AppError> {
    store.get_bill_by_id(bill_id).await?.ok_or(AppError::BillNotFound)
}

/// Load a bill and require the caller to be its creator.
async fn load_owned_bill(
    store: &BillStore,
    bill_id: i64,
    user_id: i64,
) -> Result<Bill, AppError> {
    let bill = load_bill(store, bill_id).await?;
    if bill.created_by != user_id {
        return Err(AppError::Forbidden(
            "Only the bill creator can perform this action".to_string(),
        ));
    }
    Ok(bill)
}

/// Require the caller to be the bill's creator or one of its registered
/// participants.
fn require_involvement(
    bill: &Bill,
    participants: &[Participant],
    user_id: i64,
) -> Result<(), AppError> {
    let involved = bill.created_by == user_id
        || participants.iter().any(|p| p.user_id == Some(user_id));
    if !involved {
        return Err(AppError::Forbidden(
            "You are not part of this bill".to_string(),
        ));
    }
    Ok(())
}

// =========================================================================
// POST /bills
// =========================================================================

/// Create a bill
pub async fn create_bill(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<Bill>), AppError> {
    let user_id = registered_user_id(&identity)?;

    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidRequest("Title is required".to_string()));
    }

    let new_bill = NewBill {
        title: title.to_string(),
        description: request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        total_amount: request.total_amount,
    };

    let bills = BillStore::new(state.pool.clone());
    let bill = bills.create_bill(user_id, &new_bill).await?;

    Ok((StatusCode::CREATED, Json(bill)))
}

// =========================================================================
// GET /bills
// =========================================================================

/// List the caller's bills with participant aggregates
pub async fn list_bills(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<BillListResponse>, AppError> {
    let user_id = registered_user_id(&identity)?;

    let bills = BillStore::new(state.pool.clone());
    let items = bills.get_user_bills(user_id).await?;

    Ok(Json(BillListResponse { bills: items }))
}

// =========================================================================
// GET /bills/:bill_id
// =========================================================================

/// Bill details with participants
pub async fn get_bill(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(bill_id): Path<i64>,
) -> Result<Json<BillDetailResponse>, AppError> {
    let user_id = registered_user_id(&identity)?;

    let bills = BillStore::new(state.pool.clone());
    let bill = load_bill(&bills, bill_id).await?;
    let participants = bills.get_participants(bill_id).await?;

    require_involvement(&bill, &participants, user_id)?;

    Ok(Json(BillDetailResponse { bill, participants }))
}

// =========================================================================
// GET /bills/:bill_id/summary
// =========================================================================

/// Allocation summary for a bill
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(bill_id): Path<i64>,
) -> Result<Json<SummaryResponse>, AppError> {
    let user_id = registered_user_id(&identity)?;

    let bills = BillStore::new(state.pool.clone());
    let bill = load_bill(&bills, bill_id).await?;
    let participants = bills.get_participants(bill_id).await?;

    require_involvement(&bill, &participants, user_id)?;

    let summary = compute_bill_summary(
        bill.total_amount,
        participants.iter().map(|p| p.amount_owed),
    );

    Ok(Json(SummaryResponse {
        bill_id,
        total_amount: bill.total_amount,
        summary,
    }))
}

// =========================================================================
// GET /bills/:bill_id/settlements
// =========================================================================

/// Settlement plan for a bill: every participant owes the creator their
/// share, and the plan reduces those debts to direct transfers.
pub async fn get_settlements(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(bill_id): Path<i64>,
) -> Result<Json<SettlementsResponse>, AppError> {
    let user_id = registered_user_id(&identity)?;

    let bills = BillStore::new(state.pool.clone());
    let bill = load_bill(&bills, bill_id).await?;
    let participants = bills.get_participants(bill_id).await?;

    require_involvement(&bill, &participants, user_id)?;

    // The creator's own participant row records their share of the bill, not
    // a debt to themself, so it stays out of the balance set.
    let creator_party = participants
        .iter()
        .find(|p| p.user_id == Some(bill.created_by))
        .map(|p| p.id)
        .unwrap_or(CREATOR_PARTY);

    let mut balances: Vec<(i64, Decimal)> = Vec::new();
    let mut owed_total = Decimal::ZERO;
    for participant in &participants {
        if participant.user_id == Some(bill.created_by) {
            continue;
        }
        balances.push((participant.id, -participant.amount_owed));
        owed_total += participant.amount_owed;
    }
    balances.insert(0, (creator_party, owed_total));

    let plan = simplify_balances(balances);

    let mut parties: Vec<SettlementParty> = participants
        .iter()
        .map(|p| SettlementParty {
            party: p.id,
            name: p.name.clone(),
        })
        .collect();
    if creator_party == CREATOR_PARTY {
        parties.insert(
            0,
            SettlementParty {
                party: CREATOR_PARTY,
                name: bill.creator_name.clone(),
            },
        );
    }

    let is_balanced = plan.is_balanced();
    if let Err(warning) = plan.require_balanced() {
        tracing::warn!(bill_id, %warning, "settlement balances did not sum to zero");
    }

    Ok(Json(SettlementsResponse {
        bill_id,
        parties,
        transactions: plan.transactions,
        is_balanced,
        residual: if is_balanced { None } else { Some(plan.residual) },
    }))
}

// =========================================================================
// POST /bills/:bill_id/participants
// =========================================================================

/// Add a participant (creator only)
pub async fn add_participant(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(bill_id): Path<i64>,
    Json(request): Json<AddParticipantRequest>,
) -> Result<(StatusCode, Json<AddParticipantResponse>), AppError> {
    let user_id = registered_user_id(&identity)?;

    let bills = BillStore::new(state.pool.clone());
    load_owned_bill(&bills, bill_id, user_id).await?;

    let input = match (request.user_id, request.guest_name, request.guest_email) {
        (Some(user_id), _, _) => ParticipantInput::Registered { user_id },
        (None, Some(name), Some(email)) => ParticipantInput::Guest { name, email },
        _ => {
            return Err(AppError::InvalidRequest(
                "Provide either user_id or guest_name and guest_email".to_string(),
            ))
        }
    };

    let participant_id = bills
        .add_participant(bill_id, &input, request.amount_owed)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddParticipantResponse { participant_id }),
    ))
}

// =========================================================================
// PATCH /participants/:participant_id
// =========================================================================

/// Update a participant's owed amount (creator only)
pub async fn update_participant(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(participant_id): Path<i64>,
    Json(request): Json<UpdateParticipantRequest>,
) -> Result<StatusCode, AppError> {
    let user_id = registered_user_id(&identity)?;

    let bills = BillStore::new(state.pool.clone());
    let (_, created_by) = bills
        .participant_bill(participant_id)
        .await?
        .ok_or(AppError::ParticipantNotFound)?;

    if created_by != user_id {
        return Err(AppError::Forbidden(
            "Only the bill creator can perform this action".to_string(),
        ));
    }

    bills
        .update_participant_amount(participant_id, request.amount_owed)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// DELETE /participants/:participant_id
// =========================================================================

/// Remove a participant (creator only)
pub async fn remove_participant(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(participant_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let user_id = registered_user_id(&identity)?;

    let bills = BillStore::new(state.pool.clone());
    let (_, created_by) = bills
        .participant_bill(participant_id)
        .await?
        .ok_or(AppError::ParticipantNotFound)?;

    if created_by != user_id {
        return Err(AppError::Forbidden(
            "Only the bill creator can perform this action".to_string(),
        ));
    }

    bills.remove_participant(participant_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// DELETE /bills/:bill_id
// =========================================================================

/// Deactivate a bill (creator only, soft delete)
pub async fn delete_bill(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(bill_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let user_id = registered_user_id(&identity)?;

    let bills = BillStore::new(state.pool.clone());
    load_owned_bill(&bills, bill_id, user_id).await?;

    bills.deactivate_bill(bill_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
