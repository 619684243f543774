//! Guest access endpoints
//!
//! Non-registered participants reach their bill through a bill code and
//! email, time-limited and scoped to that one bill.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::SessionStore;
use crate::domain::Identity;
use crate::error::AppError;
use crate::store::bills::{Bill, Participant};
use crate::store::{BillStore, GuestStore};

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct RequestAccessRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bill_code: String,
}

#[derive(Debug, Serialize)]
pub struct RequestAccessResponse {
    pub bill_code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub email: String,
    pub bill_code: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub token: String,
    pub bill_code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GuestBillResponse {
    #[serde(flatten)]
    pub bill: Bill,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateShareRequest {
    pub amount_owed: Decimal,
}

// =========================================================================
// POST /guest/access
// =========================================================================

/// Request guest access to a bill by code
pub async fn request_access(
    State(state): State<AppState>,
    Json(request): Json<RequestAccessRequest>,
) -> Result<(StatusCode, Json<RequestAccessResponse>), AppError> {
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    let email = request.email.trim().to_lowercase();
    let bill_code = request.bill_code.trim().to_uppercase();

    if first_name.is_empty() || last_name.is_empty() || email.is_empty() {
        return Err(AppError::InvalidRequest(
            "First name, last name and email are required".to_string(),
        ));
    }

    let bills = BillStore::new(state.pool.clone());
    if bills.get_bill_by_code(&bill_code).await?.is_none() {
        return Err(AppError::BillNotFound);
    }

    let guests = GuestStore::new(state.pool.clone());
    let access = guests
        .create_access(
            first_name,
            last_name,
            &email,
            &bill_code,
            state.config.guest_access_ttl_hours,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RequestAccessResponse {
            bill_code: access.bill_code,
            expires_at: access.expires_at,
        }),
    ))
}

// =========================================================================
// POST /guest/session
// =========================================================================

/// Exchange a valid (email, bill code) access grant for a guest token
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let email = request.email.trim().to_lowercase();
    let bill_code = request.bill_code.trim().to_uppercase();

    let guests = GuestStore::new(state.pool.clone());
    let access = guests
        .find_valid_access(&email, &bill_code, state.config.guest_access_ttl_hours)
        .await?
        .ok_or(AppError::GuestAccessDenied)?;

    // The bill may have been deactivated since access was granted.
    let bills = BillStore::new(state.pool.clone());
    if bills.get_bill_by_code(&bill_code).await?.is_none() {
        return Err(AppError::GuestAccessDenied);
    }

    let sessions = SessionStore::new(state.pool.clone());
    let token = sessions.create_guest_session(&access).await?;

    Ok(Json(CreateSessionResponse {
        token,
        bill_code: access.bill_code,
        expires_at: access.expires_at,
    }))
}

// =========================================================================
// GET /guest/bill
// =========================================================================

/// The guest's bill with its participants
pub async fn get_bill(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<GuestBillResponse>, AppError> {
    let guest = identity.as_guest().ok_or(AppError::GuestAccessDenied)?;

    let bills = BillStore::new(state.pool.clone());
    let bill = bills
        .get_bill_by_code(&guest.bill_code)
        .await?
        .ok_or(AppError::BillNotFound)?;
    let participants = bills.get_participants(bill.id).await?;

    Ok(Json(GuestBillResponse { bill, participants }))
}

// =========================================================================
// PATCH /guest/participant
// =========================================================================

/// Update the guest's own share on their bill
pub async fn update_share(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<UpdateShareRequest>,
) -> Result<StatusCode, AppError> {
    let guest = identity.as_guest().ok_or(AppError::GuestAccessDenied)?;

    let bills = BillStore::new(state.pool.clone());
    let bill = bills
        .get_bill_by_code(&guest.bill_code)
        .await?
        .ok_or(AppError::BillNotFound)?;

    bills
        .update_guest_participant_amount(bill.id, &guest.email, request.amount_owed)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
