//! Dashboard and profile endpoints

use axum::{
    extract::{Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::{compute_user_net_balance, Identity, UserBalance};
use crate::error::AppError;
use crate::store::bills::{ActivityItem, BillListItem, Participation};
use crate::store::users::{Profile, ProfileUpdate};
use crate::store::{BillStore, UserStore};

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub bills: Vec<BillListItem>,
    pub participations: Vec<Participation>,
    pub balance: UserBalance,
    pub recent_activity: Vec<ActivityItem>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

// =========================================================================
// GET /dashboard
// =========================================================================

/// The caller's bills, participations, net balance and recent activity
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<DashboardResponse>, AppError> {
    let user = identity
        .as_registered()
        .ok_or(AppError::AuthenticationRequired)?;

    let bills = BillStore::new(state.pool.clone());

    let own_bills = bills.get_user_bills(user.id).await?;
    let participations = bills.participant_bills(user.id).await?;
    let owned_shares = bills.owned_bill_shares(user.id).await?;
    let participation_amounts = bills.participation_amounts(user.id).await?;
    let recent_activity = bills.recent_activity(user.id).await?;

    let balance = compute_user_net_balance(user.id, &owned_shares, &participation_amounts);

    Ok(Json(DashboardResponse {
        bills: own_bills,
        participations,
        balance,
        recent_activity,
    }))
}

// =========================================================================
// GET /profile
// =========================================================================

/// The caller's profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Profile>, AppError> {
    let user = identity
        .as_registered()
        .ok_or(AppError::AuthenticationRequired)?;

    let users = UserStore::new(state.pool.clone());
    let profile = users.get_profile(user.id).await?;

    Ok(Json(profile))
}

// =========================================================================
// PATCH /profile
// =========================================================================

/// Update profile fields. Only the allow-listed set can change.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    let user = identity
        .as_registered()
        .ok_or(AppError::AuthenticationRequired)?;

    let update = ProfileUpdate {
        first_name: normalize(request.first_name),
        last_name: normalize(request.last_name),
        nickname: normalize(request.nickname),
        username: normalize(request.username),
        email: normalize(request.email).map(|e| e.to_lowercase()),
    };

    let users = UserStore::new(state.pool.clone());
    users.update_profile(user.id, &update).await?;

    let profile = users.get_profile(user.id).await?;
    Ok(Json(profile))
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
