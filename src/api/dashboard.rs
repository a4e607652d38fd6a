//! Dashboard endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::dashboard::{DashboardQuery, DashboardStats},
    AppState,
};

use super::AuthenticatedUser;

/// Circulation and inventory rollups (staff only)
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 403, description = "Staff access required")
    )
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<DashboardStats>> {
    let stats = state.services.dashboard.stats(&claims, &query).await?;
    Ok(Json(stats))
}
