//! Staff directory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        staff::{CreateStaff, Staff, StaffQuery, UpdateStaff},
        PageQuery, Paginated, PaginatedStaff,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List staff (staff only)
#[utoipa::path(
    get,
    path = "/staff",
    tag = "staff",
    security(("bearer_auth" = [])),
    params(StaffQuery, PageQuery),
    responses(
        (status = 200, description = "Page of staff", body = PaginatedStaff),
        (status = 403, description = "Staff access required")
    )
)]
pub async fn list_staff(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<StaffQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedStaff>> {
    let (rows, total) = state.services.staff.search(&claims, &query, &page).await?;
    Ok(Json(Paginated::new(rows, total, &page)))
}

/// Get a staff member by ID
#[utoipa::path(
    get,
    path = "/staff/{id}",
    tag = "staff",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Staff ID")),
    responses(
        (status = 200, description = "Staff", body = Staff),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Staff not found")
    )
)]
pub async fn get_staff(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Staff>> {
    let row = state.services.staff.get(&claims, id).await?;
    Ok(Json(row))
}

/// Create a staff member with login account (administrators only)
#[utoipa::path(
    post,
    path = "/staff",
    tag = "staff",
    security(("bearer_auth" = [])),
    request_body = CreateStaff,
    responses(
        (status = 201, description = "Staff created", body = Staff),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Access denied"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_staff(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateStaff>,
) -> AppResult<(StatusCode, Json<Staff>)> {
    request.validate()?;
    let row = state.services.staff.create(&claims, &request).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// Update a staff member
#[utoipa::path(
    put,
    path = "/staff/{id}",
    tag = "staff",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Staff ID")),
    request_body = UpdateStaff,
    responses(
        (status = 200, description = "Staff updated", body = Staff),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Staff not found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_staff(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateStaff>,
) -> AppResult<Json<Staff>> {
    request.validate()?;
    let row = state.services.staff.update(&claims, id, &request).await?;
    Ok(Json(row))
}

/// Deactivate a staff member (records are kept)
#[utoipa::path(
    delete,
    path = "/staff/{id}",
    tag = "staff",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Staff ID")),
    responses(
        (status = 204, description = "Staff deactivated"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Staff not found")
    )
)]
pub async fn delete_staff(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.staff.deactivate(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
