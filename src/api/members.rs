//! Member directory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        member::{CreateMember, Member, MemberQuery, UpdateMember},
        PageQuery, Paginated, PaginatedMembers,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List members (staff only)
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    params(MemberQuery, PageQuery),
    responses(
        (status = 200, description = "Page of members", body = PaginatedMembers),
        (status = 403, description = "Staff access required")
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<MemberQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedMembers>> {
    let (rows, total) = state.services.members.search(&claims, &query, &page).await?;
    Ok(Json(Paginated::new(rows, total, &page)))
}

/// Get a member by ID
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member", body = Member),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Member>> {
    let row = state.services.members.get(&claims, id).await?;
    Ok(Json(row))
}

/// Create a member with login account (staff only)
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Access denied"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    request.validate()?;
    let row = state.services.members.create(&claims, &request).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// Update a member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateMember>,
) -> AppResult<Json<Member>> {
    request.validate()?;
    let row = state.services.members.update(&claims, id, &request).await?;
    Ok(Json(row))
}

/// Deactivate a member (records are kept)
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 204, description = "Member deactivated"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn delete_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.members.deactivate(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
