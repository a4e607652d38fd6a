//! Publisher endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        publisher::{Publisher, PublisherQuery, CreatePublisher, UpdatePublisher},
        PageQuery, Paginated, PaginatedPublishers,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List publishers with search and pagination
#[utoipa::path(
    get,
    path = "/publishers",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(PublisherQuery, PageQuery),
    responses(
        (status = 200, description = "Page of publishers", body = PaginatedPublishers),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_publishers(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<PublisherQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedPublishers>> {
    let (rows, total) = state.services.catalog.search_publishers(&query, &page).await?;
    Ok(Json(Paginated::new(rows, total, &page)))
}

/// Get publisher by ID
#[utoipa::path(
    get,
    path = "/publishers/{id}",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Publisher ID")),
    responses(
        (status = 200, description = "Publisher", body = Publisher),
        (status = 404, description = "Publisher not found")
    )
)]
pub async fn get_publisher(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Publisher>> {
    let row = state.services.catalog.get_publisher(id).await?;
    Ok(Json(row))
}

/// Create a publisher
#[utoipa::path(
    post,
    path = "/publishers",
    tag = "publishers",
    security(("bearer_auth" = [])),
    request_body = CreatePublisher,
    responses(
        (status = 201, description = "Publisher created", body = Publisher),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Name already exists")
    )
)]
pub async fn create_publisher(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreatePublisher>,
) -> AppResult<(StatusCode, Json<Publisher>)> {
    request.validate()?;

    let row = state.services.catalog.create_publisher(&claims, &request).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// Update a publisher
#[utoipa::path(
    put,
    path = "/publishers/{id}",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Publisher ID")),
    request_body = UpdatePublisher,
    responses(
        (status = 200, description = "Publisher updated", body = Publisher),
        (status = 404, description = "Publisher not found"),
        (status = 409, description = "Name already exists")
    )
)]
pub async fn update_publisher(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdatePublisher>,
) -> AppResult<Json<Publisher>> {
    request.validate()?;

    let row = state.services.catalog.update_publisher(&claims, id, &request).await?;
    Ok(Json(row))
}

/// Delete a publisher no book refers to
#[utoipa::path(
    delete,
    path = "/publishers/{id}",
    tag = "publishers",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Publisher ID")),
    responses(
        (status = 204, description = "Publisher deleted"),
        (status = 404, description = "Publisher not found"),
        (status = 409, description = "Publisher still referenced by books")
    )
)]
pub async fn delete_publisher(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_publisher(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
