//! Copy (inventory) endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::copy::{BookCopy, CreateCopy, UpdateCopy},
    AppState,
};

use super::AuthenticatedUser;

/// List copies of a book
#[utoipa::path(
    get,
    path = "/books/{id}/copies",
    tag = "copies",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Copies of the book", body = Vec<BookCopy>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn list_copies(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<Vec<BookCopy>>> {
    let copies = state.services.inventory.list_copies(book_id).await?;
    Ok(Json(copies))
}

/// Add a copy to a book
#[utoipa::path(
    post,
    path = "/books/{id}/copies",
    tag = "copies",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = CreateCopy,
    responses(
        (status = 201, description = "Copy created", body = BookCopy),
        (status = 400, description = "Invalid input or status"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Barcode already exists")
    )
)]
pub async fn create_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
    Json(request): Json<CreateCopy>,
) -> AppResult<(StatusCode, Json<BookCopy>)> {
    request.validate()?;

    let copy = state.services.inventory.create_copy(&claims, book_id, &request).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// Get a copy
#[utoipa::path(
    get,
    path = "/copies/{id}",
    tag = "copies",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Copy ID")),
    responses(
        (status = 200, description = "Copy", body = BookCopy),
        (status = 404, description = "Copy not found")
    )
)]
pub async fn get_copy(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookCopy>> {
    let copy = state.services.inventory.get_copy(id).await?;
    Ok(Json(copy))
}

/// Update a copy (barcode, location, shelf status)
#[utoipa::path(
    put,
    path = "/copies/{id}",
    tag = "copies",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Copy ID")),
    request_body = UpdateCopy,
    responses(
        (status = 200, description = "Copy updated", body = BookCopy),
        (status = 400, description = "Status borrowed cannot be set by hand"),
        (status = 404, description = "Copy not found"),
        (status = 409, description = "Copy is on loan, or barcode already exists")
    )
)]
pub async fn update_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateCopy>,
) -> AppResult<Json<BookCopy>> {
    request.validate()?;

    let copy = state.services.inventory.update_copy(&claims, id, &request).await?;
    Ok(Json(copy))
}

/// Delete a copy that was never loaned
#[utoipa::path(
    delete,
    path = "/copies/{id}",
    tag = "copies",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Copy ID")),
    responses(
        (status = 204, description = "Copy deleted"),
        (status = 404, description = "Copy not found"),
        (status = 409, description = "Copy has loan history")
    )
)]
pub async fn delete_copy(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.inventory.delete_copy(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
