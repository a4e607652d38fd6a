//! Loan management endpoints

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        loan::{CreateLoan, LoanDetails, LoanQuery, ReportLost, ReturnLoan},
        PageQuery, Paginated, PaginatedLoans,
    },
    AppState,
};

use super::{optional_json, AuthenticatedUser};

/// List loans (members only see their own)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery, PageQuery),
    responses(
        (status = 200, description = "Page of loans", body = PaginatedLoans),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedLoans>> {
    let (loans, total) = state.services.loans.list(&claims, query, page.clone()).await?;
    Ok(Json(Paginated::new(loans, total, &page)))
}

/// Loans of a member
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID"), LoanQuery, PageQuery),
    responses(
        (status = 200, description = "Page of the member's loans", body = PaginatedLoans),
        (status = 403, description = "Another member's loans")
    )
)]
pub async fn member_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(member_id): Path<i32>,
    Query(query): Query<LoanQuery>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedLoans>> {
    let (loans, total) = state
        .services
        .loans
        .member_loans(&claims, member_id, query, page.clone())
        .await?;
    Ok(Json(Paginated::new(loans, total, &page)))
}

/// Get a loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 403, description = "Another member's loan"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get(&claims, id).await?;
    Ok(Json(loan))
}

/// Check out a copy to a member
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = LoanDetails),
        (status = 400, description = "Due date before loan date"),
        (status = 404, description = "Member, copy or staff not found"),
        (status = 409, description = "Copy not available, member not in good standing or loan quota reached")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    request.validate()?;
    let loan = state.services.loans.create(&claims, request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body(content = ReturnLoan, description = "Optional return date", content_type = "application/json"),
    responses(
        (status = 200, description = "Loan returned", body = LoanDetails),
        (status = 400, description = "Malformed body or return date before loan date"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan already closed")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Bytes,
) -> AppResult<Json<LoanDetails>> {
    let request: ReturnLoan = optional_json(&body)?;
    let loan = state.services.loans.return_loan(&claims, id, request).await?;
    Ok(Json(loan))
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan renewed", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan closed or changed concurrently"),
        (status = 422, description = "Overdue or renewal limit reached")
    )
)]
pub async fn renew_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.renew(&claims, id).await?;
    Ok(Json(loan))
}

/// Close a loan as lost
#[utoipa::path(
    post,
    path = "/loans/{id}/lost",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body(content = ReportLost, description = "Optional notes", content_type = "application/json"),
    responses(
        (status = 200, description = "Loan closed as lost", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan already closed")
    )
)]
pub async fn report_lost(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Bytes,
) -> AppResult<Json<LoanDetails>> {
    let request: ReportLost = optional_json(&body)?;
    request.validate()?;
    let loan = state.services.loans.report_lost(&claims, id, request).await?;
    Ok(Json(loan))
}
