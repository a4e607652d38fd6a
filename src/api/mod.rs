//! API handlers for Stacks REST endpoints

pub mod auth;
pub mod authors;
pub mod books;
pub mod categories;
pub mod conversations;
pub mod copies;
pub mod dashboard;
pub mod health;
pub mod loans;
pub mod members;
pub mod openapi;
pub mod publishers;
pub mod staff;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, Query},
    http::request::Parts,
    routing::{get, post, put},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::{de::DeserializeOwned, Deserialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::{AppError, AppResult},
    models::account::UserClaims,
    AppState,
};

/// Extractor for authenticated user from the `Authorization: Bearer` header
pub struct AuthenticatedUser(pub UserClaims);

/// Authenticated user of an event stream.
///
/// `EventSource` cannot send headers, so on top of the bearer header this
/// extractor accepts the token as `?access_token=`. Only the SSE route uses it.
pub struct EventStreamUser(pub UserClaims);

#[derive(Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

fn missing_token() -> AppError {
    AppError::Authentication("Missing or malformed authorization header".to_string())
}

async fn bearer_token(parts: &mut Parts, state: &AppState) -> Option<String> {
    TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
        .await
        .ok()
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
}

fn decode_claims(token: &str, state: &AppState) -> AppResult<UserClaims> {
    UserClaims::from_token(token, &state.config.auth)
        .map_err(|e| AppError::Authentication(e.to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts, state).await.ok_or_else(missing_token)?;
        Ok(AuthenticatedUser(decode_claims(&token, state)?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for EventStreamUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts, state).await {
            Some(token) => token,
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.access_token)
                .ok_or_else(missing_token)?,
        };
        Ok(EventStreamUser(decode_claims(&token, state)?))
    }
}

/// Parse an optional JSON body. An empty body yields the default value;
/// anything else must deserialize.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        .route("/auth/password", put(auth::change_password))
        // Catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/books/:id/copies", get(copies::list_copies).post(copies::create_copy))
        .route(
            "/copies/:id",
            get(copies::get_copy).put(copies::update_copy).delete(copies::delete_copy),
        )
        .route("/authors", get(authors::list_authors).post(authors::create_author))
        .route(
            "/authors/:id",
            get(authors::get_author).put(authors::update_author).delete(authors::delete_author),
        )
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/publishers",
            get(publishers::list_publishers).post(publishers::create_publisher),
        )
        .route(
            "/publishers/:id",
            get(publishers::get_publisher)
                .put(publishers::update_publisher)
                .delete(publishers::delete_publisher),
        )
        // Directory
        .route("/members", get(members::list_members).post(members::create_member))
        .route(
            "/members/:id",
            get(members::get_member).put(members::update_member).delete(members::delete_member),
        )
        .route("/members/:id/loans", get(loans::member_loans))
        .route("/staff", get(staff::list_staff).post(staff::create_staff))
        .route(
            "/staff/:id",
            get(staff::get_staff).put(staff::update_staff).delete(staff::delete_staff),
        )
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        .route("/loans/:id/renew", post(loans::renew_loan))
        .route("/loans/:id/lost", post(loans::report_lost))
        // Messaging
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/conversations/:id", get(conversations::get_conversation))
        .route(
            "/conversations/:id/messages",
            get(conversations::list_messages).post(conversations::send_message),
        )
        .route("/conversations/:id/read", post(conversations::mark_read))
        .route("/conversations/:id/events", get(conversations::events))
        // Dashboard
        .route("/dashboard", get(dashboard::get_dashboard))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::loan::{ReportLost, ReturnLoan};

    #[test]
    fn empty_body_means_defaults() {
        let r: ReturnLoan = optional_json(&Bytes::new()).unwrap();
        assert!(r.return_date.is_none());
        let r: ReportLost = optional_json(&Bytes::from_static(b" \n")).unwrap();
        assert!(r.notes.is_none());
    }

    #[test]
    fn malformed_body_is_a_validation_error() {
        let body = Bytes::from_static(br#"{"return_date":"not-a-date"}"#);
        let err = optional_json::<ReturnLoan>(&body).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let body = Bytes::from_static(br#"{"notes": 42}"#);
        assert!(optional_json::<ReportLost>(&body).is_err());
    }

    #[test]
    fn well_formed_body_is_parsed() {
        let body = Bytes::from_static(br#"{"return_date":"2025-03-06T10:00:00Z"}"#);
        let r: ReturnLoan = optional_json(&body).unwrap();
        assert!(r.return_date.is_some());
    }
}
