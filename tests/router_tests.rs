//! Router tests that need no database: the pool is created lazily and
//! never touched by these requests.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use stacks_server::{
    api,
    config::AppConfig,
    models::account::{Role, UserClaims, UserType},
    repository::Repository,
    services::Services,
    AppState,
};

fn app() -> (Router, AppConfig) {
    let config = AppConfig::default();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .unwrap();
    let services = Services::new(Repository::new(pool), &config);
    let state = AppState {
        config: Arc::new(config.clone()),
        services: Arc::new(services),
    };
    (api::create_router(state), config)
}

fn token(config: &AppConfig, user_type: UserType, role: Role) -> String {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: "1".to_string(),
        email: "someone@example.org".to_string(),
        name: "Someone".to_string(),
        role,
        user_type,
        profile_id: 1,
        iss: config.auth.jwt_issuer.clone(),
        aud: config.auth.jwt_audience.clone(),
        exp: now + 600,
        iat: now,
    }
    .create_token(&config.auth.jwt_secret)
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::get("/api/v1/loans").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], 2);
    assert_eq!(body["error"], "NotAuthenticated");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_unauthorized() {
    let (app, mut config) = app();
    config.auth.jwt_secret = "not-the-server-secret".to_string();
    let forged = token(&config, UserType::Staff, Role::Admin);

    let response = app
        .oneshot(
            Request::get("/api/v1/dashboard")
                .header(header::AUTHORIZATION, format!("Bearer {}", forged))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn members_cannot_open_the_dashboard() {
    let (app, config) = app();
    let member = token(&config, UserType::Member, Role::Member);

    let response = app
        .oneshot(
            Request::get("/api/v1/dashboard")
                .header(header::AUTHORIZATION, format!("Bearer {}", member))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], 3);
}

#[tokio::test]
async fn members_cannot_check_out_copies() {
    let (app, config) = app();
    let member = token(&config, UserType::Member, Role::Member);

    let response = app
        .oneshot(
            Request::post("/api/v1/loans")
                .header(header::AUTHORIZATION, format!("Bearer {}", member))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "member_id": 1, "copy_id": 10 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_loan_request_is_rejected_before_storage() {
    let (app, config) = app();
    let librarian = token(&config, UserType::Staff, Role::Librarian);
    let now = Utc::now();

    let response = app
        .oneshot(
            Request::post("/api/v1/loans")
                .header(header::AUTHORIZATION, format!("Bearer {}", librarian))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "member_id": 1,
                        "copy_id": 10,
                        "loan_date": now,
                        "due_date": now - chrono::Duration::days(1),
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], 6);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/loans/{id}/return"].is_object());
}

#[tokio::test]
async fn malformed_return_body_is_rejected() {
    let (app, config) = app();
    let librarian = token(&config, UserType::Staff, Role::Librarian);

    for (path, body) in [
        ("/api/v1/loans/1/return", r#"{"return_date":"not-a-date"}"#),
        ("/api/v1/loans/1/lost", r#"{"notes": 42}"#),
        ("/api/v1/loans/1/return", "not json"),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::post(path)
                    .header(header::AUTHORIZATION, format!("Bearer {}", librarian))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} {}", path, body);
        assert_eq!(body_json(response).await["code"], 6);
    }
}

#[tokio::test]
async fn query_token_is_only_accepted_by_event_streams() {
    let (app, config) = app();
    let librarian = token(&config, UserType::Staff, Role::Librarian);

    let response = app
        .oneshot(
            Request::get(format!("/api/v1/dashboard?access_token={}", librarian))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn members_cannot_edit_the_catalog() {
    let (app, config) = app();
    let member = token(&config, UserType::Member, Role::Member);

    let requests = [
        Request::post("/api/v1/books")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "title": "Dune" }).to_string())),
        Request::post("/api/v1/books/1/copies")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "barcode": "BC-1" }).to_string())),
        Request::delete("/api/v1/authors/1").body(Body::empty()),
    ];

    for request in requests {
        let mut request = request.unwrap();
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {}", member).parse().unwrap(),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
