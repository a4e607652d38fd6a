//! API tests against a running server.
//!
//! Start the server with STACKS_ADMIN_EMAIL / STACKS_ADMIN_PASSWORD set on an
//! empty database, then run: cargo test -- --ignored

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("STACKS_API_URL").unwrap_or_else(|_| "http://localhost:8080/api/v1".to_string())
}

fn admin_credentials() -> (String, String) {
    (
        std::env::var("STACKS_ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.org".to_string()),
        std::env::var("STACKS_ADMIN_PASSWORD").unwrap_or_else(|_| "change-me-now".to_string()),
    )
}

/// Helper to get a staff token
async fn get_auth_token(client: &Client) -> String {
    let (email, password) = admin_credentials();
    let response = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn post(client: &Client, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let response = client
        .post(format!("{}{}", base_url(), path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login() {
    let client = Client::new();
    let (email, password) = admin_credentials();

    let response = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["user_type"], "staff");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();
    let (email, _) = admin_credentials();

    let response = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "email": email, "password": "definitely-wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_checkout_and_return() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let tag = Utc::now().timestamp_micros();

    let (status, author) = post(&client, &token, "/authors", json!({ "name": format!("Ursula {}", tag) })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, category) =
        post(&client, &token, "/categories", json!({ "name": format!("Fiction {}", tag) })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, book) = post(
        &client,
        &token,
        "/books",
        json!({
            "title": "The Left Hand of Darkness",
            "author_ids": [author["id"]],
            "category_ids": [category["id"]],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(book["authors"][0]["id"], author["id"]);

    let (status, copy) = post(
        &client,
        &token,
        &format!("/books/{}/copies", book["id"]),
        json!({ "barcode": format!("BC-{}", tag) }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(copy["status"], "available");

    let (status, member) = post(
        &client,
        &token,
        "/members",
        json!({
            "email": format!("reader{}@example.org", tag),
            "password": "reader-password",
            "full_name": "Genly Ai",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, loan) = post(
        &client,
        &token,
        "/loans",
        json!({ "member_id": member["id"], "copy_id": copy["id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["status"], "active");

    // A borrowed copy cannot go out again
    let (status, _) = post(
        &client,
        &token,
        "/loans",
        json!({ "member_id": member["id"], "copy_id": copy["id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let return_path = format!("/loans/{}/return", loan["id"]);
    let (status, returned) = post(&client, &token, &return_path, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "returned");
    assert!(returned["return_date"].is_string());

    let (status, _) = post(&client, &token, &return_path, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
