use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use rateflow::auth::SessionStore;
use rateflow::config::AdminSeed;
use rateflow::database::AppState;
use rateflow::model::User;
use rateflow::route::create_app;
use rateflow::seed::seed_admin;
use rateflow::store::Repository;

const ADMIN_PASSWORD: &str = "admin-pass";

/// App with a seeded admin; returns the router, repository and admin token
async fn setup_test_app() -> (Router, Repository, String) {
    let db = Repository::in_memory();
    seed_admin(
        &db,
        &AdminSeed {
            username: "admin".into(),
            email: "admin@example.com".into(),
            password: ADMIN_PASSWORD.into(),
        },
    )
    .unwrap();

    let app = create_app(AppState::new(db.clone(), SessionStore::default(), 7));
    let token = login(&app, "admin", ADMIN_PASSWORD).await.1["token"]
        .as_str()
        .unwrap()
        .to_string();
    (app, db, token)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    // Plain-text bodies come back as JSON strings
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await
}

async fn invite(app: &Router, admin: &str, username: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/users",
        Some(admin),
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "owner-pass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn test_session_routes_require_token() {
    let (app, _db, _admin) = setup_test_app().await;

    let (status, _) = send(&app, "GET", "/api/business", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/analytics", Some("not-a-session"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let (app, _db, _admin) = setup_test_app().await;

    let (status, _) = login(&app, "admin", "nope").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = login(&app, "ghost", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invite_activate_login_flow() {
    let (app, db, admin) = setup_test_app().await;

    let invited = invite(&app, &admin, "owner").await;
    assert_eq!(invited["isActive"], false);
    assert_eq!(invited["isAdmin"], false);
    assert!(invited.get("password").is_none());
    let code = invited["activationCode"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);

    let stored: User = db.get(invited["id"].as_u64().unwrap()).unwrap().unwrap();
    assert!(stored.password.starts_with("$argon2"));

    // Inactive accounts cannot log in
    let (status, _) = login(&app, "owner", "owner-pass").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let activation = json!({ "email": "owner@example.com", "activationCode": code });
    let (status, body) = send(&app, "POST", "/api/activate", None, Some(activation.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // The code is single-use
    let (status, _) = send(&app, "POST", "/api/activate", None, Some(activation)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = login(&app, "owner", "owner-pass").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/api/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "owner");
    assert_eq!(body["isActive"], true);
    assert_eq!(body["activationCode"], Value::Null);
}

#[tokio::test]
async fn test_activation_with_wrong_code_fails() {
    let (app, _db, admin) = setup_test_app().await;
    invite(&app, &admin, "typo").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/activate",
        None,
        Some(json!({ "email": "typo@example.com", "activationCode": "WRONG123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid email or activation code");
}

#[tokio::test]
async fn test_non_admin_is_forbidden_from_user_management() {
    let (app, db, admin) = setup_test_app().await;
    let invited = invite(&app, &admin, "plain").await;
    rateflow::activation::activate(
        &db,
        "plain@example.com",
        invited["activationCode"].as_str().unwrap(),
    )
    .unwrap();

    let (_, body) = login(&app, "plain", "owner-pass").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "GET", "/api/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "PATCH",
        "/api/users/1",
        Some(&token),
        Some(json!({ "isActive": false })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_user_rejects_duplicates_and_bad_fields() {
    let (app, _db, admin) = setup_test_app().await;
    invite(&app, &admin, "taken").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/users",
        Some(&admin),
        Some(json!({ "username": "taken", "email": "other@example.com", "password": "pw1234" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Username already exists");

    let (status, body) = send(
        &app,
        "POST",
        "/api/users",
        Some(&admin),
        Some(json!({ "username": "fresh", "email": "taken@example.com", "password": "pw1234" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Email already exists");

    let (status, body) = send(
        &app,
        "POST",
        "/api/users",
        Some(&admin),
        Some(json!({ "username": "x", "email": "bad", "password": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = send(&app, "GET", "/api/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_deactivation_locks_out_existing_session() {
    let (app, db, admin) = setup_test_app().await;
    let invited = invite(&app, &admin, "temp").await;
    let id = invited["id"].as_u64().unwrap();
    rateflow::activation::activate(
        &db,
        "temp@example.com",
        invited["activationCode"].as_str().unwrap(),
    )
    .unwrap();
    let (_, body) = login(&app, "temp", "owner-pass").await;
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/users/{id}"),
        Some(&admin),
        Some(json!({ "isActive": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isActive"], false);

    let (status, _) = send(&app, "GET", "/api/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "PATCH",
        "/api/users/999",
        Some(&admin),
        Some(json!({ "isActive": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_code_reissues_activation() {
    let (app, db, admin) = setup_test_app().await;
    let invited = invite(&app, &admin, "reset").await;
    let id = invited["id"].as_u64().unwrap();
    let first_code = invited["activationCode"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/users/{id}/reset-code"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], id);
    assert_eq!(body["username"], "reset");
    assert_eq!(body["email"], "reset@example.com");
    let new_code = body["activationCode"].as_str().unwrap().to_string();
    assert_eq!(new_code.len(), 8);

    let stored: User = db.get(id).unwrap().unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.activation_code.as_deref(), Some(new_code.as_str()));

    if first_code != new_code {
        let (status, _) = send(
            &app,
            "POST",
            "/api/activate",
            None,
            Some(json!({ "email": "reset@example.com", "activationCode": first_code })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = send(
        &app,
        "POST",
        "/api/activate",
        None,
        Some(json!({ "email": "reset@example.com", "activationCode": new_code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/api/users/42/reset-code", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let (app, _db, admin) = setup_test_app().await;

    let (status, _) = send(&app, "GET", "/api/user", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/api/logout", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/api/user", Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
