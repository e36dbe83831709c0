mod common;

use anyhow::Result;
use common::{read, TestServer};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn health_and_root_are_public() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = read(server.get("/health", None).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "ok");

    let (status, body) = read(server.get("/", None).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "MooveLabs API");
    Ok(())
}

#[tokio::test]
async fn register_creates_owner_on_trial() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = server
        .post(
            "/api/auth/register",
            None,
            json!({
                "name": "Ana",
                "email": "Ana@Example.com",
                "password": "password123",
                "company_name": "Zürich Tours",
            }),
        )
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["role"], "OWNER");
    assert_eq!(body["data"]["user"]["email"], "ana@example.com");
    assert!(body["data"]["user"].get("password_hash").is_none());
    assert_eq!(body["data"]["tenant"]["slug"], "zurich-tours");
    assert_eq!(body["data"]["token_type"], "Bearer");

    let token = body["data"]["access_token"].as_str().unwrap_or_default().to_string();
    let (status, body) = read(server.get("/api/plans/subscription", Some(&token)).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "TRIALING");
    assert_eq!(body["data"]["plan"]["slug"], "start");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_conflicts() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.register("Acme", "owner@acme.test").await?;

    let res = server
        .post(
            "/api/auth/register",
            None,
            json!({
                "name": "Other",
                "email": "owner@acme.test",
                "password": "password123",
                "company_name": "Acme Two",
            }),
        )
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn invalid_body_is_rejected_with_field_errors() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = server
        .post(
            "/api/auth/register",
            None,
            json!({
                "name": "Ana",
                "email": "not-an-email",
                "password": "short",
                "company_name": "Acme",
            }),
        )
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["email"].is_string());
    assert!(body["field_errors"]["password"].is_string());

    let res = server
        .post("/api/auth/login", None, json!({ "email": "a@b.test", "password": "x", "extra": 1 }))
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_JSON");
    Ok(())
}

#[tokio::test]
async fn login_refresh_and_logout() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.register("Acme", "owner@acme.test").await?;

    let res = server
        .post("/api/auth/login", None, json!({ "email": "owner@acme.test", "password": "wrong-password" }))
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let session = server.login("owner@acme.test", "password123").await?;
    let refresh = json!({ "user_id": session.user_id, "refresh_token": session.refresh_token });

    let (status, body) = read(server.post("/api/auth/refresh", None, refresh.clone()).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["access_token"].is_string());

    // The first refresh token was rotated out.
    let (status, _) = read(server.post("/api/auth/refresh", None, refresh).await?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = json!({ "user_id": session.user_id, "refresh_token": body["data"]["refresh_token"] });
    let (status, _) = read(server.post("/api/auth/logout", Some(&session.token), json!({})).await?).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = read(server.post("/api/auth/refresh", None, fresh).await?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
