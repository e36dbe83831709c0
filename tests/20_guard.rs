mod common;

use anyhow::Result;
use common::{read, TestServer};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn protected_routes_need_a_token() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = read(server.get("/api/tenants/me", None).await?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "User not authenticated");

    let (status, body) = read(server.get("/api/automations", Some("not-a-jwt")).await?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn public_routes_skip_the_guard() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = read(server.get("/api/plans", None).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(4));

    let (status, body) = read(server.get("/api/plans/business", None).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["max_workflows"], 100);

    let (status, body) = read(server.get("/api/plans/0b7e4f2a-3c5d-4e6f-8a9b-0c1d2e3f4a5b", None).await?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

    // A bad token does not block a public route.
    let (status, _) = read(server.get("/api/plans", Some("garbage")).await?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn explicit_tenant_must_match_the_caller() -> Result<()> {
    let server = TestServer::spawn().await?;
    let acme = server.register("Acme", "owner@acme.test").await?;
    let globex = server.register("Globex", "owner@globex.test").await?;

    let own = format!("/api/tenants/{}", acme.tenant_id);
    let (status, body) = read(server.get(&own, Some(&acme.token)).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], "acme");
    assert_eq!(body["data"]["counts"]["users"], 1);

    let foreign = format!("/api/tenants/{}", globex.tenant_id);
    let (status, body) = read(server.get(&foreign, Some(&acme.token)).await?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You do not have access to this organization");

    let query = format!("/api/automations?tenantId={}", globex.tenant_id);
    let (status, _) = read(server.get(&query, Some(&acme.token)).await?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let query = format!("/api/automations?tenant_id={}", acme.tenant_id);
    let (status, _) = read(server.get(&query, Some(&acme.token)).await?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn members_cannot_manage_users() -> Result<()> {
    let server = TestServer::spawn().await?;
    let owner = server.register("Acme", "owner@acme.test").await?;

    let res = server
        .post(
            "/api/users",
            Some(&owner.token),
            json!({ "name": "Member", "email": "member@acme.test", "password": "password123" }),
        )
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "MEMBER");

    let member = server.login("member@acme.test", "password123").await?;
    let (status, body) = read(server.get("/api/users", Some(&member.token)).await?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Insufficient permissions for this operation");

    // Self-service routes stay open to members.
    let (status, body) = read(server.get("/api/users/me", Some(&member.token)).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "member@acme.test");

    let (status, body) = read(server.get("/api/users", Some(&owner.token)).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    Ok(())
}
