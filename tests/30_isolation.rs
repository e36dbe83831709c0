mod common;

use anyhow::Result;
use common::{read, TestServer};
use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn tenants_never_see_each_others_data() -> Result<()> {
    let server = TestServer::spawn().await?;
    let acme = server.register("Acme", "owner@acme.test").await?;
    let globex = server.register("Globex", "owner@globex.test").await?;

    let (status, body) = read(
        server
            .post("/api/automations", Some(&acme.token), json!({ "name": "Lead follow-up" }))
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "INACTIVE");
    let automation_id = body["data"]["id"].as_str().unwrap_or_default().to_string();

    let (_, body) = read(server.get("/api/automations", Some(&globex.token)).await?).await?;
    assert_eq!(body["data"], json!([]));

    let path = format!("/api/automations/{}", automation_id);
    let (status, _) = read(server.get(&path, Some(&globex.token)).await?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = read(server.delete(&path, Some(&globex.token)).await?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = read(server.get(&path, Some(&acme.token)).await?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Lead follow-up");

    let acme_user = format!("/api/users/{}", acme.user_id);
    let (status, _) = read(server.get(&acme_user, Some(&globex.token)).await?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn tenant_stats_count_only_own_rows() -> Result<()> {
    let server = TestServer::spawn().await?;
    let acme = server.register("Acme", "owner@acme.test").await?;
    let globex = server.register("Globex", "owner@globex.test").await?;

    for name in ["One", "Two"] {
        server
            .post("/api/automations", Some(&acme.token), json!({ "name": name }))
            .await?;
    }

    let (_, body) = read(server.get("/api/tenants/me/stats", Some(&acme.token)).await?).await?;
    assert_eq!(body["data"]["automations"]["total"], 2);
    assert_eq!(body["data"]["plan"], "Start");

    let (_, body) = read(server.get("/api/tenants/me/stats", Some(&globex.token)).await?).await?;
    assert_eq!(body["data"]["automations"]["total"], 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_keep_their_own_tenant() -> Result<()> {
    let server = TestServer::spawn().await?;
    let acme = server.register("Acme", "owner@acme.test").await?;
    let globex = server.register("Globex", "owner@globex.test").await?;
    let (server, acme, globex) = (&server, &acme, &globex);

    let creates = (0..10).map(move |i| {
        let session = if i % 2 == 0 { acme } else { globex };
        server.post("/api/automations", Some(&session.token), json!({ "name": format!("Run {}", i) }))
    });
    for res in join_all(creates).await {
        assert_eq!(res?.status(), StatusCode::CREATED);
    }

    let lists = (0..10).map(move |i| {
        let session = if i % 2 == 0 { acme } else { globex };
        async move {
            let (_, body) = read(server.get("/api/automations", Some(&session.token)).await?).await?;
            anyhow::Ok((session.tenant_id.clone(), body))
        }
    });
    for result in join_all(lists).await {
        let (tenant_id, body) = result?;
        let rows = body["data"].as_array().cloned().unwrap_or_default();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row["tenant_id"] == tenant_id.as_str()));
    }
    Ok(())
}
