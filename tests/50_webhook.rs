mod common;

use anyhow::{Context, Result};
use common::{read, TestServer};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn unknown_workflow_is_acknowledged() -> Result<()> {
    let server = TestServer::spawn().await?;
    let res = server
        .post(
            "/api/webhooks/n8n/execution",
            None,
            json!({ "executionId": "exec-9", "workflowId": "wf-404", "status": "success" }),
        )
        .await?;
    let (status, body) = read(res).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "received": true, "processed": false }));
    Ok(())
}

#[tokio::test]
async fn redelivered_webhook_counts_once() -> Result<()> {
    let server = TestServer::spawn().await?;
    let session = server.register("Acme", "owner@acme.test").await?;

    let (_, body) = read(server.get("/api/templates", Some(&session.token)).await?).await?;
    let template = body["data"][0]["id"].as_str().context("template id")?.to_string();
    let (_, body) = read(
        server
            .post(
                "/api/automations",
                Some(&session.token),
                json!({ "name": "Orders", "template_id": template }),
            )
            .await?,
    )
    .await?;
    let id = body["data"]["id"].as_str().context("automation id")?.to_string();
    let (_, body) = read(
        server
            .post(&format!("/api/automations/{}/activate", id), Some(&session.token), json!({}))
            .await?,
    )
    .await?;
    let workflow_id = body["data"]["workflow_id"].as_str().context("workflow id")?.to_string();

    let payload = json!({
        "executionId": "exec-100",
        "workflowId": workflow_id,
        "status": "success",
        "startedAt": "2026-10-19T08:00:00Z",
        "finishedAt": "2026-10-19T08:00:01.500Z",
        "data": { "order": 17 },
    });
    let mut execution_ids = Vec::new();
    for _ in 0..2 {
        let (status, body) = read(server.post("/api/webhooks/n8n/execution", None, payload.clone()).await?).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["processed"], true);
        execution_ids.push(body["data"]["execution_id"].clone());
    }
    assert_eq!(execution_ids[0], execution_ids[1]);

    let (_, body) = read(server.get(&format!("/api/automations/{}", id), Some(&session.token)).await?).await?;
    assert_eq!(body["data"]["execution_count"], 1);

    let (_, body) = read(
        server
            .get(&format!("/api/automations/{}/executions", id), Some(&session.token))
            .await?,
    )
    .await?;
    let executions = body["data"].as_array().context("executions")?;
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0]["status"], "SUCCESS");
    assert_eq!(executions[0]["duration_ms"], 1500);

    let (_, body) = read(server.get("/api/plans/subscription", Some(&session.token)).await?).await?;
    assert_eq!(body["data"]["executions_used"], 1);
    Ok(())
}
