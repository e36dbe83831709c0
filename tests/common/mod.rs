#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use moovelabs_api::database::{seed_catalog, MemoryStore, Store};
use moovelabs_api::workflow::{RemoteWorkflow, WorkflowEngine, WorkflowError};
use moovelabs_api::{app, AppState};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

/// Engine stand-in: hands out sequential workflow ids and accepts every call.
#[derive(Default)]
pub struct StubEngine {
    next_id: AtomicUsize,
}

#[async_trait]
impl WorkflowEngine for StubEngine {
    async fn create_workflow(&self, name: &str, _workflow: &Value) -> Result<RemoteWorkflow, WorkflowError> {
        let id = format!("wf-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        Ok(RemoteWorkflow {
            webhook_url: Some(format!("http://n8n.test/webhook/{}/hook", id)),
            name: name.to_string(),
            active: false,
            id,
        })
    }

    async fn activate_workflow(&self, _workflow_id: &str) -> Result<(), WorkflowError> {
        Ok(())
    }

    async fn deactivate_workflow(&self, _workflow_id: &str) -> Result<(), WorkflowError> {
        Ok(())
    }

    async fn delete_workflow(&self, _workflow_id: &str) -> Result<(), WorkflowError> {
        Ok(())
    }

    async fn execute_workflow(&self, workflow_id: &str, data: Option<Value>) -> Result<Value, WorkflowError> {
        Ok(json!({ "executionId": format!("exec-{}", workflow_id), "data": data }))
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Value, WorkflowError> {
        Ok(json!({ "id": execution_id, "status": "success" }))
    }
}

/// A server on its own port with a fresh, seeded in-memory store.
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<dyn Store>,
    client: reqwest::Client,
}

/// Tokens and ids returned by registration or login.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub tenant_id: String,
}

impl Session {
    fn from_body(body: &Value) -> Result<Self> {
        let data = &body["data"];
        let field = |value: &Value, what: &str| -> Result<String> {
            value
                .as_str()
                .map(str::to_string)
                .with_context(|| format!("missing {} in {}", what, body))
        };
        Ok(Self {
            token: field(&data["access_token"], "access_token")?,
            refresh_token: field(&data["refresh_token"], "refresh_token")?,
            user_id: field(&data["user"]["id"], "user.id")?,
            tenant_id: field(&data["tenant"]["id"], "tenant.id")?,
        })
    }
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        seed_catalog(store.clone()).await?;
        let state = AppState::new(store.clone(), Arc::new(StubEngine::default()));

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            client: reqwest::Client::new(),
        })
    }

    pub fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Response> {
        Ok(self.request(Method::GET, path, token).send().await?)
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<Response> {
        Ok(self.request(Method::POST, path, token).json(&body).send().await?)
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> Result<Response> {
        Ok(self.request(Method::PATCH, path, token).json(&body).send().await?)
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<Response> {
        Ok(self.request(Method::DELETE, path, token).send().await?)
    }

    /// Register a new organization and return its owner's session.
    pub async fn register(&self, company: &str, email: &str) -> Result<Session> {
        let res = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "name": "Owner",
                    "email": email,
                    "password": "password123",
                    "company_name": company,
                }),
            )
            .await?;
        let status = res.status();
        let body: Value = res.json().await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {} {}", status, body);
        Session::from_body(&body)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let res = self
            .post("/api/auth/login", None, json!({ "email": email, "password": password }))
            .await?;
        let status = res.status();
        let body: Value = res.json().await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {} {}", status, body);
        Session::from_body(&body)
    }
}

/// Split a response into status and JSON body.
pub async fn read(res: Response) -> Result<(StatusCode, Value)> {
    let status = res.status();
    let body = res.json::<Value>().await?;
    Ok((status, body))
}
