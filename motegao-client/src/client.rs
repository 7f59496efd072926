use crate::error::{ApiError, Result};
use crate::request::ToolRequest;
use crate::response::{
    CancelResponse, GoogleProfile, ProjectDocument, SubmitResponse, TaskResultResponse,
    TokenResponse,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/v1";

/// Thin adapter over the Motegao HTTP API. Holds no state besides the bearer
/// token and never retries; failures go straight back to the caller.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, 30)
    }

    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("Motegao/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.authorized(builder).send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        // Some endpoints answer 204 or an empty 200
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        Ok(serde_json::from_str(body)?)
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    /// OAuth2 password-grant login
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let url = self.url("auth/login")?;
        debug!("POST {}", url);
        let form = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("scope", ""),
            ("client_id", ""),
            ("client_secret", ""),
        ];
        let token: TokenResponse = self.send(self.client.post(url).form(&form)).await?;
        info!("Logged in as {}", username);
        Ok(token)
    }

    pub async fn google_login(&self, profile: &GoogleProfile) -> Result<TokenResponse> {
        let url = self.url("auth/google-login")?;
        debug!("POST {}", url);
        self.send(self.client.post(url).json(profile)).await
    }

    // ------------------------------------------------------------------
    // Job queue
    // ------------------------------------------------------------------

    /// Submit a scan job and return the task id assigned by the queue
    pub async fn submit(&self, request: &ToolRequest) -> Result<String> {
        request.validate()?;
        let url = self.url(request.endpoint())?;
        debug!("POST {} for {}", url, request.target());
        let body = request.to_json()?;
        let submitted: SubmitResponse = self.send(self.client.post(url).json(&body)).await?;
        info!("Submitted {} -> task {}", request.endpoint(), submitted.task_id);
        Ok(submitted.task_id)
    }

    pub async fn poll_result(&self, task_id: &str) -> Result<TaskResultResponse> {
        let url = self.url(&format!("commands/{}/result", task_id))?;
        debug!("GET {}", url);
        self.send(self.client.get(url)).await
    }

    pub async fn cancel(&self, task_id: &str) -> Result<CancelResponse> {
        let url = self.url(&format!("commands/{}/cancel", task_id))?;
        debug!("GET {}", url);
        let response: CancelResponse = self.send(self.client.get(url)).await?;
        info!("Cancelled task {} ({})", task_id, response.status);
        Ok(response)
    }

    // ------------------------------------------------------------------
    // Project store
    // ------------------------------------------------------------------

    pub async fn list_projects(&self) -> Result<Vec<ProjectDocument>> {
        let url = self.url("projects/my-projects")?;
        debug!("GET {}", url);
        self.send(self.client.get(url)).await
    }

    pub async fn get_project(&self, project_id: &str) -> Result<ProjectDocument> {
        let url = self.url(&format!("projects/detail/{}", project_id))?;
        debug!("GET {}", url);
        self.send(self.client.get(url)).await
    }

    pub async fn create_project(&self, project: &ProjectDocument) -> Result<Value> {
        let url = self.url("projects/create")?;
        debug!("POST {}", url);
        self.send(self.client.post(url).json(project)).await
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        nodes: &[Value],
        edges: &[Value],
        last_modified: &str,
    ) -> Result<Value> {
        let url = self.url(&format!("projects/update/{}", project_id))?;
        debug!("PUT {} ({} nodes, {} edges)", url, nodes.len(), edges.len());
        let body = json!({
            "nodes": nodes,
            "edges": edges,
            "lastModified": last_modified,
        });
        self.send(self.client.put(url).json(&body)).await
    }

    pub async fn rename_project(&self, project_id: &str, name: &str) -> Result<Value> {
        let url = self.url(&format!("projects/rename/{}", project_id))?;
        debug!("PUT {}", url);
        self.send(self.client.put(url).json(&json!({ "name": name }))).await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<Value> {
        let url = self.url(&format!("projects/delete/{}", project_id))?;
        debug!("DELETE {}", url);
        self.send(self.client.delete(url)).await
    }
}

/// Parse the base URL and make sure relative joins keep its last path
/// segment (`/v1` must become `/v1/`).
pub fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url =
        Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(format!("{} cannot be a base URL", base_url)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(body),
        StatusCode::NOT_FOUND => ApiError::NotFound(body),
        _ => ApiError::Status {
            status: status.as_u16(),
            body,
        },
    })
}
