//! HTTP client for the Nuvla API.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::NuvlaConfig;
use crate::error::{extract_message, NuvlaError, NuvlaResult};
use crate::resources::{Application, DeploymentState, ResourceKind};

/// Query parameters for a collection search.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    filter: Option<String>,
    select: Vec<String>,
    last: Option<u32>,
}

impl SearchQuery {
    /// Create an empty query matching every visible resource.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict results with a CIMI filter expression.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Only return the given attributes.
    #[must_use]
    pub fn select<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Limit the number of results.
    #[must_use]
    pub fn last(mut self, last: u32) -> Self {
        self.last = Some(last);
        self
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(filter) = &self.filter {
            params.push(("filter", filter.clone()));
        }
        if !self.select.is_empty() {
            params.push(("select", self.select.join(",")));
        }
        if let Some(last) = self.last {
            params.push(("last", last.to_string()));
        }
        params
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    resources: Vec<Value>,
}

#[derive(Deserialize)]
struct CreatedResponse {
    #[serde(rename = "resource-id")]
    resource_id: String,
}

/// HTTP client for a Nuvla endpoint.
///
/// The client keeps cookies, so a successful [`login_apikey`](Self::login_apikey)
/// authenticates every later call made through the same instance.
#[derive(Debug, Clone)]
pub struct NuvlaClient {
    client: Client,
    endpoint: String,
}

impl NuvlaClient {
    /// Create a new client from configuration.
    pub fn new(config: &NuvlaConfig) -> NuvlaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api", config.url.trim_end_matches('/')),
        })
    }

    /// Create a new client for the given base URL with default settings.
    pub fn with_url(url: impl Into<String>) -> NuvlaResult<Self> {
        Self::new(&NuvlaConfig {
            url: url.into(),
            ..NuvlaConfig::default()
        })
    }

    /// Base URL of the API, including the `/api` suffix.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// Open a session with an API key and secret.
    ///
    /// Returns the session resource ID.
    pub async fn login_apikey(&self, key: &str, secret: &SecretString) -> NuvlaResult<String> {
        let body = json!({
            "template": {
                "href": "session-template/api-key",
                "key": key,
                "secret": secret.expose_secret(),
            }
        });

        info!(endpoint = %self.endpoint, key = %key, "logging in to Nuvla");

        let response = self.client.post(self.url("session")).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = if text.trim().is_empty() {
                status.to_string()
            } else {
                extract_message(&text)
            };
            return Err(NuvlaError::Authentication(message));
        }

        let created: CreatedResponse = response.json().await?;
        Ok(created.resource_id)
    }

    /// Get a resource, optionally restricted to a set of attributes.
    pub async fn get(&self, resource_id: &str, select: &[&str]) -> NuvlaResult<Value> {
        let mut request = self.client.get(self.url(resource_id));
        if !select.is_empty() {
            request = request.query(&[("select", select.join(","))]);
        }

        let response = check(request.send().await?, resource_id).await?;
        Ok(response.json().await?)
    }

    /// Search a collection.
    pub async fn search(
        &self,
        collection: ResourceKind,
        query: &SearchQuery,
    ) -> NuvlaResult<Vec<Value>> {
        debug!(collection = %collection, query = ?query, "searching");

        let response = self
            .client
            .get(self.url(collection.as_str()))
            .query(&query.params())
            .send()
            .await?;

        let response = check(response, collection.as_str()).await?;
        let result: SearchResponse = response.json().await?;
        Ok(result.resources)
    }

    /// Search a collection and return the IDs of the matching resources.
    pub async fn search_ids(
        &self,
        collection: ResourceKind,
        filter: impl Into<String>,
    ) -> NuvlaResult<Vec<String>> {
        let query = SearchQuery::new().filter(filter).select(["id"]);
        let resources = self.search(collection, &query).await?;

        resources
            .into_iter()
            .map(|resource| {
                resource
                    .get("id")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
                    .ok_or_else(|| NuvlaError::unexpected(format!("{collection} without id")))
            })
            .collect()
    }

    /// Add a resource to a collection, returning the new resource ID.
    pub async fn add(&self, collection: ResourceKind, body: &Value) -> NuvlaResult<String> {
        let response = self
            .client
            .post(self.url(collection.as_str()))
            .json(body)
            .send()
            .await?;

        let response = check(response, collection.as_str()).await?;
        let created: CreatedResponse = response.json().await?;
        Ok(created.resource_id)
    }

    /// Edit attributes of an existing resource.
    pub async fn edit(&self, resource_id: &str, body: &Value) -> NuvlaResult<Value> {
        let response = self
            .client
            .put(self.url(resource_id))
            .json(body)
            .send()
            .await?;

        let response = check(response, resource_id).await?;
        Ok(response.json().await?)
    }

    /// Invoke a named operation (`start`, `stop`, ...) on a resource.
    pub async fn operation(&self, resource_id: &str, operation: &str) -> NuvlaResult<Value> {
        let url = self.url(&format!("{resource_id}/{operation}"));
        let response = self.client.post(url).send().await?;

        let response = check(response, resource_id).await?;
        Ok(response.json().await?)
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_id: &str) -> NuvlaResult<()> {
        let response = self.client.delete(self.url(resource_id)).send().await?;
        check(response, resource_id).await?;
        Ok(())
    }

    /// Create an application module.
    ///
    /// With `exist_ok`, a module already registered under the same path is
    /// looked up and its ID returned instead of failing with a conflict.
    pub async fn create_module(&self, app: &Application, exist_ok: bool) -> NuvlaResult<String> {
        let body = serde_json::to_value(app)
            .map_err(|e| NuvlaError::unexpected(format!("module document: {e}")))?;

        match self.add(ResourceKind::Module, &body).await {
            Err(e) if exist_ok && e.is_conflict() => {
                debug!(path = %app.path, "module exists, reusing");
                let ids = self
                    .search_ids(ResourceKind::Module, format!(r#"path="{}""#, app.path))
                    .await?;
                ids.into_iter()
                    .next()
                    .ok_or_else(|| NuvlaError::NotFound(format!("module with path {}", app.path)))
            }
            other => other,
        }
    }

    /// Create a deployment of `module_id` bound to `credential_id` and start it.
    ///
    /// Returns the deployment ID.
    pub async fn launch_deployment(
        &self,
        module_id: &str,
        credential_id: &str,
    ) -> NuvlaResult<String> {
        let body = json!({ "module": { "href": module_id } });
        let deployment_id = self.add(ResourceKind::Deployment, &body).await?;

        self.edit(&deployment_id, &json!({ "parent": credential_id }))
            .await?;
        self.operation(&deployment_id, "start").await?;

        info!(
            deployment_id = %deployment_id,
            module_id = %module_id,
            credential_id = %credential_id,
            "deployment started"
        );

        Ok(deployment_id)
    }

    /// Current lifecycle state of a deployment.
    pub async fn deployment_state(&self, deployment_id: &str) -> NuvlaResult<DeploymentState> {
        let resource = self.get(deployment_id, &["state"]).await?;
        let state = resource
            .get("state")
            .cloned()
            .ok_or_else(|| NuvlaError::unexpected(format!("{deployment_id} has no state")))?;

        serde_json::from_value(state)
            .map_err(|e| NuvlaError::unexpected(format!("{deployment_id} state: {e}")))
    }

    /// Stop a deployment.
    pub async fn stop_deployment(&self, deployment_id: &str) -> NuvlaResult<()> {
        self.operation(deployment_id, "stop").await?;
        info!(deployment_id = %deployment_id, "deployment stop requested");
        Ok(())
    }
}

/// Map non-success responses to typed errors.
async fn check(response: Response, resource: &str) -> NuvlaResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = extract_message(&text);

    match status {
        StatusCode::CONFLICT => Err(NuvlaError::Conflict(message)),
        StatusCode::NOT_FOUND => Err(NuvlaError::NotFound(resource.to_owned())),
        _ => Err(NuvlaError::Api {
            status: status.as_u16(),
            message,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::resources::ApplicationBuilder;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn endpoint_has_api_suffix() {
        let client = NuvlaClient::with_url("https://nuvla.example.org/").unwrap();
        assert_eq!(client.endpoint(), "https://nuvla.example.org/api");
    }

    #[test]
    fn search_query_params() {
        let query = SearchQuery::new()
            .filter(r#"parent="x""#)
            .select(["id", "name"])
            .last(1);
        assert_eq!(
            query.params(),
            vec![
                ("filter", r#"parent="x""#.to_owned()),
                ("select", "id,name".to_owned()),
                ("last", "1".to_owned()),
            ]
        );
        assert!(SearchQuery::new().params().is_empty());
    }

    #[tokio::test]
    async fn login_success_returns_session() {
        let router = Router::new().route(
            "/api/session",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["template"]["href"], "session-template/api-key");
                assert_eq!(body["template"]["secret"], "s3cr3t");
                (
                    AxumStatus::CREATED,
                    Json(json!({"status": 201, "resource-id": "session/1"})),
                )
            }),
        );
        let client = NuvlaClient::with_url(serve(router).await).unwrap();

        let session = client
            .login_apikey("credential/key", &SecretString::from("s3cr3t".to_owned()))
            .await
            .unwrap();
        assert_eq!(session, "session/1");
    }

    #[tokio::test]
    async fn login_failure_extracts_message() {
        let router = Router::new().route(
            "/api/session",
            post(|| async {
                (
                    AxumStatus::FORBIDDEN,
                    Json(json!({"status": 403, "message": "invalid API key/secret"})),
                )
            }),
        );
        let client = NuvlaClient::with_url(serve(router).await).unwrap();

        let err = client
            .login_apikey("credential/key", &SecretString::from("bad".to_owned()))
            .await
            .unwrap_err();
        match err {
            NuvlaError::Authentication(message) => assert_eq!(message, "invalid API key/secret"),
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_ids_passes_filter() {
        let router = Router::new().route(
            "/api/credential",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["filter"], r#"parent="infrastructure-service/1""#);
                assert_eq!(params["select"], "id");
                Json(json!({
                    "count": 2,
                    "resources": [{"id": "credential/a"}, {"id": "credential/b"}]
                }))
            }),
        );
        let client = NuvlaClient::with_url(serve(router).await).unwrap();

        let ids = client
            .search_ids(ResourceKind::Credential, r#"parent="infrastructure-service/1""#)
            .await
            .unwrap();
        assert_eq!(ids, vec!["credential/a", "credential/b"]);
    }

    #[tokio::test]
    async fn get_missing_resource_is_not_found() {
        let router = Router::new().route(
            "/api/nuvlabox/{id}",
            get(|| async { (AxumStatus::NOT_FOUND, Json(json!({"message": "not found"}))) }),
        );
        let client = NuvlaClient::with_url(serve(router).await).unwrap();

        let err = client.get("nuvlabox/missing", &[]).await.unwrap_err();
        assert!(matches!(err, NuvlaError::NotFound(id) if id == "nuvlabox/missing"));
    }

    #[tokio::test]
    async fn create_module_reuses_existing_path() {
        let router = Router::new().route(
            "/api/module",
            post(|| async {
                (
                    AxumStatus::CONFLICT,
                    Json(json!({"status": 409, "message": "conflict with module/existing"})),
                )
            })
            .get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["filter"], r#"path="apps/web""#);
                Json(json!({"resources": [{"id": "module/existing"}]}))
            }),
        );
        let client = NuvlaClient::with_url(serve(router).await).unwrap();
        let app = ApplicationBuilder::new("web").parent_path("apps").build();

        let id = client.create_module(&app, true).await.unwrap();
        assert_eq!(id, "module/existing");

        let err = client.create_module(&app, false).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn launch_binds_credential_then_starts() {
        let calls = Arc::new(Mutex::new(Vec::<String>::new()));

        let add_calls = Arc::clone(&calls);
        let edit_calls = Arc::clone(&calls);
        let start_calls = Arc::clone(&calls);

        let router = Router::new()
            .route(
                "/api/deployment",
                post(move |Json(body): Json<Value>| {
                    let calls = Arc::clone(&add_calls);
                    async move {
                        calls.lock().unwrap().push(format!("add {}", body["module"]["href"]));
                        (
                            AxumStatus::CREATED,
                            Json(json!({"resource-id": "deployment/1"})),
                        )
                    }
                }),
            )
            .route(
                "/api/deployment/{id}",
                axum::routing::put(move |Path(id): Path<String>, Json(body): Json<Value>| {
                    let calls = Arc::clone(&edit_calls);
                    async move {
                        calls.lock().unwrap().push(format!("edit {id} {}", body["parent"]));
                        Json(json!({"id": format!("deployment/{id}")}))
                    }
                }),
            )
            .route(
                "/api/deployment/{id}/start",
                post(move |Path(id): Path<String>| {
                    let calls = Arc::clone(&start_calls);
                    async move {
                        calls.lock().unwrap().push(format!("start {id}"));
                        Json(json!({"status": 202}))
                    }
                }),
            );
        let client = NuvlaClient::with_url(serve(router).await).unwrap();

        let id = client
            .launch_deployment("module/web", "credential/k8s")
            .await
            .unwrap();
        assert_eq!(id, "deployment/1");

        let calls = calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                r#"add "module/web""#.to_owned(),
                r#"edit 1 "credential/k8s""#.to_owned(),
                "start 1".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn deployment_state_reads_state_attribute() {
        let router = Router::new().route(
            "/api/deployment/{id}",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["select"], "state");
                Json(json!({"id": "deployment/1", "state": "STARTED"}))
            }),
        );
        let client = NuvlaClient::with_url(serve(router).await).unwrap();

        let state = client.deployment_state("deployment/1").await.unwrap();
        assert_eq!(state, DeploymentState::Started);
    }
}
