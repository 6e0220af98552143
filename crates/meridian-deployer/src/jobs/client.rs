//! HTTP client for the job manager API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::auth::TokenSession;
use crate::config::JobManagerConfig;
use crate::error::{DeployerError, DeployerResult};
use crate::types::{JobId, LockState, RawJob};

use super::{JobSource, JobUpdate, MAX_AUTH_ATTEMPTS};

/// HTTP client for the job manager.
///
/// Every call carries the session's bearer token. The job manager answers
/// an expired token with `500 Internal Server Error`; on that status the
/// token is invalidated and the call retried once with a fresh one.
#[derive(Debug, Clone)]
pub struct JobManagerClient {
    client: Client,
    jobs_url: String,
    session: Arc<TokenSession>,
}

impl JobManagerClient {
    /// Create a new job manager client from configuration.
    pub fn new(config: &JobManagerConfig, session: Arc<TokenSession>) -> DeployerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            jobs_url: format!("{}/jobs", config.url.trim_end_matches('/')),
            session,
        })
    }

    /// Create a new job manager client with a custom base URL.
    pub fn with_url(url: impl Into<String>, session: Arc<TokenSession>) -> DeployerResult<Self> {
        Self::new(
            &JobManagerConfig {
                url: url.into(),
                ..JobManagerConfig::default()
            },
            session,
        )
    }

    fn job_url(&self, id: &JobId) -> String {
        format!("{}/{}", self.jobs_url, id)
    }

    /// Send an authenticated request, re-authenticating once if the job
    /// manager rejects the token.
    async fn send<F>(&self, operation: &str, build: F) -> DeployerResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        for attempt in 1..=MAX_AUTH_ATTEMPTS {
            let token = self.session.ensure_valid_token().await?;
            let response = build(&self.client)
                .bearer_auth(token.expose_secret())
                .send()
                .await?;

            if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
                warn!(operation, attempt, "job manager rejected request, re-authenticating");
                self.session.invalidate().await;
                continue;
            }

            return Ok(response.error_for_status()?);
        }

        Err(DeployerError::ReauthExhausted {
            operation: operation.to_owned(),
        })
    }

    /// Fetch pending jobs, propagating failures.
    ///
    /// Entries that do not decode as jobs are logged and skipped.
    pub async fn try_fetch_pending(&self) -> DeployerResult<Vec<RawJob>> {
        info!("getting deployments from the job manager");

        let response = self.send("fetch jobs", |c| c.get(&self.jobs_url)).await?;
        let documents: Vec<Value> = response.json().await?;

        let jobs = documents
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<RawJob>(doc) {
                Ok(job) => Some(job),
                Err(e) => {
                    warn!(error = %e, "skipping malformed job");
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!(count = jobs.len(), "jobs fetched");
        Ok(jobs)
    }

    /// Transition a job's lock state, propagating failures.
    pub async fn try_transition(&self, id: &JobId, state: LockState) -> DeployerResult<()> {
        let update = JobUpdate::new(id, state);
        let url = self.job_url(id);

        info!(job_id = %id, state = %state, "updating job state");

        self.send("update job", |c| c.put(&url).json(&update)).await?;
        Ok(())
    }

    /// Delete a job, propagating failures.
    pub async fn try_delete(&self, id: &JobId) -> DeployerResult<()> {
        let url = self.job_url(id);

        info!(job_id = %id, "deleting job");

        self.send("delete job", |c| c.delete(&url)).await?;
        Ok(())
    }
}

#[async_trait]
impl JobSource for JobManagerClient {
    async fn fetch_pending(&self) -> Vec<RawJob> {
        self.try_fetch_pending().await.unwrap_or_else(|e| {
            error!(error = %e, "failed getting jobs from the job manager");
            Vec::new()
        })
    }

    async fn transition(&self, id: &JobId, state: LockState) -> bool {
        match self.try_transition(id, state).await {
            Ok(()) => true,
            Err(e) => {
                error!(job_id = %id, state = %state, error = %e, "failed updating job state");
                false
            }
        }
    }

    async fn delete(&self, id: &JobId) -> bool {
        match self.try_delete(id).await {
            Ok(()) => true,
            Err(e) => {
                error!(job_id = %id, error = %e, "failed deleting job");
                false
            }
        }
    }
}
