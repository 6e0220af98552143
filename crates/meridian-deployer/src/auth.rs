//! Bearer-token acquisition for the job manager.
//!
//! Tokens come from an OAuth2 client-credentials exchange. A single
//! [`TokenSession`] caches the current token; callers that see the job
//! manager reject it call [`TokenSession::invalidate`] so the next call
//! re-issues.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::error::{DeployerError, DeployerResult};

/// Source of fresh access tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Request a new access token.
    async fn issue_token(&self) -> DeployerResult<SecretString>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Issues tokens with the OAuth2 client-credentials grant.
#[derive(Debug, Clone)]
pub struct ClientCredentialsIssuer {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    grant_type: String,
}

impl ClientCredentialsIssuer {
    /// Create a new issuer from configuration.
    pub fn new(config: &AuthConfig) -> DeployerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            grant_type: config.grant_type.clone(),
        })
    }
}

#[async_trait]
impl TokenIssuer for ClientCredentialsIssuer {
    async fn issue_token(&self) -> DeployerResult<SecretString> {
        info!(
            client_id = %self.client_id,
            grant_type = %self.grant_type,
            url = %self.token_url,
            "requesting access token"
        );

        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("grant_type", self.grant_type.as_str()),
        ];

        let response = self.client.post(&self.token_url).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployerError::TokenIssuance(format!("{status}: {}", body.trim())));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DeployerError::TokenIssuance(format!("malformed token response: {e}")))?;

        Ok(SecretString::from(token.access_token))
    }
}

/// Process-wide cache of the job manager access token.
///
/// Shared by reference (`Arc`) between every component that talks to the
/// job manager. Token issuance is serialised behind the cache lock, so
/// concurrent callers never issue twice for the same invalidation.
pub struct TokenSession {
    issuer: Arc<dyn TokenIssuer>,
    token: Mutex<Option<SecretString>>,
}

impl TokenSession {
    /// Create a session with an empty cache.
    #[must_use]
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            issuer,
            token: Mutex::new(None),
        }
    }

    /// Return the cached token, issuing one first if the cache is empty.
    pub async fn ensure_valid_token(&self) -> DeployerResult<SecretString> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        info!("authenticating with the job manager");
        let token = self.issuer.issue_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token.
    pub async fn invalidate(&self) {
        debug!("invalidating cached access token");
        *self.token.lock().await = None;
    }

    /// Returns true if a token is cached.
    pub async fn has_token(&self) -> bool {
        self.token.lock().await.is_some()
    }
}

impl std::fmt::Debug for TokenSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSession").finish_non_exhaustive()
    }
}

/// Token issuer returning numbered static tokens, for tests.
#[derive(Debug, Default)]
pub struct StaticTokenIssuer {
    issued: std::sync::atomic::AtomicUsize,
}

impl StaticTokenIssuer {
    /// Create an issuer that has issued nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens issued so far.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for StaticTokenIssuer {
    async fn issue_token(&self) -> DeployerResult<SecretString> {
        let n = self.issued.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        Ok(SecretString::from(format!("token-{n}")))
    }
}
