use std::env;
use std::fmt;
use std::time::Duration;

use futures::FutureExt;
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::fallback::FallbackChain;

pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// An acquired bearer token for a single scope. Immutable once issued.
#[derive(Clone)]
pub struct Session {
    token: String,
    scope: String,
    issued_by: String,
}

impl Session {
    pub fn new(token: impl Into<String>, scope: impl Into<String>, issued_by: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            scope: scope.into(),
            issued_by: issued_by.into(),
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn issued_by(&self) -> &str {
        &self.issued_by
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("scope", &self.scope)
            .field("issued_by", &self.issued_by)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ClientSecretCredential {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl ClientSecretCredential {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            tenant_id: env::var("AZURE_TENANT_ID").ok()?,
            client_id: env::var("AZURE_CLIENT_ID").ok()?,
            client_secret: env::var("AZURE_CLIENT_SECRET").ok()?,
        })
    }
}

#[derive(Debug, Clone)]
pub enum CredentialSource {
    ClientSecret(ClientSecretCredential),
    AzureCli,
    ManagedIdentity,
}

impl CredentialSource {
    fn name(&self) -> &'static str {
        match self {
            CredentialSource::ClientSecret(_) => "environment",
            CredentialSource::AzureCli => "azure-cli",
            CredentialSource::ManagedIdentity => "managed-identity",
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Tries each configured credential source in order until one issues a token.
pub struct CredentialChain {
    http: Client,
    authority_host: String,
    imds_endpoint: String,
    sources: Vec<CredentialSource>,
}

impl CredentialChain {
    pub fn new(sources: Vec<CredentialSource>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            imds_endpoint: DEFAULT_IMDS_ENDPOINT.to_string(),
            sources,
        })
    }

    /// Environment service principal (when fully configured), then the Azure
    /// CLI session, then the instance metadata endpoint.
    pub fn from_env() -> Result<Self> {
        let mut sources = Vec::new();
        if let Some(credential) = ClientSecretCredential::from_env() {
            sources.push(CredentialSource::ClientSecret(credential));
        }
        sources.push(CredentialSource::AzureCli);
        sources.push(CredentialSource::ManagedIdentity);

        let mut chain = Self::new(sources)?;
        if let Ok(host) = env::var("AZURE_AUTHORITY_HOST") {
            chain.authority_host = host;
        }
        Ok(chain)
    }

    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    pub fn with_imds_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.imds_endpoint = endpoint.into();
        self
    }

    pub async fn acquire(&self, scope: &str) -> Result<Session> {
        let mut chain = FallbackChain::new();
        for source in &self.sources {
            let attempt = match source {
                CredentialSource::ClientSecret(credential) => {
                    self.client_secret_token(credential, scope).boxed()
                }
                CredentialSource::AzureCli => azure_cli_token(scope).boxed(),
                CredentialSource::ManagedIdentity => self.managed_identity_token(scope).boxed(),
            };
            chain = chain.attempt(source.name(), attempt);
        }

        let resolved = chain.run().await.map_err(|e| Error::Auth(e.to_string()))?;
        tracing::info!("Azure authentication successful via {}", resolved.strategy);
        Ok(Session::new(resolved.value, scope, resolved.strategy))
    }

    async fn client_secret_token(
        &self,
        credential: &ClientSecretCredential,
        scope: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            credential.tenant_id
        );
        tracing::debug!("Requesting client credential token from {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("token endpoint returned {}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn managed_identity_token(&self, scope: &str) -> Result<String> {
        let resource = scope.trim_end_matches("/.default");
        let response = self
            .http
            .get(&self.imds_endpoint)
            .query(&[("api-version", "2018-02-01"), ("resource", resource)])
            .header("Metadata", "true")
            .timeout(Duration::from_secs(2))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Auth(format!(
                "managed identity endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

async fn azure_cli_token(scope: &str) -> Result<String> {
    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--scope",
            scope,
            "--query",
            "accessToken",
            "-o",
            "tsv",
        ])
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Auth(format!("az exited with {}: {}", output.status, stderr.trim())));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(Error::Auth("az returned an empty token".to_string()));
    }
    Ok(token)
}

async fn azure_cli_subscription() -> Result<String> {
    let output = Command::new("az")
        .args(["account", "show", "--query", "id", "-o", "tsv"])
        .output()
        .await?;

    let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || id.is_empty() {
        return Err(Error::Config(
            "no active Azure CLI subscription (run 'az login')".to_string(),
        ));
    }
    Ok(id)
}

/// Explicit id, then the configured environment value, then the Azure CLI.
pub async fn resolve_subscription_id(
    explicit: Option<String>,
    configured: Option<String>,
) -> Result<String> {
    let given = |id: Option<String>, what: &'static str| async move {
        id.ok_or_else(|| Error::Config(format!("{} not set", what)))
    };

    let resolved = FallbackChain::new()
        .attempt("argument", given(explicit, "--subscription-id").boxed())
        .attempt("environment", given(configured, "AZURE_SUBSCRIPTION_ID").boxed())
        .attempt("azure-cli", azure_cli_subscription().boxed())
        .run()
        .await
        .map_err(|e| Error::Config(format!("no subscription id available ({})", e)))?;

    tracing::info!("Using subscription {} (from {})", resolved.value, resolved.strategy);
    Ok(resolved.value)
}
