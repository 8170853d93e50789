use std::time::Duration;

use futures::FutureExt;
use reqwest::{header, Client, Response};
use serde_json::{json, Map, Value};

use crate::azure::auth::Session;
use crate::error::{Error, Result};
use crate::fallback::FallbackChain;
use crate::models::TimeWindow;

pub const COST_API_VERSION: &str = "2023-11-01";

/// Resource types that carry a meaningful compute/storage footprint.
pub const CARBON_RELEVANT_TYPES: [&str; 7] = [
    "Microsoft.Compute/virtualMachines",
    "Microsoft.Storage/storageAccounts",
    "Microsoft.ContainerService/managedClusters",
    "Microsoft.Sql/servers",
    "Microsoft.DBforPostgreSQL/servers",
    "Microsoft.Web/serverFarms",
    "Microsoft.Network/loadBalancers",
];

const SUSTAINABILITY_ENDPOINTS: [(&str, &str); 3] = [
    (
        "Sustainability Workbook",
        "providers/Microsoft.Insights/workbooks?api-version=2022-04-01&category=workbook",
    ),
    (
        "Resource Health",
        "providers/Microsoft.ResourceHealth/availabilityStatuses?api-version=2022-10-01",
    ),
    (
        "Advisor Recommendations",
        "providers/Microsoft.Advisor/recommendations?api-version=2020-01-01",
    ),
];

/// Thin client over the Azure Resource Manager REST surface.
///
/// Holds no credentials; every call takes the caller's `Session`.
pub struct ManagementClient {
    client: Client,
    base_url: String,
}

impl ManagementClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("azcarbon/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Daily actual cost grouped by service, location and resource group.
    pub async fn query_costs(
        &self,
        session: &Session,
        subscription_id: &str,
        window: &TimeWindow,
    ) -> Result<Value> {
        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.CostManagement/query?api-version={}",
            self.base_url, subscription_id, COST_API_VERSION
        );
        let body = json!({
            "type": "ActualCost",
            "timeframe": "Custom",
            "timePeriod": {
                "from": window.query_from(),
                "to": window.query_to(),
            },
            "dataset": {
                "granularity": "Daily",
                "aggregation": {
                    "totalCost": { "name": "Cost", "function": "Sum" },
                    "totalCostUSD": { "name": "CostUSD", "function": "Sum" }
                },
                "grouping": [
                    { "type": "Dimension", "name": "ServiceName" },
                    { "type": "Dimension", "name": "ResourceLocation" },
                    { "type": "Dimension", "name": "ResourceGroupName" }
                ]
            }
        });

        tracing::info!("Querying Azure Cost Management API");
        self.post_json(session, &url, &body, "Cost Management query").await
    }

    /// Carbon-relevant resources, via Resource Graph with a Resource Manager
    /// listing as the fallback.
    pub async fn list_carbon_resources(
        &self,
        session: &Session,
        subscription_id: &str,
    ) -> Result<Vec<Value>> {
        let resolved = FallbackChain::new()
            .attempt(
                "resource-graph",
                self.resource_graph(session, subscription_id).boxed(),
            )
            .attempt(
                "resource-manager",
                self.resource_manager(session, subscription_id).boxed(),
            )
            .run()
            .await
            .map_err(|e| Error::Upstream(format!("resource inventory unavailable ({})", e)))?;

        tracing::info!(
            "Resource data retrieved via {}: {} carbon-relevant resources",
            resolved.strategy,
            resolved.value.len()
        );
        Ok(resolved.value)
    }

    async fn resource_graph(&self, session: &Session, subscription_id: &str) -> Result<Vec<Value>> {
        let url = format!(
            "{}/providers/Microsoft.ResourceGraph/resources?api-version=2021-03-01",
            self.base_url
        );
        let types = CARBON_RELEVANT_TYPES
            .iter()
            .map(|t| format!("'{}'", t.to_lowercase()))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "Resources | where type in~ ({}) | project name, type, location, resourceGroup, subscriptionId, tags | limit 1000",
            types
        );
        let body = json!({
            "subscriptions": [subscription_id],
            "query": query,
        });

        let data = self.post_json(session, &url, &body, "Resource Graph query").await?;
        match data.get("data") {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(Error::ParseError(
                "Resource Graph response has no data array".to_string(),
            )),
        }
    }

    async fn resource_manager(&self, session: &Session, subscription_id: &str) -> Result<Vec<Value>> {
        let url = format!(
            "{}/subscriptions/{}/resources?api-version=2021-04-01",
            self.base_url, subscription_id
        );
        let data = self.get_json(session, &url, "Resource Manager listing").await?;

        let items = match data.get("value") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::ParseError(
                    "Resource Manager response has no value array".to_string(),
                ))
            }
        };

        Ok(items
            .iter()
            .filter(|r| {
                r.get("type")
                    .and_then(Value::as_str)
                    .map(|t| CARBON_RELEVANT_TYPES.iter().any(|c| c.eq_ignore_ascii_case(t)))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    /// Each endpoint is independent; failures are logged and skipped.
    pub async fn sustainability_payloads(
        &self,
        session: &Session,
        subscription_id: &str,
    ) -> Option<Map<String, Value>> {
        tracing::info!("Querying for sustainability data");
        let mut results = Map::new();

        for (name, path) in SUSTAINABILITY_ENDPOINTS {
            let url = format!("{}/subscriptions/{}/{}", self.base_url, subscription_id, path);
            match self.get_json(session, &url, name).await {
                Ok(data) => {
                    let count = data
                        .get("value")
                        .and_then(Value::as_array)
                        .map(|v| v.len().to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    tracing::info!("{}: {} items", name, count);
                    results.insert(name.to_string(), data);
                }
                Err(e) => tracing::warn!("{} unavailable: {}", name, e),
            }
        }

        if results.is_empty() {
            None
        } else {
            Some(results)
        }
    }

    async fn post_json(&self, session: &Session, url: &str, body: &Value, what: &str) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, session.bearer())
            .json(body)
            .send()
            .await?;
        read_json(response, what).await
    }

    async fn get_json(&self, session: &Session, url: &str, what: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, session.bearer())
            .send()
            .await?;
        read_json(response, what).await
    }
}

async fn read_json(response: Response, what: &str) -> Result<Value> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Auth(format!("{} rejected the token ({})", what, status)));
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(Error::Upstream(format!("{} failed: {} - {}", what, status, snippet)));
    }
    Ok(response.json().await?)
}
