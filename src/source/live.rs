use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::azure::{parse_cost_rows, ManagementClient, Session};
use crate::error::{Error, Result};
use crate::models::{CostReport, TimeWindow};
use crate::source::DataSource;

pub struct AzureSource {
    client: ManagementClient,
    session: Session,
    subscription_id: String,
}

impl AzureSource {
    pub fn new(client: ManagementClient, session: Session, subscription_id: impl Into<String>) -> Self {
        Self {
            client,
            session,
            subscription_id: subscription_id.into(),
        }
    }
}

#[async_trait]
impl DataSource for AzureSource {
    async fn fetch_cost_rows(&self, window: &TimeWindow) -> Result<CostReport> {
        let raw = self
            .client
            .query_costs(&self.session, &self.subscription_id, window)
            .await?;
        let rows = match parse_cost_rows(&raw) {
            Ok(rows) => rows,
            Err(Error::ParseError(reason)) => {
                // keep the payload for export even when no rows can be read from it
                tracing::warn!("Cost Management response not in query shape: {}", reason);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        tracing::info!("Cost Management data retrieved: {} rows", rows.len());
        Ok(CostReport { raw, rows })
    }

    async fn fetch_resource_inventory(&self) -> Result<Vec<Value>> {
        self.client
            .list_carbon_resources(&self.session, &self.subscription_id)
            .await
    }

    async fn fetch_sustainability(&self) -> Result<Option<Map<String, Value>>> {
        Ok(self
            .client
            .sustainability_payloads(&self.session, &self.subscription_id)
            .await)
    }

    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn description(&self) -> &str {
        "Azure Management APIs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::MANAGEMENT_SCOPE;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_cost_rows_keep_raw_payload() {
        let server = MockServer::start().await;
        let payload = json!({
            "properties": {
                "columns": [{"name": "CostUSD"}, {"name": "UsageDate"}, {"name": "ServiceName"}, {"name": "ResourceLocation"}],
                "rows": [[12.0, 20240110, "Microsoft.Web/serverFarms", "westus"]]
            }
        });
        Mock::given(method("POST"))
            .and(path("/subscriptions/sub-9/providers/Microsoft.CostManagement/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
            .mount(&server)
            .await;

        let source = AzureSource::new(
            ManagementClient::new(server.uri()).unwrap(),
            Session::new("tok", MANAGEMENT_SCOPE, "test"),
            "sub-9",
        );
        let window = TimeWindow::last_days(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(), 30);
        let report = source.fetch_cost_rows(&window).await.unwrap();

        assert_eq!(report.raw, payload);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].service_name, "Microsoft.Web/serverFarms");
        assert_eq!(source.subscription_id(), "sub-9");
    }

    #[tokio::test]
    async fn test_unrecognised_cost_payload_is_kept() {
        let server = MockServer::start().await;
        let payload = json!({"id": "query-1", "value": [{"cost": 3.0}]});
        Mock::given(method("POST"))
            .and(path("/subscriptions/sub-9/providers/Microsoft.CostManagement/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
            .mount(&server)
            .await;

        let source = AzureSource::new(
            ManagementClient::new(server.uri()).unwrap(),
            Session::new("tok", MANAGEMENT_SCOPE, "test"),
            "sub-9",
        );
        let window = TimeWindow::last_days(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(), 30);
        let report = source.fetch_cost_rows(&window).await.unwrap();

        assert_eq!(report.raw, payload);
        assert!(report.rows.is_empty());
    }
}
