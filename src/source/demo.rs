use async_trait::async_trait;
use chrono::Datelike;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};

use crate::azure::parse_cost_rows;
use crate::error::Result;
use crate::models::{CostReport, TimeWindow};
use crate::source::DataSource;

pub const DEMO_SUBSCRIPTION: &str = "demo-subscription-id";

struct DemoWorkload {
    service: &'static str,
    location: &'static str,
    resource_group: &'static str,
    resource_name: &'static str,
    daily_cost: (f64, f64),
}

const WORKLOADS: [DemoWorkload; 6] = [
    DemoWorkload {
        service: "Microsoft.Compute/virtualMachines",
        location: "eastus",
        resource_group: "rg-compute",
        resource_name: "demo-vm-01",
        daily_cost: (20.0, 60.0),
    },
    DemoWorkload {
        service: "Microsoft.Storage/storageAccounts",
        location: "westeurope",
        resource_group: "rg-data",
        resource_name: "demostorage01",
        daily_cost: (2.0, 10.0),
    },
    DemoWorkload {
        service: "Microsoft.Web/serverFarms",
        location: "northeurope",
        resource_group: "rg-web",
        resource_name: "demo-plan-01",
        daily_cost: (5.0, 15.0),
    },
    DemoWorkload {
        service: "Microsoft.Sql/servers",
        location: "southeastasia",
        resource_group: "rg-data",
        resource_name: "demo-sql-01",
        daily_cost: (8.0, 25.0),
    },
    DemoWorkload {
        service: "Microsoft.ContainerService/managedClusters",
        location: "westus",
        resource_group: "rg-aks",
        resource_name: "demo-aks-01",
        daily_cost: (15.0, 45.0),
    },
    DemoWorkload {
        service: "Microsoft.Web/sites",
        location: "centralus",
        resource_group: "rg-web",
        resource_name: "demo-func-01",
        daily_cost: (0.5, 4.0),
    },
];

/// Offline data source producing plausible cost data from a fixed seed.
///
/// The same seed and window always produce the same rows.
pub struct DemoSource {
    seed: u64,
}

impl DemoSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Synthetic payload in the Cost Management query response shape.
    pub fn cost_payload(&self, window: &TimeWindow) -> Value {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut rows = Vec::new();

        for day in window.days() {
            let usage_date = day.year() as i64 * 10_000 + day.month() as i64 * 100 + day.day() as i64;
            for workload in &WORKLOADS {
                let (lo, hi) = workload.daily_cost;
                let cost = (rng.gen_range(lo..hi) * 100.0).round() / 100.0;
                rows.push(json!([
                    cost,
                    cost,
                    usage_date,
                    workload.service,
                    workload.location,
                    workload.resource_group,
                    "USD"
                ]));
            }
        }

        json!({
            "id": format!("subscriptions/{}/providers/Microsoft.CostManagement/query/demo", DEMO_SUBSCRIPTION),
            "name": "demo",
            "type": "Microsoft.CostManagement/query",
            "properties": {
                "nextLink": null,
                "columns": [
                    {"name": "Cost", "type": "Number"},
                    {"name": "CostUSD", "type": "Number"},
                    {"name": "UsageDate", "type": "Number"},
                    {"name": "ServiceName", "type": "String"},
                    {"name": "ResourceLocation", "type": "String"},
                    {"name": "ResourceGroupName", "type": "String"},
                    {"name": "Currency", "type": "String"}
                ],
                "rows": rows
            }
        })
    }
}

#[async_trait]
impl DataSource for DemoSource {
    async fn fetch_cost_rows(&self, window: &TimeWindow) -> Result<CostReport> {
        let raw = self.cost_payload(window);
        let rows = parse_cost_rows(&raw)?;
        tracing::info!("Generated {} demo cost rows (seed {})", rows.len(), self.seed);
        Ok(CostReport { raw, rows })
    }

    async fn fetch_resource_inventory(&self) -> Result<Vec<Value>> {
        Ok(WORKLOADS
            .iter()
            .map(|w| {
                json!({
                    "name": w.resource_name,
                    "type": w.service,
                    "location": w.location,
                    "resourceGroup": w.resource_group,
                    "subscriptionId": DEMO_SUBSCRIPTION,
                    "tags": {"environment": "demo"}
                })
            })
            .collect())
    }

    async fn fetch_sustainability(&self) -> Result<Option<Map<String, Value>>> {
        let mut payloads = Map::new();
        payloads.insert(
            "Demo Sustainability Report".to_string(),
            json!({
                "reportType": "OverallSummaryReport",
                "dataSource": "Synthetic generator",
                "seed": self.seed
            }),
        );
        Ok(Some(payloads))
    }

    fn subscription_id(&self) -> &str {
        DEMO_SUBSCRIPTION
    }

    fn description(&self) -> &str {
        "Synthetic demo data"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> TimeWindow {
        TimeWindow::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 7).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_same_seed_same_rows() {
        let a = DemoSource::new(7).fetch_cost_rows(&window()).await.unwrap();
        let b = DemoSource::new(7).fetch_cost_rows(&window()).await.unwrap();
        assert_eq!(a.rows, b.rows);
        assert_eq!(a.raw, b.raw);
    }

    #[tokio::test]
    async fn test_different_seed_different_costs() {
        let a = DemoSource::new(1).fetch_cost_rows(&window()).await.unwrap();
        let b = DemoSource::new(2).fetch_cost_rows(&window()).await.unwrap();
        assert_ne!(a.rows, b.rows);
    }

    #[tokio::test]
    async fn test_one_row_per_day_and_workload() {
        let report = DemoSource::new(42).fetch_cost_rows(&window()).await.unwrap();
        assert_eq!(report.rows.len(), 7 * WORKLOADS.len());
        assert_eq!(report.rows[0].date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(report.rows.iter().all(|r| r.cost_usd > 0.0));
        assert!(report
            .rows
            .iter()
            .all(|r| (r.cost_usd * 100.0 - (r.cost_usd * 100.0).round()).abs() < 1e-6));
    }

    #[tokio::test]
    async fn test_inventory_matches_workloads() {
        let source = DemoSource::new(42);
        let resources = source.fetch_resource_inventory().await.unwrap();
        assert_eq!(resources.len(), WORKLOADS.len());
        assert_eq!(source.subscription_id(), DEMO_SUBSCRIPTION);
    }
}
