pub mod live;
pub mod demo;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{CostReport, TimeWindow};

pub use demo::DemoSource;
pub use live::AzureSource;

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_cost_rows(&self, window: &TimeWindow) -> Result<CostReport>;
    async fn fetch_resource_inventory(&self) -> Result<Vec<Value>>;
    async fn fetch_sustainability(&self) -> Result<Option<Map<String, Value>>>;
    fn subscription_id(&self) -> &str;
    fn description(&self) -> &str;
}
