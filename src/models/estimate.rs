use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionEstimate {
    pub date: NaiveDate,
    pub service_name: String,
    pub location: String,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
    pub estimated_carbon_kg: f64,
    #[serde(rename = "carbonIntensityFactor")]
    pub service_factor_used: f64,
    #[serde(rename = "regionalFactor")]
    pub region_factor_used: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_estimated_carbon_kg: f64,
    #[serde(rename = "totalCostUSD")]
    pub total_cost_usd: f64,
    pub resource_count: usize,
    pub data_point_count: usize,
}
