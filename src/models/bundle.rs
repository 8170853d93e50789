use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::cost::TimeWindow;
use super::estimate::{EmissionEstimate, Summary};

pub const ESTIMATION_METHOD: &str = "Cost-based with regional and service factors";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub extracted_at: DateTime<Utc>,
    pub subscription_id: String,
    pub data_source: String,
    pub carbon_estimation_method: String,
    pub note: String,
    pub time_window: TimeWindow,
}

impl ExportMetadata {
    pub fn new(
        subscription_id: impl Into<String>,
        data_source: impl Into<String>,
        time_window: TimeWindow,
    ) -> Self {
        Self {
            extracted_at: Utc::now(),
            subscription_id: subscription_id.into(),
            data_source: data_source.into(),
            carbon_estimation_method: ESTIMATION_METHOD.to_string(),
            note: "Carbon estimates are calculated based on cost data and industry factors"
                .to_string(),
            time_window,
        }
    }
}

/// The complete record written for one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub metadata: ExportMetadata,
    pub cost_management_data: Option<Value>,
    pub resource_data: Option<Vec<Value>>,
    pub sustainability_data: Option<Map<String, Value>>,
    pub carbon_estimates: Vec<EmissionEstimate>,
    pub summary: Summary,
}
