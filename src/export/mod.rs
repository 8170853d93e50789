pub mod tabular;

use serde_json::{Map, Value};

use crate::analysis::estimator::summarize;
use crate::error::Result;
use crate::models::{EmissionEstimate, ExportBundle, ExportMetadata};

pub use self::tabular::{render_csv, to_csv_rows, write_csv, CsvRow, CSV_HEADER};

pub fn build_bundle(
    metadata: ExportMetadata,
    cost_raw: Option<Value>,
    resource_raw: Option<Vec<Value>>,
    sustainability_raw: Option<Map<String, Value>>,
    estimates: Vec<EmissionEstimate>,
) -> ExportBundle {
    let resource_count = resource_raw.as_ref().map(Vec::len).unwrap_or(0);
    let summary = summarize(&estimates, resource_count);

    ExportBundle {
        metadata,
        cost_management_data: cost_raw,
        resource_data: resource_raw,
        sustainability_data: sustainability_raw,
        carbon_estimates: estimates,
        summary,
    }
}

pub fn render_json(bundle: &ExportBundle) -> Result<String> {
    Ok(serde_json::to_string_pretty(bundle)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::estimator::estimate;
    use crate::factors::FactorTable;
    use crate::models::{CostRow, TimeWindow};
    use chrono::NaiveDate;
    use serde_json::json;

    fn window() -> TimeWindow {
        TimeWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
        .unwrap()
    }

    fn sample_estimates() -> Vec<EmissionEstimate> {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        estimate(
            &[
                CostRow::new(d1, "Microsoft.Compute/virtualMachines", "eastus", 100.0),
                CostRow::new(d1, "Microsoft.Storage/storageAccounts", "westeurope", 12.5),
                CostRow::new(d2, "X", "mars", 10.0),
            ],
            &FactorTable::builtin(),
        )
    }

    #[test]
    fn test_bundle_summary() {
        let estimates = sample_estimates();
        let expected_carbon: f64 = estimates.iter().map(|e| e.estimated_carbon_kg).sum();

        let bundle = build_bundle(
            ExportMetadata::new("sub-1", "test", window()),
            Some(json!({"properties": {"rows": []}})),
            Some(vec![json!({"name": "vm1"}), json!({"name": "sa1"})]),
            None,
            estimates,
        );

        assert_eq!(bundle.summary.total_estimated_carbon_kg, expected_carbon);
        assert_eq!(bundle.summary.total_cost_usd, 122.5);
        assert_eq!(bundle.summary.resource_count, 2);
        assert_eq!(bundle.summary.data_point_count, 3);
    }

    #[test]
    fn test_missing_resources_count_as_zero() {
        let bundle = build_bundle(
            ExportMetadata::new("sub-1", "test", window()),
            None,
            None,
            None,
            Vec::new(),
        );
        assert_eq!(bundle.summary.resource_count, 0);
        assert_eq!(bundle.summary.total_estimated_carbon_kg, 0.0);
    }

    #[test]
    fn test_json_layout() {
        let mut sustainability = Map::new();
        sustainability.insert("Advisor Recommendations".into(), json!({"value": []}));

        let bundle = build_bundle(
            ExportMetadata::new("sub-1", "Azure Management APIs", window()),
            None,
            Some(Vec::new()),
            Some(sustainability),
            sample_estimates(),
        );
        let text = render_json(&bundle).unwrap();

        assert!(text.starts_with("{\n  \"metadata\": {\n    \"extractedAt\""));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["metadata"]["subscriptionId"], "sub-1");
        assert_eq!(value["metadata"]["timeWindow"]["from"], "2024-01-01");
        assert_eq!(value["carbonEstimates"][0]["costUSD"], 100.0);
        assert_eq!(value["carbonEstimates"][0]["estimatedCarbonKg"], 20.25);
        assert_eq!(value["carbonEstimates"][0]["carbonIntensityFactor"], 0.45);
        assert_eq!(value["carbonEstimates"][0]["regionalFactor"], 0.45);
        assert_eq!(value["summary"]["dataPointCount"], 3);
        assert!(value["costManagementData"].is_null());
        assert!(value["sustainabilityData"]["Advisor Recommendations"].is_object());

        let back: ExportBundle = serde_json::from_str(&text).unwrap();
        assert_eq!(back.metadata, bundle.metadata);
        assert_eq!(back.carbon_estimates.len(), 3);
    }
}
