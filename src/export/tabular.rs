use std::io::Write;

use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::EmissionEstimate;

pub const CSV_HEADER: [&str; 7] = [
    "date",
    "serviceName",
    "location",
    "costUSD",
    "estimatedCarbonKg",
    "carbonIntensityFactor",
    "regionalFactor",
];

/// Flat record for one estimate. Field order matches `CSV_HEADER`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvRow {
    pub date: NaiveDate,
    #[serde(rename = "serviceName")]
    pub service_name: String,
    pub location: String,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
    #[serde(rename = "estimatedCarbonKg")]
    pub estimated_carbon_kg: f64,
    #[serde(rename = "carbonIntensityFactor")]
    pub carbon_intensity_factor: f64,
    #[serde(rename = "regionalFactor")]
    pub regional_factor: f64,
}

impl From<&EmissionEstimate> for CsvRow {
    fn from(e: &EmissionEstimate) -> Self {
        Self {
            date: e.date,
            service_name: e.service_name.clone(),
            location: e.location.clone(),
            cost_usd: e.cost_usd,
            estimated_carbon_kg: e.estimated_carbon_kg,
            carbon_intensity_factor: e.service_factor_used,
            regional_factor: e.region_factor_used,
        }
    }
}

pub fn to_csv_rows(estimates: &[EmissionEstimate]) -> Vec<CsvRow> {
    estimates.iter().map(CsvRow::from).collect()
}

/// Writes the header line followed by one line per row.
///
/// The header is always written, so an empty estimate list still yields a
/// well-formed file.
pub fn write_csv<W: Write>(rows: &[CsvRow], writer: W) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn render_csv(estimates: &[EmissionEstimate]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&to_csv_rows(estimates), &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::estimator::estimate;
    use crate::factors::FactorTable;
    use crate::models::CostRow;

    fn rows() -> Vec<CostRow> {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        vec![
            CostRow::new(d(1), "Microsoft.Compute/virtualMachines", "eastus", 100.0),
            CostRow::new(d(1), "Storage, Premium", "NorthEurope", 7.77),
            CostRow::new(d(2), "X", "mars", 10.0),
        ]
    }

    #[test]
    fn test_header_first() {
        let csv = render_csv(&estimate(&rows(), &FactorTable::builtin())).unwrap();
        let first = csv.lines().next().unwrap();
        assert_eq!(
            first,
            "date,serviceName,location,costUSD,estimatedCarbonKg,carbonIntensityFactor,regionalFactor"
        );
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_empty_estimates_write_header_only() {
        let csv = render_csv(&[]).unwrap();
        assert_eq!(csv.trim_end(), CSV_HEADER.join(","));
    }

    #[test]
    fn test_embedded_comma_is_quoted() {
        let csv = render_csv(&estimate(&rows(), &FactorTable::builtin())).unwrap();
        let line = csv.lines().nth(2).unwrap();
        assert!(line.starts_with("2024-01-01,\"Storage, Premium\",northeurope,7.77,"));
    }

    #[test]
    fn test_csv_round_trip_preserves_tuples() {
        let estimates = estimate(&rows(), &FactorTable::builtin());
        let csv = render_csv(&estimates).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let parsed: Vec<CsvRow> = reader.deserialize().collect::<std::result::Result<_, _>>().unwrap();

        let expected: Vec<_> = estimates
            .iter()
            .map(|e| (e.date, e.service_name.clone(), e.location.clone(), e.cost_usd, e.estimated_carbon_kg))
            .collect();
        let actual: Vec<_> = parsed
            .iter()
            .map(|r| (r.date, r.service_name.clone(), r.location.clone(), r.cost_usd, r.estimated_carbon_kg))
            .collect();
        assert_eq!(actual, expected);
    }
}
