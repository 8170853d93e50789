use crate::factors::FactorTable;
use crate::models::{CostRow, EmissionEstimate, Summary};

/// Rounds the exact binary value to four decimals.
pub fn round4(value: f64) -> f64 {
    format!("{:.4}", value).parse().unwrap_or(value)
}

/// Applies service and regional factors to each cost row, preserving order.
pub fn estimate(rows: &[CostRow], factors: &FactorTable) -> Vec<EmissionEstimate> {
    rows.iter()
        .map(|row| {
            if row.cost_usd < 0.0 {
                tracing::warn!(
                    "Negative cost {} for {} in {} on {}, passing through",
                    row.cost_usd,
                    row.service_name,
                    row.location,
                    row.date
                );
            }

            let location = row.location.to_lowercase();
            let service_factor = factors.service_factor(&row.service_name);
            let region_factor = factors.region_factor(&location);

            EmissionEstimate {
                date: row.date,
                service_name: row.service_name.clone(),
                location,
                cost_usd: row.cost_usd,
                estimated_carbon_kg: round4(row.cost_usd * service_factor * region_factor),
                service_factor_used: service_factor,
                region_factor_used: region_factor,
            }
        })
        .collect()
}

pub fn summarize(estimates: &[EmissionEstimate], resource_count: usize) -> Summary {
    Summary {
        total_estimated_carbon_kg: estimates.iter().map(|e| e.estimated_carbon_kg).sum(),
        total_cost_usd: estimates.iter().map(|e| e.cost_usd).sum(),
        resource_count,
        data_point_count: estimates.len(),
    }
}

pub struct Estimator {
    factors: FactorTable,
}

impl Estimator {
    pub fn new(factors: FactorTable) -> Self {
        Self { factors }
    }

    pub fn estimate(&self, rows: &[CostRow]) -> Vec<EmissionEstimate> {
        let estimates = estimate(rows, &self.factors);
        tracing::info!("Calculated carbon estimates for {} data points", estimates.len());
        estimates
    }
}

impl Default for Estimator {
    fn default() -> Self {
        Self::new(FactorTable::builtin())
    }
}
