use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::CostRow;

#[derive(Debug, Deserialize)]
struct QueryResult {
    properties: QueryProperties,
}

#[derive(Debug, Deserialize)]
struct QueryProperties {
    #[serde(default)]
    columns: Vec<QueryColumn>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct QueryColumn {
    name: String,
}

struct ColumnIndex {
    date: Option<usize>,
    service: Option<usize>,
    location: Option<usize>,
    cost_usd: Option<usize>,
}

impl ColumnIndex {
    fn new(columns: &[QueryColumn]) -> Self {
        let find = |names: &[&str]| {
            columns
                .iter()
                .position(|c| names.iter().any(|n| c.name.eq_ignore_ascii_case(n)))
        };
        Self {
            date: find(&["UsageDate", "Date"]),
            service: find(&["ServiceName"]),
            location: find(&["ResourceLocation"]),
            cost_usd: find(&["CostUSD"]),
        }
    }
}

/// Converts a Cost Management query response (`properties.columns` +
/// `properties.rows`) into typed cost rows.
///
/// Rows without a parseable date are dropped. A missing cost column or cell
/// counts as zero.
pub fn parse_cost_rows(raw: &Value) -> Result<Vec<CostRow>> {
    let result = QueryResult::deserialize(raw)
        .map_err(|e| Error::ParseError(format!("unexpected cost query shape: {}", e)))?;
    let index = ColumnIndex::new(&result.properties.columns);

    if index.date.is_none() {
        tracing::warn!("Cost query response has no date column; rows cannot be placed on a day");
    }
    if index.cost_usd.is_none() {
        tracing::warn!("Cost query response has no CostUSD column; treating cost as 0");
    }

    let cell = |row: &[Value], idx: Option<usize>| idx.and_then(|i| row.get(i)).cloned();

    let mut rows = Vec::with_capacity(result.properties.rows.len());
    let mut dropped = 0usize;
    let mut dropped_cost = 0.0;

    for row in &result.properties.rows {
        let cost_usd = cell(row, index.cost_usd)
            .as_ref()
            .and_then(parse_number)
            .unwrap_or(0.0);
        let Some(date) = cell(row, index.date).as_ref().and_then(parse_usage_date) else {
            dropped += 1;
            dropped_cost += cost_usd;
            continue;
        };

        let service_name = cell(row, index.service)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "Unknown".to_string());
        let location = cell(row, index.location)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        rows.push(CostRow::new(date, service_name, location, cost_usd));
    }

    if dropped > 0 {
        tracing::warn!(
            "Dropped {} cost rows without a usable date (${:.2} USD not estimated)",
            dropped,
            dropped_cost
        );
    }
    tracing::debug!("Parsed {} cost rows", rows.len());
    Ok(rows)
}

/// Accepts `20240131`, `"20240131"`, `"2024-01-31"` and `"2024-01-31T00:00:00..."`.
fn parse_usage_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => {
            let n = n.as_u64()?;
            let year = i32::try_from(n / 10_000).ok()?;
            NaiveDate::from_ymd_opt(year, ((n / 100) % 100) as u32, (n % 100) as u32)
        }
        Value::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y%m%d")
                .or_else(|_| NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d"))
                .ok()
        }
        _ => None,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
