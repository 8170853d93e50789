use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One aggregated cost observation for a (date, service, location) grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRow {
    pub date: NaiveDate,
    pub service_name: String,
    pub location: String,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
}

impl CostRow {
    pub fn new(
        date: NaiveDate,
        service_name: impl Into<String>,
        location: impl Into<String>,
        cost_usd: f64,
    ) -> Self {
        Self {
            date,
            service_name: service_name.into(),
            location: location.into(),
            cost_usd,
        }
    }
}

/// Cost rows together with the upstream payload they were parsed from.
#[derive(Debug, Clone)]
pub struct CostReport {
    pub raw: Value,
    pub rows: Vec<CostRow>,
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl TimeWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(Error::Config(format!(
                "time window start {} is after end {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// The `days` days before `today`, plus `today` itself.
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        Self {
            from: today - Duration::days(i64::from(days)),
            to: today,
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }

    pub fn query_from(&self) -> String {
        format!("{}T00:00:00Z", self.from.format("%Y-%m-%d"))
    }

    pub fn query_to(&self) -> String {
        format!("{}T23:59:59Z", self.to.format("%Y-%m-%d"))
    }
}
