use std::future::Future;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::analysis::estimator::Estimator;
use crate::config::ExtractConfig;
use crate::error::{Error, Result};
use crate::export::build_bundle;
use crate::models::{CostReport, ExportBundle, ExportMetadata, TimeWindow};
use crate::source::DataSource;
use crate::storage::write_local;

pub struct ExtractionPipeline {
    source: Box<dyn DataSource>,
    fallback: Option<Box<dyn DataSource>>,
    estimator: Estimator,
    config: ExtractConfig,
}

#[derive(Debug)]
pub struct ExtractionOutcome {
    pub bundle: ExportBundle,
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    /// Sources that failed and were left empty in the bundle.
    pub degraded: Vec<String>,
    pub used_fallback: bool,
}

struct Collected {
    cost: Option<CostReport>,
    resources: Option<Vec<Value>>,
    sustainability: Option<Map<String, Value>>,
    failures: Vec<String>,
}

impl Collected {
    fn is_empty(&self) -> bool {
        self.cost.is_none() && self.resources.is_none() && self.sustainability.is_none()
    }
}

impl ExtractionPipeline {
    pub fn new(source: impl DataSource + 'static, estimator: Estimator, config: ExtractConfig) -> Self {
        Self {
            source: Box::new(source),
            fallback: None,
            estimator,
            config,
        }
    }

    /// Source to use when every call against the primary source fails.
    pub fn with_fallback(mut self, fallback: impl DataSource + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub async fn run(&self, window: &TimeWindow) -> Result<ExtractionOutcome> {
        tracing::info!(
            "Starting carbon data extraction from {} for {} to {}",
            self.source.description(),
            window.from,
            window.to
        );

        let mut source = self.source.as_ref();
        let mut collected = collect(source, window).await?;
        let mut used_fallback = false;

        if collected.is_empty() {
            let reasons = collected.failures.join("; ");
            match &self.fallback {
                Some(fallback) => {
                    tracing::warn!(
                        "All {} calls failed, falling back to {}",
                        source.description(),
                        fallback.description()
                    );
                    source = fallback.as_ref();
                    let mut failures = std::mem::take(&mut collected.failures);
                    collected = collect(source, window).await?;
                    failures.append(&mut collected.failures);
                    collected.failures = failures;
                    used_fallback = true;
                }
                None => {
                    return Err(Error::Upstream(format!(
                        "every data source failed and no fallback is enabled ({})",
                        reasons
                    )));
                }
            }
        }

        let rows = collected.cost.as_ref().map(|c| c.rows.as_slice()).unwrap_or(&[]);
        let estimates = self.estimator.estimate(rows);

        let mut metadata = ExportMetadata::new(source.subscription_id(), source.description(), *window);
        if used_fallback {
            metadata.note = format!("Live Azure APIs were not accessible, using {}", source.description());
        }

        let bundle = build_bundle(
            metadata,
            collected.cost.map(|c| c.raw),
            collected.resources,
            collected.sustainability,
            estimates,
        );

        write_local(&bundle, &self.config.json_path, &self.config.csv_path)?;

        tracing::info!(
            "Total estimated carbon footprint: {:.2} kg CO2 over ${:.2} USD",
            bundle.summary.total_estimated_carbon_kg,
            bundle.summary.total_cost_usd
        );

        Ok(ExtractionOutcome {
            bundle,
            json_path: self.config.json_path.clone(),
            csv_path: self.config.csv_path.clone(),
            degraded: collected.failures,
            used_fallback,
        })
    }
}

async fn collect(source: &dyn DataSource, window: &TimeWindow) -> Result<Collected> {
    let mut failures = Vec::new();

    let cost = best_effort("cost data", source.fetch_cost_rows(window), &mut failures).await?;
    let resources = best_effort(
        "resource inventory",
        source.fetch_resource_inventory(),
        &mut failures,
    )
    .await?;
    let sustainability = best_effort(
        "sustainability data",
        source.fetch_sustainability(),
        &mut failures,
    )
    .await?
    .flatten();

    Ok(Collected {
        cost,
        resources,
        sustainability,
        failures,
    })
}

/// Degrades a failed fetch to `None`. Fatal errors still propagate.
async fn best_effort<T>(
    what: &str,
    fetch: impl Future<Output = Result<T>>,
    failures: &mut Vec<String>,
) -> Result<Option<T>> {
    match fetch.await {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!("{} unavailable: {}", what, e);
            failures.push(format!("{}: {}", what, e));
            Ok(None)
        }
    }
}
