use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use azcarbon::analysis::ExtractionOutcome;
use azcarbon::azure::auth::resolve_subscription_id;
use azcarbon::azure::{MANAGEMENT_SCOPE, STORAGE_SCOPE};
use azcarbon::models::TimeWindow;
use azcarbon::storage::list_exports;
use azcarbon::{
    AzureSource, BlobUploader, Config, CredentialChain, DemoSource, Estimator, ExtractConfig,
    ExtractionPipeline, FactorTable, ManagementClient,
};

#[derive(Parser, Debug)]
#[command(name = "azcarbon")]
#[command(version = "0.1.0")]
#[command(about = "Estimate Azure carbon emissions from cost data and export them")]
struct Args {
    /// Directory for carbon_data.json and carbon_data.csv
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// TOML file with service and region factors
    #[arg(long, global = true)]
    factors: Option<PathBuf>,

    /// Use synthetic data instead of calling Azure
    #[arg(long, global = true)]
    demo: bool,

    /// Seed for synthetic data
    #[arg(long, global = true)]
    demo_seed: Option<u64>,

    /// Use synthetic data when every Azure call fails
    #[arg(long, global = true)]
    fallback_to_demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract cost data, estimate emissions and write the export files
    Extract {
        #[arg(long)]
        subscription_id: Option<String>,

        /// Number of days to look back from today
        #[arg(long, conflicts_with_all = ["from", "to"])]
        days: Option<u32>,

        /// First day of the window (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,

        /// Last day of the window (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,

        /// Upload the export files to this storage account afterwards
        #[arg(long)]
        storage_account: Option<String>,

        #[arg(long)]
        container: Option<String>,
    },
    /// Upload existing export files to blob storage
    Upload {
        storage_account: String,
        container: Option<String>,
    },
    /// List export files in the output directory
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("azcarbon=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration, CLI flags take precedence
    let mut config = Config::from_env()?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(path) = &args.factors {
        config.factors_file = Some(path.clone());
    }
    if let Some(seed) = args.demo_seed {
        config.demo_seed = seed;
    }

    match &args.command {
        Command::Extract {
            subscription_id,
            days,
            from,
            to,
            storage_account,
            container,
        } => {
            let window = match (from, to) {
                (Some(from), Some(to)) => TimeWindow::new(*from, *to)?,
                _ => TimeWindow::last_days(
                    Utc::now().date_naive(),
                    days.unwrap_or(config.lookback_days),
                ),
            };

            let outcome = extract(&args, &config, subscription_id.clone(), &window).await?;
            println!("{}", format_summary(&outcome));

            let account = storage_account.clone().or_else(|| config.storage_account.clone());
            if let Some(account) = account {
                let container = container.clone().unwrap_or_else(|| config.container.clone());
                let files = [outcome.json_path.clone(), outcome.csv_path.clone()];
                // Local files are kept whatever happens here
                upload(&account, &container, &files)
                    .await
                    .with_context(|| {
                        format!(
                            "upload to {} failed, exports remain in {}",
                            account,
                            config.output_dir.display()
                        )
                    })?;
            }
        }
        Command::Upload {
            storage_account,
            container,
        } => {
            let container = container.clone().unwrap_or_else(|| config.container.clone());
            let files = [config.json_path(), config.csv_path()];
            upload(storage_account, &container, &files).await?;
        }
        Command::Status => {
            print_status(&config)?;
        }
    }

    Ok(())
}

async fn extract(
    args: &Args,
    config: &Config,
    subscription_id: Option<String>,
    window: &TimeWindow,
) -> anyhow::Result<ExtractionOutcome> {
    let factors = match &config.factors_file {
        Some(path) => FactorTable::load(path)
            .with_context(|| format!("loading factor file {}", path.display()))?,
        None => FactorTable::builtin(),
    };
    let estimator = Estimator::new(factors);
    let extract_config = ExtractConfig::from(config);
    let demo = DemoSource::new(config.demo_seed);

    if args.demo {
        tracing::info!("Running in demo mode (seed {})", config.demo_seed);
        let pipeline = ExtractionPipeline::new(demo, estimator, extract_config);
        return Ok(pipeline.run(window).await?);
    }

    let source = match connect(config, subscription_id).await {
        Ok(source) => source,
        Err(e) if args.fallback_to_demo => {
            tracing::warn!("Could not connect to Azure ({:#}), using demo data", e);
            let pipeline = ExtractionPipeline::new(demo, estimator, extract_config);
            return Ok(pipeline.run(window).await?);
        }
        Err(e) => return Err(e),
    };

    let mut pipeline = ExtractionPipeline::new(source, estimator, extract_config);
    if args.fallback_to_demo {
        pipeline = pipeline.with_fallback(demo);
    }
    Ok(pipeline.run(window).await?)
}

async fn connect(config: &Config, subscription_id: Option<String>) -> anyhow::Result<AzureSource> {
    let subscription_id =
        resolve_subscription_id(subscription_id, config.subscription_id.clone()).await?;
    let session = CredentialChain::from_env()?.acquire(MANAGEMENT_SCOPE).await?;
    let client = ManagementClient::new(config.management_endpoint.clone())?;
    Ok(AzureSource::new(client, session, subscription_id))
}

async fn upload(account: &str, container: &str, files: &[PathBuf]) -> anyhow::Result<()> {
    let session = CredentialChain::from_env()?.acquire(STORAGE_SCOPE).await?;
    let uploader = BlobUploader::new(account, session)?;
    upload_with(&uploader, container, files).await
}

async fn upload_with(
    uploader: &BlobUploader,
    container: &str,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    let summary = uploader.upload_all(files, container).await?;

    for url in &summary.uploaded {
        println!("Uploaded {}", url);
    }
    for path in &summary.skipped {
        println!("Skipped {} (not found)", path.display());
    }
    for (path, reason) in &summary.failed {
        println!("Failed {}: {}", path.display(), reason);
    }

    if summary.uploaded.is_empty() {
        anyhow::bail!("nothing was uploaded to container '{}'", container);
    }
    Ok(())
}

fn print_status(config: &Config) -> anyhow::Result<()> {
    let files = list_exports(&config.output_dir)?;
    if files.is_empty() {
        println!("No export files in {}", config.output_dir.display());
        return Ok(());
    }

    println!("Export files in {}:", config.output_dir.display());
    for file in files {
        let modified = file
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  {:<24} {:>10} bytes  {}", name, file.size, modified);
    }
    Ok(())
}

fn format_summary(outcome: &ExtractionOutcome) -> String {
    let mut output = String::new();
    let bundle = &outcome.bundle;

    output.push_str("\n=== Carbon Emissions Export ===\n\n");
    output.push_str(&format!("Subscription: {}\n", bundle.metadata.subscription_id));
    output.push_str(&format!("Data source: {}\n", bundle.metadata.data_source));
    output.push_str(&format!(
        "Window: {} to {}\n\n",
        bundle.metadata.time_window.from, bundle.metadata.time_window.to
    ));

    output.push_str(&format!("Data points: {}\n", bundle.summary.data_point_count));
    output.push_str(&format!("Resources: {}\n", bundle.summary.resource_count));
    output.push_str(&format!("Total cost: ${:.2} USD\n", bundle.summary.total_cost_usd));
    output.push_str(&format!(
        "Estimated carbon: {:.2} kg CO2\n",
        bundle.summary.total_estimated_carbon_kg
    ));

    if !outcome.degraded.is_empty() {
        output.push_str("\nUnavailable:\n");
        for reason in &outcome.degraded {
            output.push_str(&format!("  - {}\n", reason));
        }
    }

    output.push_str(&format!(
        "\nFiles:\n  {}\n  {}\n",
        outcome.json_path.display(),
        outcome.csv_path.display()
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use azcarbon::Session;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn uploader(server: &MockServer) -> BlobUploader {
        BlobUploader::with_endpoint(server.uri(), Session::new("tok", STORAGE_SCOPE, "test")).unwrap()
    }

    #[tokio::test]
    async fn test_rejected_upload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/exports"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/exports/carbon_data.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("carbon_data.json");
        std::fs::write(&json, "{}").unwrap();

        let result = upload_with(&uploader(&server), "exports", &[json.clone()]).await;
        assert!(result.is_err());
        assert!(json.exists());
    }

    #[tokio::test]
    async fn test_successful_upload() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("carbon_data.json");
        std::fs::write(&json, "{}").unwrap();

        assert!(upload_with(&uploader(&server), "exports", &[json]).await.is_ok());
    }

    #[tokio::test]
    async fn test_nothing_uploaded_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("carbon_data.csv");

        assert!(upload_with(&uploader(&server), "exports", &[missing]).await.is_err());
    }
}
