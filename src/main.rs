use anyhow::{Context, Result};
use catalogue_pipeline::CataloguePipeline;
use catalogue_pipeline::config::PipelineConfig;
use catalogue_pipeline::fetcher::source_from_config;
use catalogue_pipeline::processor::{aggregation, sort_classification_options, unique_sorted};
use catalogue_pipeline::storage::{DashboardSummary, RecordStore, SnapshotWriter};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "configs/catalogue.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before the filter reads RUST_LOG
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let no_export = args.iter().any(|arg| arg == "--no-export");
    let config_path = args
        .iter()
        .position(|arg| arg == "--config" || arg == "-c")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);

    info!("Starting catalogue pipeline with config {}", config_path);
    let config = PipelineConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let pipeline = CataloguePipeline::from_config(&config)?;
    let store = RecordStore::new();
    let source = source_from_config(&config.source)?;

    let summary = match pipeline.load(source.as_ref(), &store).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Catalogue load failed: {:#}", e);
            return Err(e);
        }
    };

    let records = store.snapshot();
    let kpis = aggregation::kpis(records.as_slice());
    info!(
        "Loaded {} products from {} ({} blank rows dropped)",
        summary.records, summary.source, summary.report.blank_rows_dropped
    );
    info!(
        "Units this year: {:.0}, last year: {:.0}",
        kpis.units_this_year, kpis.units_last_year
    );
    info!(
        "Revenue: £{:.2} (reported YTD £{:.2}), profit: £{:.2}, stock value: £{:.2}",
        kpis.revenue, kpis.reported_revenue_ytd, kpis.profit, kpis.stock_value
    );
    info!("Content ready: {} of {}", kpis.content_ready, kpis.products);

    let cap = config.metrics.weeks_of_cover_cap;
    let overstocked = records
        .iter()
        .filter(|r| r.metrics.weeks_of_cover_capped(cap).value() == Some(cap))
        .count();
    if overstocked > 0 {
        warn!("{} products have at least {:.0} weeks of cover", overstocked, cap);
    }
    info!(
        "Brands: {}, classifications: {:?}",
        unique_sorted(records.iter().map(|r| r.brand.as_str())).len(),
        sort_classification_options(&unique_sorted(
            records.iter().map(|r| r.classification.as_str())
        ))
    );

    if no_export || !config.export.enabled {
        warn!("Export disabled, skipping Parquet and summary output");
        return Ok(());
    }

    let writer = SnapshotWriter::new(&config.export.output_dir);
    let dataset = &config.source.dataset;

    let parquet_path = writer.write_parquet(&records, dataset).await?;
    let dashboard = DashboardSummary::build(
        dataset,
        &records,
        &config.filter,
        config.export.top_n,
        &summary.report,
    );
    let summary_path = writer.write_summary(&dashboard, dataset).await?;

    info!(
        "Catalogue pipeline completed: {} and {}",
        parquet_path.display(),
        summary_path.display()
    );
    Ok(())
}
