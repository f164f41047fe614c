// Tracker entry point: one tracking pass per invocation, non-zero exit on any error.
use anyhow::Context;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracker::config::TrackerSettings;
use tracker::pricing::{AwsCredentials, PricingClient};
use tracker::services::PriceTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tracker=info,gpu_price_tracker=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let settings = TrackerSettings::load().context("Failed to load tracker settings")?;
    info!(
        region = %settings.pricing_region,
        location = %settings.location,
        instances = settings.instances.len(),
        backfill_start = %settings.backfill_start,
        csv = %settings.csv_path.display(),
        "Starting GPU price tracker"
    );

    let credentials = AwsCredentials::from_env()?;
    let client = PricingClient::new(&settings, credentials)?;
    let tracker = PriceTracker::new(client, &settings);

    let summary = tracker.run(Utc::now()).await.context("Tracking run failed")?;
    info!(
        backfilled_months = summary.backfilled_months,
        missing_months = summary.missing_months,
        daily_rows = summary.daily_rows,
        rows_written = summary.rows_written,
        "Tracking run complete"
    );
    Ok(())
}
