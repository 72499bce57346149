use anyhow::Result;
use eia_client::domain::ObservationRecord;
use refresh_service::{
    config::AppConfig,
    observability,
    pipeline::{drain, forecast_and_publish},
    sources::HistoricalCsvFileSource,
};

/// Forecasts from the already-published historical dataset. Refuses to run if
/// the ETL stage has not produced it.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let paths = cfg.output.paths();

    let source = HistoricalCsvFileSource::new(&paths.historical);
    let observations: Vec<ObservationRecord> = drain(&source).await?;
    tracing::info!(
        path = %paths.historical.display(),
        rows = observations.len(),
        "loaded historical dataset"
    );

    let report = forecast_and_publish(
        &observations,
        &cfg.forecast.engine(),
        cfg.forecast.policy(),
        &paths.forecast,
    )
    .await?;

    tracing::info!(
        rows = report.forecast.rows,
        digest = %report.forecast.digest,
        omitted = report.failed_categories.len(),
        "forecast stage complete"
    );

    Ok(())
}
