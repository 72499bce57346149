use anyhow::Result;
use refresh_service::{
    config::AppConfig,
    observability,
    pipeline::RefreshPipeline,
    sources::{EiaApiSource, RawRowsFileSource},
};

/// Runs ingestion, repair and the yearly rollup only. With a path argument the
/// rows come from a saved API response instead of the live endpoint.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let paths = cfg.output.paths();
    let policy = cfg.forecast.policy();

    let report = match std::env::args().nth(1) {
        Some(saved) => {
            tracing::info!(path = %saved, "replaying saved response");
            let pipeline = RefreshPipeline {
                source: RawRowsFileSource::new(saved),
                engine: cfg.forecast.engine(),
                policy,
                paths,
            };
            pipeline.run_etl().await?.1
        }
        None => {
            let pipeline = RefreshPipeline {
                source: EiaApiSource::from_config(&cfg.source)?,
                engine: cfg.forecast.engine(),
                policy,
                paths,
            };
            pipeline.run_etl().await?.1
        }
    };

    tracing::info!(
        historical_rows = report.historical.rows,
        historical_digest = %report.historical.digest,
        yearly_rows = report.yearly.rows,
        yearly_digest = %report.yearly.digest,
        repaired = report.repaired_values,
        "etl stage complete"
    );

    Ok(())
}
