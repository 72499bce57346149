use anyhow::Result;
use refresh_service::{
    config::AppConfig,
    metrics_server,
    observability,
    pipeline::{PipelineError, RefreshPipeline},
    sources::EiaApiSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let source = EiaApiSource::from_config(&cfg.source)?;
    let pipeline = RefreshPipeline {
        source,
        engine: cfg.forecast.engine(),
        policy: cfg.forecast.policy(),
        paths: cfg.output.paths(),
    };

    let report = match pipeline.run().await {
        Ok(report) => report,
        Err(e) => {
            log_failure(&e);
            return Err(e.into());
        }
    };

    tracing::info!(
        historical = %report.etl.historical.path.display(),
        historical_digest = %report.etl.historical.digest,
        yearly_digest = %report.etl.yearly.digest,
        forecast_rows = report.forecast.forecast.rows,
        forecast_digest = %report.forecast.forecast.digest,
        repaired = report.etl.repaired_values,
        degraded = report.is_degraded(),
        "refresh complete"
    );

    Ok(())
}

fn log_failure(e: &PipelineError) {
    tracing::error!(stage = e.stage(), error = %e, "refresh aborted");
}
