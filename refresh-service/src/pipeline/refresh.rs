use std::path::{Path, PathBuf};

use eia_client::{
    domain::{FuelCategory, ObservationRecord, YearlyAggregate},
    RawOperationalRow,
};
use futures::StreamExt;

use super::{Envelope, PipelineError, Source, Transform};
use crate::{
    forecast::{assemble, FailurePolicy, ForecastEngine},
    sinks::{CsvFileSink, DatasetRow, HistoricalRow, PublishedFile},
    transform::{self, Normalization},
};

/// Where each published dataset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub historical: PathBuf,
    pub yearly: PathBuf,
    pub forecast: PathBuf,
}

/// Repaired monthly history and its yearly rollup.
#[derive(Debug, Clone)]
pub struct EtlOutput {
    pub observations: Vec<ObservationRecord>,
    pub yearly: Vec<YearlyAggregate>,
}

#[derive(Debug, Clone)]
pub struct EtlReport {
    pub historical: PublishedFile,
    pub yearly: PublishedFile,
    pub repaired_values: usize,
}

#[derive(Debug, Clone)]
pub struct ForecastReport {
    pub forecast: PublishedFile,
    /// Categories omitted from the forecast, with the cause.
    pub failed_categories: Vec<(FuelCategory, String)>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub etl: EtlReport,
    pub forecast: ForecastReport,
}

impl RunReport {
    pub fn is_degraded(&self) -> bool {
        !self.forecast.failed_categories.is_empty()
    }
}

/// Drain a source through a per-row transform, stopping at the first error.
pub async fn collect_through<S, T, I, O>(source: &S, transform: &T) -> Result<Vec<O>, PipelineError>
where
    S: Source<I> + ?Sized,
    T: Transform<I, O> + ?Sized,
{
    let mut stream = source.stream().await;
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        let env = transform.apply(item?).await?;
        out.push(env.payload);
    }
    Ok(out)
}

/// Drain a source whose rows are already canonical.
pub async fn drain<S, T>(source: &S) -> Result<Vec<T>, PipelineError>
where
    S: Source<T> + ?Sized,
{
    let mut stream = source.stream().await;
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        out.push(item?.payload);
    }
    Ok(out)
}

/// Repair, check and roll up normalized observations.
pub fn prepare(observations: Vec<ObservationRecord>) -> Result<(EtlOutput, usize), PipelineError> {
    transform::check_integrity(&observations)?;

    let (observations, repaired) = transform::repair_backward(observations);
    metrics::counter!("repaired_values_total").increment(repaired as u64);
    transform::ensure_complete(&observations)?;

    let yearly = transform::aggregate_yearly(&observations);
    tracing::info!(
        observations = observations.len(),
        repaired,
        yearly_rows = yearly.len(),
        "history prepared"
    );
    Ok((EtlOutput { observations, yearly }, repaired))
}

async fn publish<R: DatasetRow>(path: &Path, rows: Vec<R>) -> Result<PublishedFile, PipelineError> {
    let sink = CsvFileSink::<R>::new(path);
    let stream = futures::stream::iter(rows.into_iter().map(|r| Ok(Envelope::new(r))));
    sink.publish(stream).await
}

/// Every stage in order: ingest, repair, roll up, forecast, assemble,
/// publish. A stage never runs after its predecessor failed.
pub struct RefreshPipeline<S> {
    pub source: S,
    pub engine: ForecastEngine,
    pub policy: FailurePolicy,
    pub paths: OutputPaths,
}

impl<S> RefreshPipeline<S>
where
    S: Source<RawOperationalRow> + Send + Sync + 'static,
{
    /// Ingestion, repair and yearly rollup; publishes the historical and
    /// yearly datasets.
    pub async fn run_etl(&self) -> Result<(EtlOutput, EtlReport), PipelineError> {
        let observations =
            collect_through::<_, _, RawOperationalRow, ObservationRecord>(&self.source, &Normalization).await?;
        tracing::info!(rows = observations.len(), "ingested upstream rows");

        let (output, repaired_values) = prepare(observations)?;

        let historical_rows = output
            .observations
            .iter()
            .map(HistoricalRow::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let historical = publish(&self.paths.historical, historical_rows).await?;
        let yearly = publish(&self.paths.yearly, output.yearly.clone()).await?;

        Ok((
            output,
            EtlReport {
                historical,
                yearly,
                repaired_values,
            },
        ))
    }

    pub async fn run(self) -> Result<RunReport, PipelineError> {
        let (output, etl) = self.run_etl().await?;
        let forecast = forecast_and_publish(&output.observations, &self.engine, self.policy, &self.paths.forecast).await?;
        Ok(RunReport { etl, forecast })
    }
}

/// Forecast every non-aggregate category and publish the assembled series.
pub async fn forecast_and_publish(
    observations: &[ObservationRecord],
    engine: &ForecastEngine,
    policy: FailurePolicy,
    path: &Path,
) -> Result<ForecastReport, PipelineError> {
    let outcomes = engine.forecast_all(observations).await;
    let assembled = assemble(outcomes, policy)?;

    if assembled.is_degraded() {
        for (category, reason) in &assembled.failed {
            tracing::warn!(category = %category, reason = %reason, "category omitted from forecast");
        }
    }

    let forecast = publish(path, assembled.records).await?;
    Ok(ForecastReport {
        forecast,
        failed_categories: assembled.failed,
    })
}
