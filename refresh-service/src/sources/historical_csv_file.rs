use std::{path::PathBuf, pin::Pin};

use eia_client::domain::ObservationRecord;
use futures::Stream;

use crate::{
    pipeline::{Envelope, PipelineError, Source},
    sinks::{read_rows, HistoricalRow},
};

/// Reads the published historical dataset so the forecast stage can run on
/// its own after the ETL stage.
///
/// Rows whose `year`/`month` disagree with `period` are rejected.
pub struct HistoricalCsvFileSource {
    path: PathBuf,
}

impl HistoricalCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn to_observation(row: HistoricalRow) -> Result<ObservationRecord, PipelineError> {
    if row.year != row.period.year() || row.month != row.period.month() {
        return Err(PipelineError::Integrity(format!(
            "{} {}: year/month columns ({}, {}) disagree with period",
            row.fuel_category, row.period, row.year, row.month
        )));
    }
    Ok(row.into())
}

#[async_trait::async_trait]
impl Source<ObservationRecord> for HistoricalCsvFileSource {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<ObservationRecord>, PipelineError>> + Send>> {
        let path = self.path.clone();
        let s = async_stream::try_stream! {
            // Missing file means the ETL stage never published.
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                Err::<(), _>(PipelineError::Ingestion(format!(
                    "historical dataset {} not found; run the etl stage first",
                    path.display()
                )))?;
            }

            let read_path = path.clone();
            let rows = tokio::task::spawn_blocking(move || read_rows::<HistoricalRow>(&read_path))
                .await
                .map_err(|e| PipelineError::persistence(&path, e))??;

            for row in rows {
                yield Envelope::new(to_observation(row)?);
            }
        };

        Box::pin(s)
    }
}
