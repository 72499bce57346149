use std::{
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use eia_client::domain::{FuelCategory, ForecastRecord, ObservationRecord, Period, YearlyAggregate};
use futures::StreamExt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::pipeline::{Envelope, PipelineError, Sink};

/// A row type with a fixed, published column contract.
pub trait DatasetRow: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLUMNS: &'static [&'static str];
}

/// Historical dataset row: repaired monthly generation plus derived calendar
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRow {
    pub period: Period,
    pub fuel_category: FuelCategory,
    pub generation: f64,
    pub year: i32,
    pub month: u8,
}

impl DatasetRow for HistoricalRow {
    const COLUMNS: &'static [&'static str] = &["period", "fuel_category", "generation", "year", "month"];
}

impl DatasetRow for YearlyAggregate {
    const COLUMNS: &'static [&'static str] = &["year", "fuel_category", "generation_sum"];
}

impl DatasetRow for ForecastRecord {
    const COLUMNS: &'static [&'static str] = &["period", "fuel_category", "generation"];
}

impl TryFrom<&ObservationRecord> for HistoricalRow {
    type Error = PipelineError;

    fn try_from(r: &ObservationRecord) -> Result<Self, Self::Error> {
        let generation = r.generation.ok_or_else(|| PipelineError::DataQuality {
            category: r.fuel_category,
            reason: format!("cannot publish missing generation at {}", r.period),
        })?;
        Ok(Self {
            period: r.period,
            fuel_category: r.fuel_category,
            generation,
            year: r.year(),
            month: r.month(),
        })
    }
}

impl From<HistoricalRow> for ObservationRecord {
    fn from(row: HistoricalRow) -> Self {
        ObservationRecord {
            period: row.period,
            fuel_category: row.fuel_category,
            generation: Some(row.generation),
        }
    }
}

/// A file that has been atomically published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFile {
    pub path: PathBuf,
    pub rows: usize,
    /// blake3 of the published bytes; equal digests mean identical reruns.
    pub digest: String,
}

pub fn encode_rows<R: DatasetRow>(rows: &[R]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(R::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// Write `rows` to `path` through a temporary file in the same directory,
/// renamed into place only once fully written and synced.
pub fn publish_rows<R: DatasetRow>(path: &Path, rows: &[R]) -> Result<PublishedFile, PipelineError> {
    let bytes = encode_rows(rows).map_err(|e| PipelineError::persistence(path, e))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| PipelineError::persistence(path, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| PipelineError::persistence(path, e))?;
    tmp.write_all(&bytes).map_err(|e| PipelineError::persistence(path, e))?;
    tmp.as_file().sync_all().map_err(|e| PipelineError::persistence(path, e))?;
    tmp.persist(path).map_err(|e| PipelineError::persistence(path, e.error))?;

    let published = PublishedFile {
        path: path.to_path_buf(),
        rows: rows.len(),
        digest: blake3::hash(&bytes).to_hex().to_string(),
    };
    metrics::counter!("published_files_total").increment(1);
    tracing::info!(
        path = %published.path.display(),
        rows = published.rows,
        digest = %published.digest,
        "dataset published"
    );
    Ok(published)
}

/// Read a published dataset back, checking its header against the contract.
pub fn read_rows<R: DatasetRow>(path: &Path) -> Result<Vec<R>, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| PipelineError::persistence(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| PipelineError::persistence(path, e))?
        .clone();
    if !headers.iter().eq(R::COLUMNS.iter().copied()) {
        return Err(PipelineError::persistence(
            path,
            format!("unexpected columns {:?}, expected {:?}", headers, R::COLUMNS),
        ));
    }

    reader
        .deserialize()
        .collect::<Result<Vec<R>, _>>()
        .map_err(|e| PipelineError::persistence(path, e))
}

/// Sink that collects a stream of rows and publishes them as one file.
///
/// Any upstream error aborts before anything is written, so a failed run never
/// replaces the previous file.
pub struct CsvFileSink<R> {
    path: PathBuf,
    _marker: PhantomData<fn() -> R>,
}

impl<R> CsvFileSink<R> {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: DatasetRow> CsvFileSink<R> {
    pub async fn publish<S>(&self, mut input: S) -> Result<PublishedFile, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<R>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut rows = Vec::new();
        let mut oldest = None;
        while let Some(item) = input.next().await {
            let env = item?;
            oldest = Some(oldest.map_or(env.received_at, |o: std::time::SystemTime| o.min(env.received_at)));
            rows.push(env.payload);
        }

        let path = self.path.clone();
        let published = tokio::task::spawn_blocking(move || publish_rows(&path, &rows))
            .await
            .map_err(|e| PipelineError::persistence(&self.path, e))??;

        if let Some(received) = oldest {
            if let Ok(dur) = std::time::SystemTime::now().duration_since(received) {
                metrics::histogram!("publish_end_to_end_latency_seconds").record(dur.as_secs_f64());
            }
        }
        Ok(published)
    }
}

#[async_trait::async_trait]
impl<R: DatasetRow> Sink<R> for CsvFileSink<R> {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<R>, PipelineError>> + Send + Unpin + 'static,
    {
        self.publish(input).await.map(|_| ())
    }
}
