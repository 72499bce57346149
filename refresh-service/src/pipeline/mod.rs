use std::{path::Path, pin::Pin, time::SystemTime};

use eia_client::domain::FuelCategory;
use futures::Stream;

pub mod refresh;

pub use refresh::{
    collect_through, drain, forecast_and_publish, prepare, EtlOutput, EtlReport, ForecastReport, OutputPaths,
    RefreshPipeline, RunReport,
};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("ingestion error: {0}")]
    Ingestion(String),
    #[error("integrity error: {0}")]
    Integrity(String),
    #[error("data quality error in {category}: {reason}")]
    DataQuality { category: FuelCategory, reason: String },
    #[error("model fit error in {category}: {reason}")]
    ModelFit { category: FuelCategory, reason: String },
    #[error("persistence error for {path}: {reason}")]
    Persistence { path: String, reason: String },
    #[error("config error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn persistence(path: &Path, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Stage that raised the error, for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Ingestion(_) => "ingestion",
            Self::Integrity(_) => "normalization",
            Self::DataQuality { .. } => "repair",
            Self::ModelFit { .. } => "forecast",
            Self::Persistence { .. } => "publish",
            Self::Config(_) => "config",
        }
    }
}

impl From<eia_client::ClientError> for PipelineError {
    fn from(e: eia_client::ClientError) -> Self {
        Self::Ingestion(e.to_string())
    }
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}
