use std::{path::PathBuf, pin::Pin};

use eia_client::{api::operational_data::parse_response, RawOperationalRow};
use futures::Stream;

use crate::pipeline::{Envelope, PipelineError, Source};

/// Replays a saved EIA API response body (the full JSON document) from disk.
///
/// Used to rerun the pipeline offline against a captured payload.
pub struct RawRowsFileSource {
    path: PathBuf,
}

impl RawRowsFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Source<RawOperationalRow> for RawRowsFileSource {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<RawOperationalRow>, PipelineError>> + Send>> {
        let path = self.path.clone();
        let s = async_stream::try_stream! {
            let body = tokio::fs::read_to_string(&path).await.map_err(|e| {
                PipelineError::Ingestion(format!("failed to read {}: {e}", path.display()))
            })?;
            let rows = parse_response(&body).map_err(PipelineError::from)?;
            metrics::counter!("ingested_records_total").increment(rows.len() as u64);

            for row in rows {
                yield Envelope::new(row);
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn replays_saved_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.json");
        std::fs::write(
            &path,
            r#"{"response": {"data": [
                {"period": "2025-01", "fueltypeid": "COL", "generation": "55000.5"},
                {"period": "2024-12", "fueltypeid": "COL", "generation": 54000}
            ]}}"#,
        )
        .unwrap();

        let rows: Vec<_> = RawRowsFileSource::new(&path).stream().await.collect().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_ref().unwrap().payload.period, "2025-01");
    }

    #[tokio::test]
    async fn missing_file_is_an_ingestion_error() {
        let mut stream = RawRowsFileSource::new("/nonexistent/response.json").stream().await;
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(PipelineError::Ingestion(_))));
    }
}
