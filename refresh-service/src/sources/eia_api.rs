use std::{pin::Pin, time::Duration};

use eia_client::{EiaClient, OperationalDataQuery, RawOperationalRow};
use futures::Stream;

use crate::{
    config::SourceConfig,
    pipeline::{Envelope, PipelineError, Source},
};

/// Pulls the monthly operational-data history from the EIA API in one
/// bounded request and streams its rows.
pub struct EiaApiSource {
    client: std::sync::Arc<EiaClient>,
    query: OperationalDataQuery,
}

impl EiaApiSource {
    pub fn new(client: EiaClient, query: OperationalDataQuery) -> Self {
        Self {
            client: std::sync::Arc::new(client),
            query,
        }
    }

    /// Resolve the credential and build the client. A missing credential is an
    /// ingestion error, never an empty default.
    pub fn from_config(cfg: &SourceConfig) -> Result<Self, PipelineError> {
        let api_key = cfg.resolve_api_key()?;
        let client = EiaClient::new(&cfg.base_url, &api_key, Duration::from_secs(cfg.timeout_secs))?;
        let query = OperationalDataQuery {
            length: cfg.length,
            ..OperationalDataQuery::default()
        };
        Ok(Self::new(client, query))
    }
}

#[async_trait::async_trait]
impl Source<RawOperationalRow> for EiaApiSource {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<RawOperationalRow>, PipelineError>> + Send>> {
        let client = self.client.clone();
        let query = self.query.clone();
        let s = async_stream::try_stream! {
            let rows = client.fetch_operational_data(&query).await.map_err(|e| {
                metrics::counter!("eia_fetch_errors_total").increment(1);
                PipelineError::from(e)
            })?;

            if rows.len() as u32 >= query.length {
                tracing::warn!(
                    rows = rows.len(),
                    length = query.length,
                    "response filled the request length; older history may be truncated"
                );
            }
            metrics::counter!("ingested_records_total").increment(rows.len() as u64);

            for row in rows {
                yield Envelope::new(row);
            }
        };

        Box::pin(s)
    }
}
