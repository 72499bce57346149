use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{json, Value};

use super::ClientError;
use crate::domain::FuelCategory;

pub const DEFAULT_BASE_URL: &str =
    "https://api.eia.gov/v2/electricity/electric-power-operational-data/data/";

/// Facets for the electric-power-operational-data route.
#[derive(Debug, Clone)]
pub struct OperationalDataQuery {
    pub frequency: String,
    pub fuel_categories: Vec<FuelCategory>,
    pub location: String,
    pub sector_id: String,
    pub offset: u32,
    pub length: u32,
}

impl Default for OperationalDataQuery {
    fn default() -> Self {
        Self {
            frequency: "monthly".to_string(),
            fuel_categories: FuelCategory::ALL_CATEGORIES.to_vec(),
            location: "US".to_string(),
            sector_id: "99".to_string(),
            offset: 0,
            length: 5000,
        }
    }
}

impl OperationalDataQuery {
    /// Body of the `X-Params` header understood by the v2 API.
    pub fn x_params(&self) -> Value {
        let fuel_ids: Vec<&str> = self.fuel_categories.iter().map(FuelCategory::code).collect();
        json!({
            "frequency": self.frequency,
            "data": ["generation"],
            "facets": {
                "fueltypeid": fuel_ids,
                "location": [self.location],
                "sectorid": [self.sector_id],
            },
            "sort": [{ "column": "period", "direction": "desc" }],
            "offset": self.offset,
            "length": self.length,
        })
    }
}

/// A row exactly as the API returns it. Descriptive columns are kept optional
/// so shape drift in them never fails deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOperationalRow {
    pub period: String,
    pub location: Option<String>,
    #[serde(rename = "stateDescription")]
    pub state_description: Option<String>,
    pub sectorid: Option<String>,
    #[serde(rename = "sectorDescription")]
    pub sector_description: Option<String>,
    pub fueltypeid: String,
    #[serde(rename = "fuelTypeDescription")]
    pub fuel_type_description: Option<String>,
    /// String, number or null depending on the upstream serializer.
    pub generation: Option<Value>,
    #[serde(rename = "generation-units")]
    pub generation_units: Option<String>,
}

#[derive(Deserialize)]
struct ApiEnvelope {
    response: Option<ApiResponse>,
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Option<Vec<RawOperationalRow>>,
}

/// Parse a full response body into rows.
pub fn parse_response(body: &str) -> Result<Vec<RawOperationalRow>, ClientError> {
    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|e| ClientError::Payload(format!("invalid JSON body: {e}")))?;

    if let Some(err) = envelope.error {
        return Err(ClientError::Payload(format!("upstream error: {err}")));
    }

    envelope
        .response
        .and_then(|r| r.data)
        .ok_or_else(|| ClientError::Payload("missing response.data".to_string()))
}

pub struct EiaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EiaClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ClientError> {
        if api_key.trim().is_empty() {
            return Err(ClientError::Request("api key is empty".to_string()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    /// Single bounded request; the API is expected to return all needed history
    /// within `query.length` rows.
    pub async fn fetch_operational_data(
        &self,
        query: &OperationalDataQuery,
    ) -> Result<Vec<RawOperationalRow>, ClientError> {
        let params = query.x_params().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Params",
            HeaderValue::from_str(&params).map_err(|e| ClientError::Request(e.to_string()))?,
        );

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("api_key", self.api_key.as_str())])
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        let rows = parse_response(&body)?;
        tracing::debug!(rows = rows.len(), "fetched operational data");
        Ok(rows)
    }
}
