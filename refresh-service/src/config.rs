use serde::Deserialize;
use std::{fs, path::PathBuf};

use crate::{
    forecast::{FailurePolicy, ForecastEngine, SarimaxSpec},
    pipeline::{OutputPaths, PipelineError},
};

fn default_base_url() -> String {
    eia_client::api::operational_data::DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "EIA_API_KEY".to_string()
}

fn default_length() -> u32 {
    5000
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable checked first for the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// File holding the API key, used when the variable is unset.
    pub api_key_file: Option<PathBuf>,
    #[serde(default = "default_length")]
    pub length: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn resolve_api_key(&self) -> Result<String, PipelineError> {
        if let Ok(key) = std::env::var(&self.api_key_env) {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }

        if let Some(path) = &self.api_key_file {
            let key = fs::read_to_string(path).map_err(|e| {
                PipelineError::Ingestion(format!("failed to read api key file {}: {e}", path.display()))
            })?;
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
            return Err(PipelineError::Ingestion(format!("api key file {} is empty", path.display())));
        }

        Err(PipelineError::Ingestion(format!(
            "no api key: set {} or source.api_key_file",
            self.api_key_env
        )))
    }
}

fn default_historical_file() -> String {
    "electricity.csv".to_string()
}

fn default_yearly_file() -> String {
    "yearly_data.csv".to_string()
}

fn default_forecast_file() -> String {
    "monthly_forecast.csv".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
    #[serde(default = "default_historical_file")]
    pub historical_file: String,
    #[serde(default = "default_yearly_file")]
    pub yearly_file: String,
    #[serde(default = "default_forecast_file")]
    pub forecast_file: String,
}

impl OutputConfig {
    pub fn paths(&self) -> OutputPaths {
        OutputPaths {
            historical: self.data_dir.join(&self.historical_file),
            yearly: self.data_dir.join(&self.yearly_file),
            forecast: self.data_dir.join(&self.forecast_file),
        }
    }
}

fn default_horizon() -> u32 {
    12
}

fn default_max_iterations() -> usize {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_horizon")]
    pub horizon: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Fail the whole run if any category's model cannot be fitted.
    #[serde(default)]
    pub fail_on_model_error: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            max_iterations: default_max_iterations(),
            fail_on_model_error: false,
        }
    }
}

impl ForecastConfig {
    pub fn engine(&self) -> ForecastEngine {
        let spec = SarimaxSpec {
            max_iterations: self.max_iterations,
            ..SarimaxSpec::default()
        };
        ForecastEngine::new(spec, self.horizon)
    }

    pub fn policy(&self) -> FailurePolicy {
        FailurePolicy::from_flag(self.fail_on_model_error)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("REFRESH_CONFIG").unwrap_or_else(|_| "refresh-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg = Self::from_toml(&contents)?;
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self, PipelineError> {
        let cfg: AppConfig = toml::from_str(contents).map_err(|e| PipelineError::Config(e.to_string()))?;
        if cfg.forecast.horizon == 0 {
            return Err(PipelineError::Config("forecast.horizon must be positive".to_string()));
        }
        if cfg.forecast.max_iterations == 0 {
            return Err(PipelineError::Config("forecast.max_iterations must be positive".to_string()));
        }
        Ok(cfg)
    }
}
