use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::plan::{Dimension, QuantityRange};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlanwiseConfig {
    pub catalog: CatalogSection,
    #[serde(default)]
    pub metrics: MetricsSection,
    #[serde(default)]
    pub oracle: OracleSection,
    #[serde(default)]
    pub browse: BrowseSection,
    /// Directory the config was loaded from; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl PlanwiseConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn catalog_database(&self) -> PathBuf {
        self.resolve_path(&self.catalog.database)
    }

    pub fn metrics_database(&self) -> PathBuf {
        self.resolve_path(&self.metrics.database)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSection {
    pub database: String,
    #[serde(default = "default_keyword_result_limit")]
    pub keyword_result_limit: usize,
    #[serde(default = "default_known_providers")]
    pub known_providers: Vec<String>,
    #[serde(default = "default_price_terms")]
    pub price_terms: Vec<String>,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            database: "plans.sqlite".into(),
            keyword_result_limit: default_keyword_result_limit(),
            known_providers: default_known_providers(),
            price_terms: default_price_terms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSection {
    #[serde(default = "default_metrics_database")]
    pub database: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            database: default_metrics_database(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleSection {
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl OracleSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            endpoint: default_oracle_endpoint(),
            model: default_oracle_model(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Ranges offered to the browse flow before any catalog has been loaded.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BrowseSection {
    #[serde(default = "default_price_range")]
    pub price: (f64, f64),
    #[serde(default = "default_data_range")]
    pub data: (f64, f64),
    #[serde(default = "default_voice_range")]
    pub voice: (f64, f64),
    #[serde(default = "default_sms_range")]
    pub sms: (f64, f64),
}

impl BrowseSection {
    pub fn range(&self, dimension: Dimension) -> (f64, f64) {
        match dimension {
            Dimension::Price => self.price,
            Dimension::Data => self.data,
            Dimension::Voice => self.voice,
            Dimension::Sms => self.sms,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        for dimension in Dimension::ALL {
            let (min, max) = self.range(dimension);
            QuantityRange::new(min, max)
                .map_err(|err| format!("browse.{dimension}: {err}"))?;
        }
        Ok(())
    }
}

impl Default for BrowseSection {
    fn default() -> Self {
        Self {
            price: default_price_range(),
            data: default_data_range(),
            voice: default_voice_range(),
            sms: default_sms_range(),
        }
    }
}

fn default_keyword_result_limit() -> usize {
    3
}

fn default_known_providers() -> Vec<String> {
    vec!["dhiraagu".into(), "ooredoo".into()]
}

fn default_price_terms() -> Vec<String> {
    ["less than", "under", "below", "cheaper than", "maximum", "max"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_metrics_database() -> String {
    "metrics.sqlite".into()
}

fn default_true() -> bool {
    true
}

fn default_oracle_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

fn default_oracle_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_api_key_env() -> String {
    "GOOGLE_AI_API_KEY".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_price_range() -> (f64, f64) {
    (0.0, 2000.0)
}

fn default_data_range() -> (f64, f64) {
    (0.0, 100.0)
}

fn default_voice_range() -> (f64, f64) {
    (0.0, 3000.0)
}

fn default_sms_range() -> (f64, f64) {
    (0.0, 5000.0)
}

pub fn load_planwise_config<P: AsRef<Path>>(path: P) -> Result<PlanwiseConfig> {
    let path = path.as_ref();
    let mut config: PlanwiseConfig = load_toml(path)?;
    config.browse.validate().map_err(|reason| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;
    config.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
