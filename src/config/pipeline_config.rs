use crate::processor::{HeaderAliases, MetricSettings, RecordFilter};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prefix for environment overrides, e.g. `CATALOGUE__SOURCE__PATH`.
pub const ENV_PREFIX: &str = "CATALOGUE";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub metrics: MetricSettings,
    #[serde(default)]
    pub export: ExportSection,
    /// Extra header spellings per canonical field key.
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
    /// Filter applied to the exported dashboard summary.
    #[serde(default)]
    pub filter: RecordFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    pub dataset: String,
    pub path: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    pub enabled: bool,
    pub output_dir: String,
    /// Length of the top-SKU lists in the summary.
    pub top_n: usize,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            dataset: "range_export".to_string(),
            path: Some("data/range_export.csv".to_string()),
            url: None,
        }
    }
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: "output".to_string(),
            top_n: 18,
        }
    }
}

impl PipelineConfig {
    /// Reads a TOML file, then applies `CATALOGUE__*` environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let layered = ::config::Config::builder()
            .add_source(::config::File::new(path, ::config::FileFormat::Toml))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read pipeline config file: {}", path))?;

        let config: PipelineConfig = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse pipeline config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(content).context("Failed to parse pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn header_aliases(&self) -> Result<HeaderAliases> {
        HeaderAliases::from_config(&self.headers)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.dataset.trim().is_empty() {
            return Err(anyhow!("Source dataset name cannot be empty"));
        }

        let has_path = self.source.path.as_deref().is_some_and(|p| !p.trim().is_empty());
        let has_url = self.source.url.as_deref().is_some_and(|u| !u.trim().is_empty());
        if !has_path && !has_url {
            return Err(anyhow!("Source needs either a path or a url"));
        }

        if !(self.metrics.weeks_of_cover_cap > 0.0) {
            return Err(anyhow!(
                "weeks_of_cover_cap must be positive, got {}",
                self.metrics.weeks_of_cover_cap
            ));
        }

        if self.export.enabled && self.export.output_dir.trim().is_empty() {
            return Err(anyhow!("Export output_dir cannot be empty when export is enabled"));
        }

        self.header_aliases()?;
        Ok(())
    }
}
