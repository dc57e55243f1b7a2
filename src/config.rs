use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::paths;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

const DEFAULT_PREFERRED_MODELS: &[&str] = &[
    "openai/gpt-4o-mini",
    "openai/gpt-4o",
    "openai/gpt-3.5-turbo",
    "openai/gpt-4-turbo",
    "anthropic/claude-3-haiku",
    "anthropic/claude-3.5-sonnet",
    "google/gemini-pro-1.5",
    "google/gemini-flash-1.5",
    "mistralai/mistral-large",
    "mistralai/mistral-medium",
    "meta-llama/llama-3-70b-instruct",
    "meta-llama/llama-3-8b-instruct:free",
    "microsoft/wizardlm-2-8x22b",
    "nousresearch/hermes-3-llama-3.1-405b:free",
];

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PromptbenchConfig {
    pub gateway: GatewayConfig,
    pub defaults: DefaultsConfig,
    pub catalog: CatalogConfig,
    pub preferred_models: Vec<String>,
}

impl Default for PromptbenchConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            defaults: DefaultsConfig::default(),
            catalog: CatalogConfig::default(),
            preferred_models: default_preferred_models(),
        }
    }
}

impl PromptbenchConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let raw = fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file at {}", path_ref.display()))?;
        let mut config = Self::from_yaml_str(&raw)
            .with_context(|| format!("Invalid configuration in {}", path_ref.display()))?;
        let base_dir = path_ref.parent().unwrap_or_else(|| Path::new("."));
        config.catalog.resolve_snapshot(base_dir);
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit; treat it as all defaults.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml).context("Unable to parse config YAML")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Explicit path, else the per-user config file when present, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match paths::config_file() {
            Some(path) if path.is_file() => Self::from_path(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.gateway.validate()?;
        self.defaults.validate()?;
        self.catalog.validate()?;
        Ok(())
    }
}

impl FromStr for PromptbenchConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml_str(s)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub referer: Option<String>,
    pub title: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: Some("http://localhost:8000".to_string()),
            title: Some("promptbench".to_string()),
        }
    }
}

impl GatewayConfig {
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn models_url(&self) -> String {
        format!("{}/models", self.base_url.trim_end_matches('/'))
    }

    fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        ensure!(!url.is_empty(), "gateway.base_url must not be empty");
        ensure!(
            url.starts_with("http://") || url.starts_with("https://"),
            "gateway.base_url must be an http(s) URL, got '{url}'"
        );
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DefaultsConfig {
    pub model: String,
    pub temperature: f32,
    pub max_samples: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 1.0,
            max_samples: 5,
        }
    }
}

impl DefaultsConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.model.trim().is_empty(),
            "defaults.model must not be empty"
        );
        validate_temperature(self.temperature)?;
        ensure!(self.max_samples >= 1, "defaults.max_samples must be at least 1");
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub ttl_secs: u64,
    pub snapshot: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            snapshot: None,
        }
    }
}

impl CatalogConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    fn resolve_snapshot(&mut self, base_dir: &Path) {
        if let Some(path) = &self.snapshot
            && path.is_relative()
        {
            self.snapshot = Some(base_dir.join(path));
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.ttl_secs > 0, "catalog.ttl_secs must be positive");
        Ok(())
    }
}

pub fn validate_temperature(value: f32) -> Result<()> {
    ensure!(
        (0.0..=2.0).contains(&value),
        "temperature must be between 0.0 and 2.0, got {value}"
    );
    Ok(())
}

fn default_preferred_models() -> Vec<String> {
    DEFAULT_PREFERRED_MODELS
        .iter()
        .map(|id| id.to_string())
        .collect()
}
