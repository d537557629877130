use std::{path::Path, str::FromStr};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::upload::DEFAULT_MAX_VIDEO_BYTES;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_DEVELOPMENT_URL: &str = "http://localhost:8000";
const DEFAULT_URL: &str = "http://localhost:8000";
const DEMO_URL: &str = "https://shop-the-look.sample-app.pinecone.io";

/// Results rendered per page in the terminal
const DEFAULT_PAGE_SIZE: usize = 12;

const DEFAULT_SUGGESTIONS: &[&str] = &["Stripes", "Clouds", "University", "America", "Surprise me"];

/// Deployment environment; selects the backend base url.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Preview,
    Production,
    Demo,
    #[default]
    Default,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "preview" => Ok(Environment::Preview),
            "production" => Ok(Environment::Production),
            "demo" => Ok(Environment::Demo),
            "default" | "" => Ok(Environment::Default),
            other => bail!("unknown environment {other:?}"),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Track events at all
    #[serde(default)]
    pub enabled: bool,

    /// Collector url; events only go to the log when unset
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default = "default_development_url")]
    pub development_url: String,

    /// Host name only, `https://` is prepended
    #[serde(default)]
    pub preview_host: String,

    /// Host name only, `https://` is prepended
    #[serde(default)]
    pub production_host: String,

    #[serde(default = "default_suggestions")]
    pub suggestions: Vec<String>,

    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: u64,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Explicit base url, bypasses `environment` (SCOUT_ADDR)
    #[serde(skip_serializing, skip_deserializing)]
    addr_override: Option<String>,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

fn default_development_url() -> String {
    DEFAULT_DEVELOPMENT_URL.to_string()
}

fn default_suggestions() -> Vec<String> {
    DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

fn default_max_video_bytes() -> u64 {
    DEFAULT_MAX_VIDEO_BYTES
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Default,
            development_url: default_development_url(),
            preview_host: String::new(),
            production_host: String::new(),
            suggestions: default_suggestions(),
            max_video_bytes: default_max_video_bytes(),
            page_size: default_page_size(),
            telemetry: TelemetryConfig::default(),
            addr_override: None,
            base_path: String::new(),
        }
    }
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be greater than 0");
        }

        if let Some(idx) = self.suggestions.iter().position(|s| s.trim().is_empty()) {
            bail!("suggestions[{idx}] is blank");
        }

        if self.max_video_bytes == 0 {
            bail!("max_video_bytes must be greater than 0");
        }

        if let Some(endpoint) = &self.telemetry.endpoint {
            url::Url::parse(endpoint)
                .with_context(|| format!("telemetry.endpoint is not a valid url: {endpoint:?}"))?;
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let path = Path::new(base_path).join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            std::fs::create_dir_all(base_path)
                .with_context(|| format!("failed to create {base_path}"))?;
            Self {
                base_path: base_path.to_string(),
                ..Default::default()
            }
            .save()?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Path::new(&self.base_path).join(CONFIG_FILE);
        std::fs::write(&path, serde_yml::to_string(&self)?)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Apply SCOUT_* overrides. `var` is `std::env::var` outside of tests.
    pub fn apply_env<F>(&mut self, var: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = var("SCOUT_ENV") {
            self.environment = env.parse()?;
        }
        if let Some(url) = var("SCOUT_DEVELOPMENT_URL") {
            self.development_url = url;
        }
        if let Some(host) = var("SCOUT_PREVIEW_HOST") {
            self.preview_host = host;
        }
        if let Some(host) = var("SCOUT_PRODUCTION_HOST") {
            self.production_host = host;
        }
        if let Some(addr) = var("SCOUT_ADDR").filter(|a| !a.trim().is_empty()) {
            self.addr_override = Some(addr);
        }

        Ok(())
    }

    /// Backend base url, without a trailing slash.
    pub fn base_url(&self) -> anyhow::Result<String> {
        let raw = match &self.addr_override {
            Some(addr) => addr.clone(),
            None => match self.environment {
                Environment::Development => self.development_url.clone(),
                Environment::Preview => https(&self.preview_host, "preview_host")?,
                Environment::Production => https(&self.production_host, "production_host")?,
                Environment::Demo => DEMO_URL.to_string(),
                Environment::Default => DEFAULT_URL.to_string(),
            },
        };

        url::Url::parse(&raw).with_context(|| format!("invalid backend url {raw:?}"))?;

        Ok(raw.trim_end_matches('/').to_string())
    }
}

fn https(host: &str, field: &str) -> anyhow::Result<String> {
    let host = host.trim();
    if host.is_empty() {
        bail!("{field} is not set");
    }
    Ok(format!("https://{host}"))
}
