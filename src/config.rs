//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.salesboard.toml` files.

use crate::cli::{Args, Command, OutputFormat};
use crate::report::{default_sections, default_sources, SectionSpec};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".salesboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// API server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Named sources, referenced by report sections.
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, String>,

    /// Table cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Dashboard settings.
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            sources: default_sources(),
            cache: CacheConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Identifier of the orders table behind the ranking endpoints.
    #[serde(default = "default_orders_source")]
    pub orders_source: String,

    /// Entries returned by each ranking endpoint.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            orders_source: default_orders_source(),
            top_n: default_top_n(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_orders_source() -> String {
    "data/orders.csv".to_string()
}

fn default_top_n() -> usize {
    5
}

/// Table cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds before a cached table is refreshed. 0 keeps tables forever.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    /// Timeout for fetching URL sources.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            fetch_timeout_seconds: default_fetch_timeout(),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime for the table cache, `None` when entries never expire.
    pub fn ttl(&self) -> Option<Duration> {
        match self.ttl_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_fetch_timeout() -> u64 {
    30
}

/// Dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Dashboard title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Sections in display order.
    #[serde(default = "default_sections")]
    pub sections: Vec<SectionSpec>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            output: default_output(),
            format: OutputFormat::default(),
            sections: default_sections(),
        }
    }
}

fn default_title() -> String {
    "UrbanMart Business Insights".to_string()
}

fn default_output() -> String {
    "dashboard.md".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check that every section reads a configured source.
    pub fn validate(&self) -> Result<()> {
        for section in &self.report.sections {
            if !self.sources.contains_key(&section.source) {
                bail!(
                    "Section '{}' reads unknown source '{}'",
                    section.title,
                    section.source
                );
            }
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values given explicitly on the command line (or through the
    /// environment) override the file.
    pub fn merge_with_args(&mut self, args: &Args) -> Result<()> {
        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            Command::Serve {
                bind,
                orders,
                top_n,
            } => {
                if let Some(bind) = bind {
                    self.server.bind = bind.clone();
                }
                if let Some(orders) = orders {
                    self.server.orders_source = orders.clone();
                }
                if let Some(n) = top_n {
                    self.server.top_n = *n;
                }
            }
            Command::Report {
                output,
                format,
                title,
                sources,
                ..
            } => {
                if let Some(output) = output {
                    self.report.output = output.display().to_string();
                }
                if let Some(format) = format {
                    self.report.format = *format;
                }
                if let Some(title) = title {
                    self.report.title = title.clone();
                }
                for pair in sources {
                    let (name, identifier) = pair
                        .split_once('=')
                        .with_context(|| format!("Invalid --source '{}': expected NAME=ID", pair))?;
                    self.sources
                        .insert(name.trim().to_string(), identifier.trim().to_string());
                }
            }
            Command::InitConfig => {}
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
