//! Table sources.
//!
//! A source identifier is a filesystem path or an `http(s)://` URL,
//! optionally followed by `#name` to pick one dataset out of a JSON
//! document. The format is chosen from the extension (`.json`) or, for URLs,
//! the response `Content-Type`; everything else is read as CSV.

pub mod cache;
pub mod delimited;
pub mod document;

pub use cache::TableCache;

use crate::error::SourceError;
use crate::table::Table;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A record dropped during a lenient parse.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 1-based line for CSV, 1-based element index for JSON arrays.
    pub line: u64,
    pub reason: String,
}

/// Parser output: the table plus whatever had to be skipped.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub table: Table,
    pub skipped: Vec<SkippedRow>,
}

/// Document format of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

/// A parsed source identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceId {
    /// Path or URL without the dataset suffix.
    pub location: String,
    /// Dataset selected with `#name`.
    pub dataset: Option<String>,
}

impl SourceId {
    pub fn parse(identifier: &str) -> Self {
        match identifier.rsplit_once('#') {
            Some((location, dataset)) if !dataset.is_empty() => Self {
                location: location.to_string(),
                dataset: Some(dataset.to_string()),
            },
            _ => Self {
                location: identifier.trim_end_matches('#').to_string(),
                dataset: None,
            },
        }
    }

    pub fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }

    /// Format implied by the location's extension.
    pub fn format(&self) -> Format {
        let path = self.location.split(['?', '#']).next().unwrap_or_default();
        if path.to_ascii_lowercase().ends_with(".json") || self.dataset.is_some() {
            Format::Json
        } else {
            Format::Csv
        }
    }
}

/// Anything that can turn an identifier into a table.
pub trait TableSource: Send + Sync {
    fn load(
        &self,
        identifier: &str,
    ) -> impl Future<Output = Result<Arc<Table>, SourceError>> + Send;
}

/// Loads tables from files and URLs.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    http_client: reqwest::Client,
    timeout_seconds: u64,
}

impl SourceLoader {
    /// Create a loader whose HTTP fetches give up after `timeout_seconds`.
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            timeout_seconds,
        })
    }

    async fn read_file(&self, identifier: &str, id: &SourceId) -> Result<ParsedTable, SourceError> {
        let bytes = tokio::fs::read(&id.location)
            .await
            .map_err(|e| SourceError::unavailable(identifier, e))?;

        match id.format() {
            Format::Json => document::parse_json(identifier, &bytes, id.dataset.as_deref()),
            Format::Csv => delimited::parse_csv(identifier, bytes.as_slice()),
        }
    }

    async fn fetch(&self, identifier: &str, id: &SourceId) -> Result<ParsedTable, SourceError> {
        let response = self
            .http_client
            .get(&id.location)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("request timed out after {}s", self.timeout_seconds)
                } else if e.is_connect() {
                    format!("cannot connect: {}", e)
                } else {
                    format!("request failed: {}", e)
                };
                SourceError::unavailable(identifier, reason)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::unavailable(identifier, format!("HTTP {}", status)));
        }

        let json_content = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::unavailable(identifier, e))?;

        if json_content || id.format() == Format::Json {
            document::parse_json(identifier, &bytes, id.dataset.as_deref())
        } else {
            delimited::parse_csv(identifier, bytes.as_ref())
        }
    }
}

impl TableSource for SourceLoader {
    async fn load(&self, identifier: &str) -> Result<Arc<Table>, SourceError> {
        let id = SourceId::parse(identifier);
        debug!("Loading source {:?}", id);

        let parsed = if id.is_remote() {
            self.fetch(identifier, &id).await?
        } else {
            self.read_file(identifier, &id).await?
        };

        for row in &parsed.skipped {
            warn!("{}: skipped record {}: {}", identifier, row.line, row.reason);
        }

        info!(
            "Loaded {} rows x {} columns from {}{}",
            parsed.table.num_rows(),
            parsed.table.num_columns(),
            identifier,
            if parsed.skipped.is_empty() {
                String::new()
            } else {
                format!(" ({} skipped)", parsed.skipped.len())
            }
        );

        Ok(Arc::new(parsed.table))
    }
}

/// A source fronted by a [`TableCache`].
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    cache: TableCache,
}

impl<S: TableSource> CachedSource<S> {
    pub fn new(inner: S, cache: TableCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }
}

impl<S: TableSource> TableSource for CachedSource<S> {
    async fn load(&self, identifier: &str) -> Result<Arc<Table>, SourceError> {
        self.cache
            .get_or_load(identifier, || self.inner.load(identifier))
            .await
    }
}
