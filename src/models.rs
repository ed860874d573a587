//! Data models for dashboards.
//!
//! This module contains the structures passed from the report pipeline to
//! the renderer: chart bindings, per-section outcomes and the dashboard
//! itself.

use crate::table::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a section is meant to be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Bar chart, optionally grouped by a color column
    Bar,
    /// Pie or donut chart
    Pie,
    /// Line chart over an ordered x axis
    Line,
    /// Plain table
    Table,
    /// Headline figures
    Metric,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKind::Bar => write!(f, "Bar"),
            ChartKind::Pie => write!(f, "Pie"),
            ChartKind::Line => write!(f, "Line"),
            ChartKind::Table => write!(f, "Table"),
            ChartKind::Metric => write!(f, "Metric"),
        }
    }
}

impl ChartKind {
    /// Returns an emoji representation of the chart kind.
    pub fn emoji(&self) -> &'static str {
        match self {
            ChartKind::Bar => "📊",
            ChartKind::Pie => "🥧",
            ChartKind::Line => "📈",
            ChartKind::Table => "📋",
            ChartKind::Metric => "🔢",
        }
    }
}

/// Chart kind plus the columns bound to each axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    /// Column on the x axis (or pie labels).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Column on the y axis (or pie values).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// Column used to split series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ChartSpec {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            x: None,
            y: None,
            color: None,
        }
    }

    pub fn x(mut self, column: &str) -> Self {
        self.x = Some(column.to_string());
        self
    }

    pub fn y(mut self, column: &str) -> Self {
        self.y = Some(column.to_string());
        self
    }

    pub fn color(mut self, column: &str) -> Self {
        self.color = Some(column.to_string());
        self
    }
}

/// What became of a section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SectionOutcome {
    /// The section produced rows.
    Rendered { table: Table },
    /// The section ran but nothing was left to show.
    Empty,
    /// Loading or aggregation failed; other sections are unaffected.
    Failed { message: String },
}

/// A single rendered (or placeholder) dashboard section.
#[derive(Debug, Clone, Serialize)]
pub struct SectionReport {
    pub title: String,
    /// Name of the configured source the section reads.
    pub source: String,
    pub chart: ChartSpec,
    pub outcome: SectionOutcome,
}

impl SectionReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SectionOutcome::Failed { .. })
    }
}

/// Count of sections by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub total: usize,
    pub rendered: usize,
    pub empty: usize,
    pub failed: usize,
}

impl SectionSummary {
    /// Creates a summary from a list of sections.
    pub fn from_sections(sections: &[SectionReport]) -> Self {
        let mut summary = Self {
            total: sections.len(),
            ..Self::default()
        };

        for section in sections {
            match section.outcome {
                SectionOutcome::Rendered { .. } => summary.rendered += 1,
                SectionOutcome::Empty => summary.empty += 1,
                SectionOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        summary
    }
}

/// Metadata about a dashboard run.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetadata {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    /// Source name to identifier.
    pub sources: BTreeMap<String, String>,
    pub duration_seconds: f64,
}

/// A complete dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub metadata: DashboardMetadata,
    pub sections: Vec<SectionReport>,
    pub summary: SectionSummary,
}
