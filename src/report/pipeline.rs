//! Report pipeline.
//!
//! A dashboard section is a named source plus a chain of aggregation steps.
//! Dashboard variants differ only in their step chains, so they are plain
//! configuration. Sections are evaluated concurrently and each one fails on
//! its own: a missing source or a bad column marks that section as failed
//! and leaves the rest of the dashboard intact.

use crate::analysis;
use crate::error::{AggregateError, SectionError};
use crate::models::{
    ChartKind, ChartSpec, Dashboard, DashboardMetadata, SectionOutcome, SectionReport,
    SectionSummary,
};
use crate::source::TableSource;
use crate::table::Table;
use chrono::Utc;
use futures::future::join_all;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One aggregation applied to the output of the previous step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    GroupSum {
        keys: Vec<String>,
        value: String,
    },
    TopN {
        n: usize,
        by: String,
        #[serde(default = "default_descending")]
        descending: bool,
    },
    SortBy {
        by: String,
        #[serde(default = "default_descending")]
        descending: bool,
    },
    Frequency {
        column: String,
        #[serde(default)]
        normalize: bool,
    },
    ThresholdFilter {
        column: String,
        min: f64,
    },
    MissingSummary,
    ClassifyValidity {
        reason: String,
    },
    PairCount {
        a: String,
        b: String,
    },
    DeriveProduct {
        left: String,
        right: String,
        output: String,
    },
    CoerceDates {
        column: String,
    },
    DropNulls {
        columns: Vec<String>,
    },
    QualityMetrics,
}

fn default_descending() -> bool {
    true
}

fn as_strs(columns: &[String]) -> Vec<&str> {
    columns.iter().map(String::as_str).collect()
}

impl Step {
    /// Run this step against a table.
    pub fn apply(&self, table: &Table) -> Result<Table, AggregateError> {
        match self {
            Step::GroupSum { keys, value } => analysis::group_sum(table, &as_strs(keys), value),
            Step::TopN { n, by, descending } => analysis::top_n(table, *n, by, *descending),
            Step::SortBy { by, descending } => analysis::sort_by(table, by, *descending),
            Step::Frequency { column, normalize } => {
                analysis::frequency(table, column, *normalize)
            }
            Step::ThresholdFilter { column, min } => {
                analysis::threshold_filter(table, column, *min)
            }
            Step::MissingSummary => Ok(analysis::missing_summary(table)),
            Step::ClassifyValidity { reason } => analysis::classify_validity(table, reason),
            Step::PairCount { a, b } => analysis::group_by_pair_count(table, a, b),
            Step::DeriveProduct {
                left,
                right,
                output,
            } => analysis::derive_product(table, left, right, output),
            Step::CoerceDates { column } => analysis::coerce_dates(table, column),
            Step::DropNulls { columns } => analysis::drop_nulls(table, &as_strs(columns)),
            Step::QualityMetrics => Ok(analysis::quality_metrics(table)),
        }
    }
}

/// Configuration of one dashboard section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub title: String,
    /// Name of an entry in the configured sources.
    pub source: String,
    pub chart: ChartSpec,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl SectionSpec {
    pub fn new(title: &str, source: &str, chart: ChartSpec) -> Self {
        Self {
            title: title.to_string(),
            source: source.to_string(),
            chart,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// Load the section's source and run its steps.
async fn evaluate<S: TableSource>(
    source: &S,
    sources: &BTreeMap<String, String>,
    spec: &SectionSpec,
) -> Result<Table, SectionError> {
    let identifier = sources
        .get(&spec.source)
        .ok_or_else(|| SectionError::UnknownSource(spec.source.clone()))?;

    let loaded = source.load(identifier).await?;

    let Some((first, rest)) = spec.steps.split_first() else {
        return Ok(loaded.as_ref().clone());
    };

    let mut table = first.apply(&loaded)?;
    for step in rest {
        table = step.apply(&table)?;
    }

    Ok(table)
}

/// Evaluate one section; failures become a `Failed` outcome.
pub async fn run_section<S: TableSource>(
    source: &S,
    sources: &BTreeMap<String, String>,
    spec: &SectionSpec,
) -> SectionReport {
    let outcome = match evaluate(source, sources, spec).await {
        Ok(table) if table.is_empty() => {
            debug!("Section '{}' has no rows", spec.title);
            SectionOutcome::Empty
        }
        Ok(table) => SectionOutcome::Rendered { table },
        Err(e) => {
            warn!("Section '{}' failed: {}", spec.title, e);
            SectionOutcome::Failed {
                message: e.to_string(),
            }
        }
    };

    SectionReport {
        title: spec.title.clone(),
        source: spec.source.clone(),
        chart: spec.chart.clone(),
        outcome,
    }
}

/// Evaluate every section and assemble a dashboard.
pub async fn build_dashboard<S: TableSource>(
    source: &S,
    title: &str,
    sources: &BTreeMap<String, String>,
    sections: &[SectionSpec],
    progress: &ProgressBar,
) -> Dashboard {
    let start = Instant::now();
    progress.set_length(sections.len() as u64);

    let reports = join_all(sections.iter().map(|spec| async move {
        let report = run_section(source, sources, spec).await;
        progress.inc(1);
        report
    }))
    .await;

    progress.finish_and_clear();

    let summary = SectionSummary::from_sections(&reports);
    info!(
        "Dashboard built: {} rendered, {} empty, {} failed",
        summary.rendered, summary.empty, summary.failed
    );

    Dashboard {
        metadata: DashboardMetadata {
            title: title.to_string(),
            generated_at: Utc::now(),
            sources: sources.clone(),
            duration_seconds: start.elapsed().as_secs_f64(),
        },
        sections: reports,
        summary,
    }
}

/// Sources the built-in dashboard reads.
pub fn default_sources() -> BTreeMap<String, String> {
    [
        ("orders", "data/orders.csv"),
        ("valid", "data/insights.json#correct_data"),
        ("invalid", "data/insights.json#incorrect_data"),
    ]
    .into_iter()
    .map(|(name, id)| (name.to_string(), id.to_string()))
    .collect()
}

fn top_by_sum(title: &str, source: &str, key: &str, value: &str, kind: ChartKind) -> SectionSpec {
    SectionSpec::new(title, source, ChartSpec::new(kind).x(key).y(value))
        .step(Step::GroupSum {
            keys: vec![key.to_string()],
            value: value.to_string(),
        })
        .step(Step::TopN {
            n: 5,
            by: value.to_string(),
            descending: true,
        })
}

/// The built-in dashboard.
pub fn default_sections() -> Vec<SectionSpec> {
    vec![
        top_by_sum(
            "Top 5 Customers by Quantity Ordered",
            "orders",
            "customer_id",
            "quantity",
            ChartKind::Bar,
        ),
        top_by_sum(
            "Top 5 Products by Quantity Ordered",
            "orders",
            "product_id",
            "quantity",
            ChartKind::Line,
        ),
        SectionSpec::new(
            "Top 5 Customers by Spend",
            "valid",
            ChartSpec::new(ChartKind::Bar).x("customer_id").y("spend"),
        )
        .step(Step::DeriveProduct {
            left: "quantity".to_string(),
            right: "price".to_string(),
            output: "spend".to_string(),
        })
        .step(Step::GroupSum {
            keys: vec!["customer_id".to_string()],
            value: "spend".to_string(),
        })
        .step(Step::TopN {
            n: 5,
            by: "spend".to_string(),
            descending: true,
        }),
        SectionSpec::new(
            "Sales by Category",
            "valid",
            ChartSpec::new(ChartKind::Pie).x("category").y("price"),
        )
        .step(Step::GroupSum {
            keys: vec!["category".to_string()],
            value: "price".to_string(),
        }),
        SectionSpec::new(
            "Returns Over Time",
            "valid",
            ChartSpec::new(ChartKind::Line).x("date").y("refund_amount"),
        )
        .step(Step::CoerceDates {
            column: "date".to_string(),
        })
        .step(Step::DropNulls {
            columns: vec!["date".to_string()],
        })
        .step(Step::GroupSum {
            keys: vec!["date".to_string()],
            value: "refund_amount".to_string(),
        }),
        SectionSpec::new(
            "Shipping Status by Carrier",
            "valid",
            ChartSpec::new(ChartKind::Bar)
                .x("carrier")
                .y("count")
                .color("status"),
        )
        .step(Step::PairCount {
            a: "carrier".to_string(),
            b: "status".to_string(),
        }),
        SectionSpec::new("Data Quality Issues", "invalid", ChartSpec::new(ChartKind::Metric))
            .step(Step::QualityMetrics),
        SectionSpec::new(
            "Missing Fields Distribution",
            "invalid",
            ChartSpec::new(ChartKind::Bar).x("column").y("missing"),
        )
        .step(Step::MissingSummary)
        .step(Step::ThresholdFilter {
            column: "missing".to_string(),
            min: 0.0,
        })
        .step(Step::SortBy {
            by: "missing".to_string(),
            descending: true,
        }),
        SectionSpec::new(
            "Validity by Category",
            "orders",
            ChartSpec::new(ChartKind::Bar)
                .x("category")
                .y("count")
                .color(analysis::VALIDITY_COLUMN),
        )
        .step(Step::ClassifyValidity {
            reason: "validation_reason".to_string(),
        })
        .step(Step::PairCount {
            a: "category".to_string(),
            b: analysis::VALIDITY_COLUMN.to_string(),
        }),
        SectionSpec::new(
            "Valid vs Invalid Records",
            "orders",
            ChartSpec::new(ChartKind::Pie)
                .x(analysis::VALIDITY_COLUMN)
                .y(analysis::PROPORTION_COLUMN),
        )
        .step(Step::ClassifyValidity {
            reason: "validation_reason".to_string(),
        })
        .step(Step::Frequency {
            column: analysis::VALIDITY_COLUMN.to_string(),
            normalize: true,
        })
        .step(Step::ThresholdFilter {
            column: analysis::PROPORTION_COLUMN.to_string(),
            min: 0.01,
        }),
        SectionSpec::new("Raw Data: Valid Records", "valid", ChartSpec::new(ChartKind::Table)),
        SectionSpec::new(
            "Raw Data: Invalid Records",
            "invalid",
            ChartSpec::new(ChartKind::Table),
        ),
    ]
}
