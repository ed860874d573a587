//! Dashboard rendering.
//!
//! This module turns a computed dashboard into Markdown or JSON. Rendering
//! is a pure sink: it formats what the pipeline produced and never
//! recomputes anything. Empty and failed sections render as placeholders.

use crate::models::{ChartKind, ChartSpec, Dashboard, DashboardMetadata, SectionOutcome, SectionReport};
use crate::table::{Table, Value};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown dashboard.
pub fn generate_markdown_report(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", dashboard.metadata.title));
    output.push_str(&generate_metadata_section(dashboard));
    output.push_str(&generate_table_of_contents(&dashboard.sections));

    for section in &dashboard.sections {
        output.push_str(&generate_section(section));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(dashboard: &Dashboard) -> String {
    let DashboardMetadata {
        generated_at,
        sources,
        duration_seconds,
        ..
    } = &dashboard.metadata;
    let summary = &dashboard.summary;

    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    for (name, identifier) in sources {
        section.push_str(&format!("- **Source `{}`:** {}\n", name, identifier));
    }
    section.push_str(&format!(
        "- **Sections:** {} rendered, {} empty",
        summary.rendered, summary.empty
    ));
    if summary.failed > 0 {
        section.push_str(&format!(", {} failed", summary.failed));
    }
    section.push('\n');
    section.push_str(&format!("- **Duration:** {:.2}s\n\n", duration_seconds));

    section
}

fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
        .collect::<String>()
        .replace(' ', "-")
}

/// Generate the table of contents.
fn generate_table_of_contents(sections: &[SectionReport]) -> String {
    let mut toc = String::new();

    toc.push_str("## Contents\n\n");
    for section in sections {
        let marker = if section.is_failed() { " ⚠️" } else { "" };
        toc.push_str(&format!(
            "- [{}](#{}){}\n",
            section.title,
            anchor(&section.title),
            marker
        ));
    }
    toc.push('\n');

    toc
}

fn describe_chart(chart: &ChartSpec) -> String {
    let mut parts = vec![format!("{} {}", chart.kind.emoji(), chart.kind)];
    if let Some(ref x) = chart.x {
        parts.push(format!("x: `{}`", x));
    }
    if let Some(ref y) = chart.y {
        parts.push(format!("y: `{}`", y));
    }
    if let Some(ref color) = chart.color {
        parts.push(format!("color: `{}`", color));
    }
    parts.join(" | ")
}

/// Generate one dashboard section.
fn generate_section(section: &SectionReport) -> String {
    let mut block = String::new();

    block.push_str(&format!("## {} {{#{}}}\n\n", section.title, anchor(&section.title)));
    block.push_str(&format!(
        "*{} | source: `{}`*\n\n",
        describe_chart(&section.chart),
        section.source
    ));

    match &section.outcome {
        SectionOutcome::Rendered { table } if section.chart.kind == ChartKind::Metric => {
            block.push_str(&generate_metric_list(table));
        }
        SectionOutcome::Rendered { table } => block.push_str(&generate_markdown_table(table)),
        SectionOutcome::Empty => block.push_str("> ℹ️ No data to display.\n\n"),
        SectionOutcome::Failed { message } => {
            block.push_str(&format!("> ⚠️ **Section unavailable:** {}\n\n", message));
        }
    }

    block
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Float(x) if x.fract() != 0.0 => {
            let text = format!("{:.4}", x);
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        other => other.to_string().replace('|', "\\|"),
    }
}

/// Render a table as a Markdown table.
fn generate_markdown_table(table: &Table) -> String {
    let mut out = String::new();

    out.push_str(&format!("| {} |\n", table.columns().join(" | ")));
    out.push_str(&format!("|{}\n", ":---|".repeat(table.num_columns())));

    for row in table.rows() {
        let cells: Vec<String> = row.iter().map(format_cell).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out.push('\n');

    out
}

/// Render a two-column metric table as a bullet list.
fn generate_metric_list(table: &Table) -> String {
    let mut out = String::new();

    for row in table.rows() {
        match row.as_slice() {
            [label, value, ..] => {
                out.push_str(&format!("- **{}:** {}\n", label, format_cell(value)))
            }
            [label] => out.push_str(&format!("- **{}**\n", label)),
            [] => {}
        }
    }
    out.push('\n');

    out
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by salesboard*\n");

    footer
}

/// Write the Markdown dashboard to a file.
pub fn write_report(dashboard: &Dashboard, path: &Path) -> Result<()> {
    let content = generate_markdown_report(dashboard);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

/// Generate a JSON dashboard.
pub fn generate_json_report(dashboard: &Dashboard) -> Result<String> {
    serde_json::to_string_pretty(dashboard).map_err(Into::into)
}

/// Write a JSON dashboard to a file.
pub fn write_json_report(dashboard: &Dashboard, path: &Path) -> Result<()> {
    let content = generate_json_report(dashboard)?;

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
