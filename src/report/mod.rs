//! Dashboard reports.
//!
//! `pipeline` evaluates configured sections against their sources and
//! `generator` renders the resulting dashboard.

pub mod generator;
pub mod pipeline;

pub use generator::{write_json_report, write_report};
pub use pipeline::{build_dashboard, default_sections, default_sources, SectionSpec};
