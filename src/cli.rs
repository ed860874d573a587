//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Salesboard - sales, order and product dashboards
///
/// Serves ranking endpoints over an orders table and renders a sectioned
/// dashboard from CSV and JSON sources. Sources may be local files or URLs.
///
/// Examples:
///   salesboard serve --orders data/orders.csv
///   salesboard report --output dashboard.md
///   salesboard report --format json --source orders=https://example.com/orders.csv
///   salesboard init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .salesboard.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the JSON API
    Serve {
        /// Address to listen on
        #[arg(long, value_name = "ADDR", env = "SALESBOARD_BIND")]
        bind: Option<String>,

        /// Orders table (path or URL) behind the ranking endpoints
        #[arg(long, value_name = "SOURCE", env = "SALESBOARD_ORDERS")]
        orders: Option<String>,

        /// Entries returned per ranking
        #[arg(long, value_name = "COUNT")]
        top_n: Option<usize>,
    },

    /// Render the dashboard to a file
    Report {
        /// Output file path for the dashboard
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (markdown, json)
        #[arg(long, value_name = "FORMAT")]
        format: Option<OutputFormat>,

        /// Dashboard title
        #[arg(long)]
        title: Option<String>,

        /// Override or add a named source
        ///
        /// Example: --source orders=https://example.com/orders.csv
        #[arg(long = "source", value_name = "NAME=ID")]
        sources: Vec<String>,

        /// Exit with code 2 if any section failed
        #[arg(long)]
        fail_on_error: bool,
    },

    /// Generate a default .salesboard.toml configuration file
    InitConfig,
}

/// Output format for the dashboard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Serve { top_n, bind, .. } => {
                if *top_n == Some(0) {
                    return Err("--top-n must be at least 1".to_string());
                }
                if bind.as_deref().is_some_and(|b| b.trim().is_empty()) {
                    return Err("Bind address cannot be empty".to_string());
                }
            }
            Command::Report { sources, .. } => {
                for pair in sources {
                    match pair.split_once('=') {
                        Some((name, id)) if !name.trim().is_empty() && !id.trim().is_empty() => {}
                        _ => {
                            return Err(format!(
                                "Invalid --source '{}': expected NAME=ID",
                                pair
                            ))
                        }
                    }
                }
            }
            Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over everything; otherwise `--verbose` or a verbose
    /// config file turns on debug output.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            config: None,
            verbose: false,
            quiet: false,
            command,
        }
    }

    fn report(sources: &[&str]) -> Command {
        Command::Report {
            output: None,
            format: None,
            title: None,
            sources: sources.iter().map(|s| s.to_string()).collect(),
            fail_on_error: false,
        }
    }

    #[test]
    fn test_parse_report_command() {
        let args = Args::try_parse_from([
            "salesboard",
            "report",
            "--format",
            "json",
            "--source",
            "orders=o.csv",
            "--source",
            "valid=v.json#correct_data",
            "--fail-on-error",
            "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Command::Report {
                format,
                sources,
                fail_on_error,
                ..
            } => {
                assert_eq!(format, Some(OutputFormat::Json));
                assert_eq!(sources, vec!["orders=o.csv", "valid=v.json#correct_data"]);
                assert!(fail_on_error);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_init_config() {
        let args = Args::try_parse_from(["salesboard", "init-config"]).unwrap();
        assert!(matches!(args.command, Command::InitConfig));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::InitConfig);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_source_pairs() {
        assert!(make_args(report(&["orders=data/orders.csv"])).validate().is_ok());
        assert!(make_args(report(&["orders"])).validate().is_err());
        assert!(make_args(report(&["=x.csv"])).validate().is_err());
    }

    #[test]
    fn test_validation_top_n() {
        let args = make_args(Command::Serve {
            bind: None,
            orders: None,
            top_n: Some(0),
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::InitConfig);
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
