//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "order-intake",
    version,
    about = "Order Intake Studio - inspect order spreadsheet extraction",
    long_about = "Run schema inference over an order spreadsheet the same way the\n\
                  intake pipeline does, and report the field mappings, their\n\
                  evidence, and the document confidence."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,
}

#[derive(Subcommand)]
pub enum Command {
    /// Infer the schema of a spreadsheet and report the extraction.
    Extract(ExtractArgs),

    /// List the canonical field catalog.
    Fields,
}

#[derive(Parser)]
pub struct ExtractArgs {
    /// Path to the spreadsheet (CSV, TSV, XLSX, XLS, ODS).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Emit the full inference result as JSON instead of a table.
    #[arg(long = "json")]
    pub json: bool,

    /// Minimum blended confidence for a mapping to be reported.
    #[arg(long = "threshold", value_name = "SCORE")]
    pub threshold: Option<f64>,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
