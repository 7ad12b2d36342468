//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! `RUST_LOG` overrides the verbosity flags when set; our crates log at
//! the selected level while external crates stay at warn.

use std::io::{self, IsTerminal};

use clap::ColorChoice;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::cli::{Cli, LogFormatArg};

/// Initialize the global subscriber from CLI flags.
pub fn init(cli: &Cli) -> io::Result<()> {
    let level = cli.verbosity.tracing_level_filter();
    let filter = build_env_filter(level);
    let with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stderr().is_terminal(),
    };

    match cli.log_format {
        LogFormatArg::Json => {
            let layer = fmt::layer().json().with_writer(io::stderr).with_target(false);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogFormatArg::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_ansi(with_ansi)
                .with_target(false)
                .without_time();
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogFormatArg::Pretty => {
            let layer = fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(with_ansi)
                .with_target(false)
                .without_time();
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }
    Ok(())
}

fn build_env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,ois_cli={level},ois_infer={level},ois_ingest={level},ois_model={level}",
            level = level.to_string().to_lowercase()
        ))
    })
}
