// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procsit`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procsit",
    version,
    about = "Keep configured processes running; restart them when they exit.",
    long_about = None
)]
pub struct CliArgs {
    /// HTTP localhost admin port.
    #[arg(long, value_name = "PORT", default_value_t = 4762)]
    pub http_port: u16,

    /// Directory containing per-task *.json config files.
    #[arg(long, value_name = "DIR", default_value = "config")]
    pub config_dir: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCSIT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
