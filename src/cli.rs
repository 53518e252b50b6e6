//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Surveyd - survey service with per-question analytics
///
/// Create surveys, collect multiple-choice, scale and free-text responses,
/// and tabulate them per question.
///
/// Examples:
///   surveyd serve --port 3000 --data-file data/surveys.json
///   surveyd serve --memory --blob-root ./blobs
///   surveyd proxy --backend http://10.0.0.5:3000 --port 8080
///   surveyd report 1a2b3c4d5e --format json
///   surveyd init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .surveyd.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the survey HTTP server
    Serve(ServeArgs),

    /// Forward all requests to an internal backend
    Proxy(ProxyArgs),

    /// Render analytics for one survey from the data file
    Report(ReportArgs),

    /// Generate a default .surveyd.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, value_name = "ADDR")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SURVEYD_PORT")]
    pub port: Option<u16>,

    /// Survey data file
    #[arg(long, value_name = "FILE", env = "SURVEYD_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Directory of static assets to serve at /
    #[arg(long, value_name = "DIR")]
    pub static_dir: Option<PathBuf>,

    /// Blob store root; enables submission archiving and file uploads
    #[arg(long, value_name = "DIR")]
    pub blob_root: Option<PathBuf>,

    /// Keep surveys in memory only
    #[arg(long)]
    pub memory: bool,

    /// Classify free-text answers (needs an API token)
    #[arg(long)]
    pub classify: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ProxyArgs {
    /// Port the proxy listens on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Backend base URL
    #[arg(long, value_name = "URL", env = "SURVEYD_BACKEND_URL")]
    pub backend: Option<String>,

    /// Upstream timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReportArgs {
    /// Survey id
    pub survey_id: String,

    /// Survey data file
    #[arg(long, value_name = "FILE", env = "SURVEYD_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
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
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Serve(serve) => {
                if serve.port == Some(0) {
                    return Err("Port must be between 1 and 65535".to_string());
                }
                if serve.memory && serve.data_file.is_some() {
                    return Err("Cannot use both --memory and --data-file".to_string());
                }
            }
            Command::Proxy(proxy) => {
                if proxy.port == Some(0) {
                    return Err("Port must be between 1 and 65535".to_string());
                }
                if let Some(ref backend) = proxy.backend {
                    if !backend.starts_with("http://") && !backend.starts_with("https://") {
                        return Err("Backend URL must start with 'http://' or 'https://'".to_string());
                    }
                }
                if proxy.timeout == Some(0) {
                    return Err("Timeout must be at least 1 second".to_string());
                }
            }
            Command::Report(report) => {
                if report.survey_id.trim().is_empty() {
                    return Err("Survey id must not be empty".to_string());
                }
            }
            Command::InitConfig => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
