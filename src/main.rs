//! Surveyd - survey service with per-question analytics
//!
//! Serves an HTTP API for creating surveys, collecting responses and
//! tabulating them, plus a pass-through proxy and an offline report command.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, config, bind failure, unknown survey, etc.)

mod analysis;
mod classifier;
mod cli;
mod config;
mod error;
mod models;
mod proxy;
mod report;
mod server;
mod service;
mod store;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat, ReportArgs};
use config::{Config, DEFAULT_CONFIG_FILE};
use report::SurveyReport;
use store::{JsonFileStore, SurveyStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // No logging needed
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Surveyd v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle `init-config`: generate a default .surveyd.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.command {
        Command::Serve(_) => server::serve(config).await,
        Command::Proxy(_) => proxy::serve(&config.proxy).await,
        Command::Report(ref report_args) => run_report(&config, report_args),
        Command::InitConfig => handle_init_config(),
    }
}

/// Render one survey's analytics straight from the data file.
fn run_report(config: &Config, args: &ReportArgs) -> Result<()> {
    let store = JsonFileStore::new(&config.storage.data_file);
    let db = store
        .load()
        .with_context(|| format!("Failed to load {}", store.path().display()))?;

    let survey = db
        .surveys
        .get(&args.survey_id)
        .cloned()
        .with_context(|| format!("Survey {} not found", args.survey_id))?;
    let report = SurveyReport::new(survey, db.responses_for(&args.survey_id));

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
