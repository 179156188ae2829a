//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use caddis_core::{Phase, ProgressReporter, RunReport, run_sync};
use caddis_sheets::{SheetsSettings, SheetsSink};
use caddis_shared::{SyncConfig, SyncError, TableSink, init_config, load_config};
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// caddis-sync — publish the Caddis catalog and price lists to Google Sheets.
#[derive(Parser)]
#[command(
    name = "caddis-sync",
    version,
    about = "Extract the Caddis article catalog and price lists and publish them as one Google Sheets table.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./caddis-sync.toml, then ~/.caddis-sync/caddis-sync.toml).
    #[arg(long, global = true, env = "CADDIS_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one sync: fetch catalog and prices, reconcile, publish.
    Run {
        /// Build and fingerprint the table without writing to Google Sheets.
        #[arg(long)]
        dry_run: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init,
    /// Show resolved configuration (secrets masked).
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "caddis=info",
        1 => "caddis=debug",
        _ => "caddis=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { dry_run } => cmd_run(config_path, dry_run, cli.log_format).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

async fn cmd_run(config_path: Option<&Path>, dry_run: bool, log_format: LogFormat) -> Result<()> {
    // Validate everything before the first request goes out.
    let app_config = load_config(config_path)?;
    let config = SyncConfig::from_app_config(&app_config)?;

    let sink = if dry_run {
        None
    } else {
        let token = config.sheets_access_token()?;
        Some(SheetsSink::new(&SheetsSettings::from_config(&config, token))?)
    };

    info!(
        source = %config.base_url,
        spreadsheet = %config.spreadsheet_id,
        sheet = %config.sheet_name,
        lists = config.price_lists.len(),
        dry_run,
        "starting caddis sync"
    );

    let reporter = CliProgress::new(log_format == LogFormat::Text);
    let report = run_sync(
        &config,
        sink.as_ref().map(|s| s as &dyn TableSink),
        &reporter,
    )
    .await?;

    println!();
    if report.published {
        println!("  Sheet updated: {}", config.sheet_name);
    } else {
        println!("  Dry run: table built, nothing published");
    }
    println!("  Run:         {}", report.run_id);
    println!("  Articles:    {}", report.articles);
    println!("  Prices:      {}", report.price_entries);
    println!("  Rows:        {}", report.rows);
    println!("  Fingerprint: {}", report.fingerprint);
    for (list, error) in &report.failed_lists {
        println!("  Incomplete:  list {list} ({}): {error}", list.label());
    }
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    /// A hidden spinner keeps JSON log output machine-readable.
    fn new(visible: bool) -> Self {
        if !visible {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }

        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, phase: Phase) {
        self.spinner.set_message(phase.label());
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }

    fn failed(&self, at: Phase, _error: &SyncError) {
        self.spinner
            .abandon_with_message(format!("{} failed", at.label()));
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = init_config(config_path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?.redacted();
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
