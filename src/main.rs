use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coinbook::config::{default_config_path, LoggingConfig, ResolvedConfig};
use coinbook::credentials::KeyFile;
use coinbook::duration::format_duration;
use coinbook::report::{render_json, render_text, Report, ReportOptions};
use coinbook::{aggregate, normalize, ProviderRegistry};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

#[derive(Parser)]
#[command(name = "coinbook")]
#[command(about = "Sum cryptocurrency balances across exchange accounts")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Key file to read credentials from (overrides `keys_file`)
    #[arg(short, long)]
    keys: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Leave out currencies with a zero total
    #[arg(long)]
    hide_zero: bool,

    /// Decimal places per total (overrides `display.decimals`)
    #[arg(long)]
    decimals: Option<u32>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show current configuration
    Config,
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(logging.filter.as_deref().unwrap_or("info"))
    });

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);
    layers.push(if logging.json {
        stderr.json().boxed()
    } else {
        stderr.boxed()
    });

    if let Some(path) = &logging.file {
        let file = open_log_file(path)?;
        let to_file = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
        layers.push(if logging.json {
            to_file.json().boxed()
        } else {
            to_file.boxed()
        });
    }

    tracing_subscriber::registry().with(layers).with(filter).init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}

fn show_config(config: &ResolvedConfig) {
    println!("Config file: {}", config.config_path.display());
    println!("Key file: {}", config.keys_file.display());
    println!("Session timeout: {}", format_duration(config.session.timeout));
    println!("HTTP timeout: {}", format_duration(config.http.timeout));
    println!("Decimals: {}", config.display.decimals);
    println!("Hide zero totals: {}", config.display.hide_zero);
    match &config.logging.file {
        Some(file) => println!("Log file: {}", file.display()),
        None => println!("Log file: (none)"),
    }
}

async fn run_balances(config: &ResolvedConfig, json: bool) -> Result<()> {
    info!("querying balances");

    let key_file = KeyFile::load(&config.keys_file)?;
    info!(
        path = %key_file.path().display(),
        entries = key_file.entries().len(),
        "loaded key entries"
    );

    let (credentials, invalid) = key_file.into_parts();
    for err in &invalid {
        warn!(error = %err, "skipping malformed key entry");
    }

    let registry = ProviderRegistry::new(config.provider_options());
    let built = registry.build_all(&credentials);
    info!(providers = built.providers.len(), "parsed valid key entries");
    if built.providers.is_empty() {
        bail!(
            "No usable provider entries in key file: {}",
            config.keys_file.display()
        );
    }

    let outcome = aggregate(&built.providers).await;
    let normalized = normalize(&outcome.balances);
    let report =
        Report::new(&outcome, normalized).with_skipped(invalid.iter().chain(&built.rejected));

    let options = ReportOptions {
        decimals: config.display.decimals,
        hide_zero: config.display.hide_zero,
    };
    if json {
        println!("{}", render_json(&report, options)?);
    } else {
        print!("{}", render_text(&report, options));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let mut config = ResolvedConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load coinbook config: {}", config_path.display()))?;

    if let Some(keys) = cli.keys {
        config.keys_file = keys;
    }
    if let Some(decimals) = cli.decimals {
        config.display.decimals = decimals;
    }
    if cli.hide_zero {
        config.display.hide_zero = true;
    }

    match cli.command {
        Some(Command::Config) => {
            show_config(&config);
            Ok(())
        }
        None => {
            init_logging(&config.logging)?;
            run_balances(&config, cli.json).await
        }
    }
}
