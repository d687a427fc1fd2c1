use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use grade_watch::alert::{StdoutSink, WebhookSink};
use grade_watch::config::{Config, ConfigOverrides};
use grade_watch::cycle::{CycleReport, Watcher};
use grade_watch::output::csv::{events_to_csv, snapshot_to_csv};
use grade_watch::output::json::render_json;
use grade_watch::output::table::{render_report, render_snapshot_table};
use grade_watch::snapshot::store::SnapshotStore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "grade-watch", about = "ScoDoc grade monitor behind CAS")]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    insecure: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a single poll cycle.
    Check,
    /// Poll on a fixed interval.
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
        /// 0 runs forever.
        #[arg(long, default_value_t = 0)]
        iterations: u32,
    },
    /// Only perform the CAS login.
    Login,
    /// Print the persisted grade state.
    State,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    if let Err(err) = dotenv {
        if !err.not_found() {
            warn!("failed loading .env: {err}");
        }
    }
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides::from_env());
    config.apply_overrides(ConfigOverrides {
        base_url: cli.url.clone(),
        state_path: cli.state.clone(),
        verify_tls: cli.insecure.then_some(false),
        ..ConfigOverrides::default()
    });
    if !config.portal.verify_tls {
        warn!("TLS certificate verification is disabled");
    }

    match &cli.command {
        Commands::Config { init, show } => {
            return handle_config_command(*init, *show, &config, &config_path);
        }
        Commands::State => {
            let store = SnapshotStore::new(config.resolved_state_path());
            let snapshot = store.load();
            match cli.output {
                OutputFormat::Table => println!("{}", render_snapshot_table(&snapshot)),
                OutputFormat::Json => println!("{}", render_json(&snapshot)?),
                OutputFormat::Csv => println!("{}", snapshot_to_csv(&snapshot)?),
            }
            return Ok(());
        }
        _ => {}
    }

    let watcher = build_watcher(&config)?;
    match &cli.command {
        Commands::Check => {
            let report = watcher.run_cycle().await?;
            print_report(&report, cli.output)?;
        }
        Commands::Watch {
            interval_secs,
            iterations,
        } => {
            let interval = interval_secs.unwrap_or(config.schedule.interval_secs);
            run_watch_loop(&watcher, interval, *iterations, cli.output).await?;
        }
        Commands::Login => {
            let outcome = watcher.login_only().await?;
            match cli.output {
                OutputFormat::Table | OutputFormat::Csv => println!("{outcome}"),
                OutputFormat::Json => println!("{}", render_json(&outcome)?),
            }
            if !outcome.is_usable() {
                return Err(anyhow!("login failed"));
            }
        }
        Commands::State | Commands::Config { .. } => unreachable!("handled before login"),
    }

    Ok(())
}

fn build_watcher(config: &Config) -> Result<Watcher> {
    let mut watcher = Watcher::new(
        config.session_settings(),
        config.credentials()?,
        config.portal.trigger_path.clone(),
        SnapshotStore::new(config.resolved_state_path()),
    )
    .with_rules(config.alerts.rules);
    if config.alerts.enable_stdout {
        watcher = watcher.with_sink(Box::new(StdoutSink));
    }
    if !config.alerts.discord_webhook.trim().is_empty() {
        let bulletin = Some(config.alerts.bulletin_url.clone());
        watcher = watcher.with_sink(Box::new(WebhookSink::new(
            config.alerts.discord_webhook.trim(),
            bulletin,
        )?));
    } else {
        info!("no webhook configured, notifications go to stdout only");
    }
    Ok(watcher)
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &PathBuf) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(&config.redacted())?);
    }
    Ok(())
}

async fn run_watch_loop(
    watcher: &Watcher,
    interval_secs: u64,
    iterations: u32,
    format: OutputFormat,
) -> Result<()> {
    let interval = Duration::from_secs(interval_secs.max(1));
    let mut i: u32 = 0;
    loop {
        i = i.saturating_add(1);
        info!("watch iteration {i}");
        match watcher.run_cycle().await {
            Ok(report) => print_report(&report, format)?,
            Err(err) => error!("cycle failed, retrying next interval: {err}"),
        }
        if iterations != 0 && i >= iterations {
            break;
        }
        info!("waiting {}s", interval.as_secs());
        tokio::time::sleep(interval).await;
    }
    Ok(())
}

fn print_report(report: &CycleReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_report(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => println!("{}", events_to_csv(&report.events)?),
    }
    Ok(())
}
