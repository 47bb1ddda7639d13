// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command-line surface of `k600-sim`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing::info;
use tracing_subscriber::EnvFilter;

use k600_config_fs::FsConfigStore;
use k600_core::{ConfigService, DetectorConfig, GaussianSource, MeanSource, Prng};

use crate::jsonl::JsonlSink;
use crate::replay::{read_steps, replay, ReplayReport};

/// Config-store key holding the detector configuration.
pub const CONFIG_KEY: &str = "detector";

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "k600-sim")]
#[command(about = "K600 detector response: replay transport steps into per-table rows")]
pub struct Cli {
    /// Config store directory (defaults to the platform config dir).
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,
    /// Subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines step stream and write one JSON-lines file per table
    Replay {
        /// Path to the step stream (one StepRecord per line)
        steps: PathBuf,
        /// Output directory for table files and calibration artifacts
        #[arg(long, default_value = "k600-out")]
        out_dir: PathBuf,
        /// Read the detector config from this JSON file instead of the store
        #[arg(long)]
        config: Option<PathBuf>,
        /// PRNG seed for resolution smearing
        #[arg(long, default_value_t = 0x600)]
        seed: u64,
        /// Report unsmeared energies (every Gaussian draw returns its mean)
        #[arg(long)]
        no_smear: bool,
        /// Print the summary as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the effective detector config, optionally persisting it
    Config {
        /// Write the config to the store (defaults when none is stored yet)
        #[arg(long)]
        save: bool,
    },
}

/// Installs the log subscriber, parses arguments and runs the command.
pub fn entrypoint() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();
    run(Cli::parse())
}

/// Runs a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Replay {
            steps,
            out_dir,
            config,
            seed,
            no_smear,
            json,
        } => {
            let mut detector = match config {
                Some(path) => read_config_file(&path)?,
                None => store(cli.config_dir.as_deref())?
                    .load_detector(CONFIG_KEY)
                    .context("failed to load detector config from store")?,
            };
            rebase_artifacts(&mut detector, &out_dir);

            let file = File::open(&steps)
                .with_context(|| format!("failed to open step stream {}", steps.display()))?;
            let records = read_steps(BufReader::new(file))?;

            let mut sink = JsonlSink::create(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            let mut prng = Prng::from_seed_u64(seed);
            let mut mean = MeanSource;
            let rng: &mut dyn GaussianSource = if no_smear { &mut mean } else { &mut prng };
            let report = replay(&detector, records, rng, &mut sink)?;
            sink.flush().context("failed to flush table files")?;
            info!(out_dir = %out_dir.display(), events = report.events, "replay finished");
            print_report(&report, json)
        }
        Commands::Config { save } => {
            let service = store(cli.config_dir.as_deref())?;
            let detector = service
                .load_detector(CONFIG_KEY)
                .context("failed to load detector config from store")?;
            if save {
                service
                    .save(CONFIG_KEY, &detector)
                    .context("failed to save detector config")?;
                info!(
                    path = %service.into_inner().path_for(CONFIG_KEY).display(),
                    "saved detector config"
                );
            }
            print_json(&detector)
        }
    }
}

fn store(dir: Option<&Path>) -> Result<ConfigService<FsConfigStore>> {
    let store = match dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    }
    .context("failed to open config store")?;
    Ok(ConfigService::new(store))
}

fn read_config_file(path: &Path) -> Result<DetectorConfig> {
    let file = File::open(path)
        .with_context(|| format!("failed to open config {}", path.display()))?;
    let config: DetectorConfig = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config.validate().context("invalid detector configuration")?;
    Ok(config)
}

/// Relative calibration artifact paths are placed under the output directory.
fn rebase_artifacts(config: &mut DetectorConfig, out_dir: &Path) {
    let cal = &mut config.calibration;
    for path in [
        &mut cal.table_path,
        &mut cal.lookup_path,
        &mut cal.angular_log_path,
    ] {
        if path.is_relative() {
            *path = out_dir.join(&*path);
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_report(report: &ReplayReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["table", "rows"]);
    for (name, rows) in &report.rows {
        table.add_row(vec![(*name).to_owned(), rows.to_string()]);
    }
    println!("{table}");
    println!(
        "events: {}  accepted steps: {}  filtered steps: {}  dropped vdc hits: {}",
        report.events, report.accepted, report.filtered, report.dropped_hits
    );
    if report.calibration_finalized {
        println!("geometry calibration artifacts written");
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode JSON")?;
    println!("{text}");
    Ok(())
}
