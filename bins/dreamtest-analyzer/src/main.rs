mod analyzer;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use dreamtest_common::config::RESULTS_DIR;
use dreamtest_common::store::{self, StoredSuite};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "dreamtest-analyzer")]
#[command(about = "DreamCompiler test analyzer - trends and failures across saved runs", long_about = None)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Results directory (defaults to <root>/test_results)
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Result file pattern
    #[arg(long, default_value = store::DEFAULT_PATTERN)]
    pattern: String,

    /// Only analyze results from the last N days (N >= 1)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    days: Option<u32>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .init();

    let results_dir = cli
        .results_dir
        .clone()
        .unwrap_or_else(|| cli.root.join(RESULTS_DIR));

    let suites = load(&results_dir, &cli.pattern, cli.days)?;
    if suites.is_empty() {
        println!("{}", report::NO_RESULTS);
        return Ok(());
    }

    let analysis = analyzer::analyze(suites.iter().map(|stored| &stored.suite));
    let rendered = match cli.format {
        OutputFormat::Text => report::render_text(&analysis),
        OutputFormat::Json => report::render_json(&analysis)?,
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            println!("Report saved to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn load(results_dir: &Path, pattern: &str, days: Option<u32>) -> Result<Vec<StoredSuite>> {
    let suites = store::load_suites(results_dir, pattern)?;
    info!(dir = %results_dir.display(), count = suites.len(), "Loaded result files");

    let Some(days) = days else {
        return Ok(suites);
    };
    let loaded = suites.len();
    let kept = analyzer::within_days(suites, days, Utc::now());
    if kept.len() < loaded {
        warn!(days, dropped = loaded - kept.len(), "Ignoring older result files");
    }
    Ok(kept)
}
