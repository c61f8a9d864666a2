mod annotations;
mod engine;
mod evaluator;
mod executor;
mod locator;
mod pipeline;
mod summary;


use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dreamtest_common::config::{Config, CONFIG_FILE};
use dreamtest_common::types::{host_platform, TestCategory};
use engine::ProcessRunner;
use executor::SuiteExecutor;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "dreamtest-runner")]
#[command(about = "DreamCompiler test runner - compile, run and check every test program", long_about = None)]
struct Cli {
    /// Project root (contains tests/ and the toolchain)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to <root>/codex/test_config.json, created if missing)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Test file pattern, relative to <root>/tests
    #[arg(long, default_value = locator::DEFAULT_PATTERN)]
    pattern: String,

    /// Only run these categories
    #[arg(long, num_args = 1..)]
    categories: Vec<TestCategory>,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// List discovered tests and exit
    #[arg(long)]
    list_tests: bool,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
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

    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("Project root {} not found", cli.root.display()))?;
    let config_path = cli.config.clone().unwrap_or_else(|| root.join(CONFIG_FILE));
    let config = Config::load_or_init(&config_path)?;

    if cli.show_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).context("Failed to serialize config")?
        );
        return Ok(());
    }

    if cli.list_categories {
        println!("Available test categories:");
        for category in TestCategory::ALL {
            println!("  {}", category);
        }
        return Ok(());
    }

    let executor = SuiteExecutor::new(ProcessRunner, &root, &config);

    if cli.list_tests {
        let candidates = executor.candidates(&cli.pattern, &cli.categories)?;
        let platform = host_platform();
        println!("Discovered tests ({}):", candidates.len());
        for (path, category) in &candidates {
            let known = if config.is_known_failure(&platform, path.display()) {
                " (known failure)"
            } else {
                ""
            };
            println!("  {} [{}]{}", path.tests_relative(), category, known);
        }
        return Ok(());
    }

    info!(root = %root.display(), pattern = %cli.pattern, "DreamCompiler test run starting");

    let outcome = tokio::select! {
        result = executor.run_suite(&cli.pattern, &cli.categories) => Some(result?),
        _ = signal::ctrl_c() => None,
    };
    let Some(suite) = outcome else {
        warn!("Interrupted; no results saved");
        std::process::exit(130);
    };

    executor.persist(&suite);

    match cli.format {
        OutputFormat::Text => println!("{}", summary::render_text(&suite)),
        OutputFormat::Json => println!("{}", summary::render_json(&suite)?),
    }

    if suite.failed() + suite.errors() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
