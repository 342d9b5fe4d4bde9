mod aggregate;
mod catalog;
mod charts;
mod config;
mod console;
mod download;
mod error;
mod hmmer;
mod pipeline;
mod profiles;
mod script;
mod selector;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use console::Console;
use pipeline::Pipeline;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

const VERSION: &str = "0.3.1";
const SCRIPT_NAME: &str = "hmmscan-pipeline";

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Fetch proteomes and Pfam HMMs, write a SLURM hmmsearch job, summarise the hits", long_about = None)]
struct Args {
    /// YAML file overriding the built-in sources, SLURM header and output names
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for downloads, the job script and all results
    #[arg(short, long, default_value = ".")]
    workdir: PathBuf,

    /// Stop after this many invalid catalog selections (default: keep asking)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Save charts without opening them
    #[arg(long, default_value = "false")]
    no_display: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging()?;
    print_banner();

    let config = config::load_config(args.config.as_deref()).context("Failed to load YAML configuration")?;

    fs::create_dir_all(&args.workdir).context("Failed to create working directory")?;
    info!("📁 Working directory: {}", args.workdir.display());

    let pipeline = Pipeline::new(config, args.workdir, args.max_attempts, !args.no_display);
    let mut console = Console::stdio();
    if let Err(e) = pipeline.run(&mut console).await {
        error!("❌ {}", e);
        return Err(e.into());
    }

    info!("🎉 {} finished successfully!", SCRIPT_NAME);
    Ok(())
}

fn print_banner() {
    println!("\n{}", "=".repeat(60));
    println!("  🧬 {} - Pfam HMM search pipeline v{}", SCRIPT_NAME, VERSION);
    println!("{}\n", "=".repeat(60));
}

fn setup_logging() -> Result<()> {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let log_file = format!("{}_{}.log", SCRIPT_NAME, timestamp);

    let file = File::create(&log_file)?;

    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_timer(fmt::time::LocalTime::rfc_3339())
        .compact();

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_timer(fmt::time::LocalTime::rfc_3339())
        .compact();

    use tracing_subscriber::layer::SubscriberExt;
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .with(stdout_layer);

    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;
    info!("📝 Log file created: {}", log_file);
    Ok(())
}
