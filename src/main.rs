//! Topo DSL CLI
//!
//! Usage:
//!   topo-dsl [OPTIONS] [PATHS]...
//!
//! Options:
//!   -c, --config <FILE>       TOML configuration (sources, extension)
//!   -x, --extension <EXT>     Source file extension scanned in directories
//!   -f, --format <FORMAT>     Output format: summary (default) or json
//!   -v, --verbose             Debug logging
//!   -h, --help                Print help

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use topo_dsl::{load_sources, TopologyConfig, TopologyError};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Summary,
    Json,
}

#[derive(Parser)]
#[command(name = "topo-dsl")]
#[command(about = "Interpret topology DSL files into a component graph")]
struct Cli {
    /// Source files or directories, appended to the configured sources
    paths: Vec<PathBuf>,

    /// Configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extension of source files inside directories
    #[arg(short = 'x', long)]
    extension: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    format: Format,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e.report());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), TopologyError> {
    let mut config = match &cli.config {
        Some(path) => TopologyConfig::from_file(path)?,
        None => TopologyConfig::default(),
    };
    config = config.with_sources(cli.paths);
    if let Some(extension) = cli.extension {
        config = config.with_extension(extension);
    }

    if config.sources.is_empty() {
        eprintln!("No sources given. Pass files or directories, or set `sources` in --config.");
        std::process::exit(2);
    }

    let graph = load_sources(&config)?;
    let snapshot = graph.snapshot();

    match cli.format {
        Format::Summary => println!("{}", snapshot.summary()),
        Format::Json => match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing snapshot: {}", e);
                std::process::exit(1);
            }
        },
    }
    Ok(())
}
