//! Canonicalization ETL
//!
//! Reads a CSV export, resolves every configured domain, and prints a
//! per-domain summary. With `--output` the dimension and bridge tables are
//! written as `;`-delimited batches for the bulk loader.
//!
//! Usage:
//!   cargo run --bin canon_etl -- --input notificacoes.csv --output out/
//!
//!   # custom vocabularies
//!   CANON_CONFIG_DIR=./config cargo run --bin canon_etl -- --input data.csv --json

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use clinical_canon::config::{CanonConfig, ConfigLoader};
use clinical_canon::dimension::write_domain_tables;
use clinical_canon::ingest::read_records;
use clinical_canon::pipeline::{DomainTables, Pipeline, DEFAULT_BATCH_SIZE};
use clinical_canon::Stage;

#[derive(Parser, Debug)]
#[command(name = "canon_etl")]
#[command(about = "Canonicalize clinical free text into dimension and bridge tables")]
struct Args {
    /// CSV file with one record per row
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Directory holding canon.yaml (bundled configuration when absent)
    #[arg(long, env = "CANON_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Write loader batches into this directory
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Records per resolution batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Worker threads (rayon default when absent)
    #[arg(long)]
    threads: Option<usize>,

    /// Print tables and stats as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker pool")?;
    }

    let config = match &args.config_dir {
        Some(dir) => ConfigLoader::new(dir).load()?,
        None => CanonConfig::builtin()?,
    };

    let records = read_records(&args.input)?;

    let tables = Pipeline::new(&config)
        .with_batch_size(args.batch_size)
        .run(&records)?;

    if let Some(dir) = &args.output {
        for domain in &tables {
            let written =
                write_domain_tables(dir, &domain.tables, &domain.dimension, &domain.bridge)?;
            for path in written {
                info!("Wrote {}", path.display());
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tables)?);
    } else {
        print_summary(records.len(), &tables);
    }

    Ok(())
}

fn print_summary(records: usize, tables: &[DomainTables]) {
    println!("records: {records}");
    for domain in tables {
        let stats = &domain.stats;
        println!();
        println!("[{}]", domain.domain);
        println!(
            "  records with terms: {}/{}",
            stats.records_with_terms, stats.records
        );
        println!(
            "  fragments: {} ({} resolved)",
            stats.fragments.total(),
            stats.fragments.resolved()
        );
        for stage in Stage::ALL {
            let n = stats.fragments.get(stage);
            if n > 0 {
                println!("    {:<14} {n}", stage.as_str());
            }
        }
        println!(
            "  {}: {} rows, {}: {} rows",
            domain.tables.dimension,
            domain.dimension.len(),
            domain.tables.bridge,
            domain.bridge.len()
        );
    }
}
