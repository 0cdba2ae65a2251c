#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the shelf crawl pipeline.
//!
//! Each pipeline stage is a subcommand. Stage subcommands read the previous
//! stage's output from a JSON file and print their own output as JSON on
//! stdout, so an external orchestrator can fan workers out across machines.
//! `run` chains every stage locally.

mod backends;

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shelf_crawl_catalog_models::{Partition, RetryPartition, SectionPages};
use shelf_crawl_pipeline::partition::PartitionRequest;
use shelf_crawl_pipeline::scrape_missed::RetryOutput;
use shelf_crawl_pipeline::{
    FetcherSource, PipelineConfig, append, combine, combine_missed, partition, postprocess,
    runner, scrape, scrape_missed, update_master,
};
use shelf_crawl_storage::BlobRef;

#[derive(Parser)]
#[command(name = "shelf_crawl", about = "Grocery catalog crawl pipeline")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides `pages_per_partition` from the configuration
    #[arg(long, global = true)]
    pages_per_partition: Option<u32>,
    /// Only crawl the first N sections (for testing)
    #[arg(long, global = true)]
    test_limit: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan partitions offline from a JSON list of `{section, pages}`
    Plan {
        /// JSON file with the ordered section page counts
        sections: PathBuf,
    },
    /// Discover sections, count their pages, and plan partitions
    Partition,
    /// Crawl one partition (JSON) and write its result blob
    Scrape {
        /// JSON file holding one partition
        input: PathBuf,
    },
    /// Merge worker result blobs (JSON list of blob references)
    Combine {
        /// JSON file holding the worker blob references
        input: PathBuf,
    },
    /// Reconcile the combined blob against the master table
    UpdateMaster {
        /// JSON file holding the combined blob reference, or `null`
        input: PathBuf,
    },
    /// Re-fetch one retry partition (JSON) product by product
    ScrapeMissed {
        /// JSON file holding one retry partition
        input: PathBuf,
    },
    /// Merge retry outputs and prune dead products from the master table
    CombineMissed {
        /// JSON file holding the retry worker outputs
        input: PathBuf,
    },
    /// Merge all combined blobs and write the processed CSV
    Postprocess {
        /// JSON file holding the combined blob references (entries may be `null`)
        input: PathBuf,
    },
    /// Append the processed CSV to the historical table
    Append {
        /// JSON file holding the processed blob reference
        input: PathBuf,
    },
    /// Run every stage locally
    Run,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(pages) = cli.pages_per_partition {
        config.pages_per_partition = pages;
    }
    if cli.test_limit.is_some() {
        config.test_limit = cli.test_limit;
    }
    config.validate()?;

    // Offline planning needs no storage backend.
    if let Commands::Plan { sections } = &cli.command {
        return plan(sections, &config);
    }

    run_stage(cli.command, &config).await
}

fn plan(sections: &Path, config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let sections: Vec<SectionPages> = read_input(sections)?;
    let partitions = shelf_crawl_planner::plan(&sections, config.pages_per_partition)?;
    print_output(&partitions)
}

#[allow(clippy::too_many_lines)]
async fn run_stage(
    command: Commands,
    config: &PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let now = Utc::now();
    let store = backends::blob_store(&config.storage)?;
    let store = store.as_ref();

    match command {
        Commands::Plan { sections } => plan(&sections, config)?,
        Commands::Partition => {
            let fetchers = backends::fetchers(store, config).await?;
            let output =
                partition::run(&fetchers, config, &PartitionRequest::default(), now.date_naive())
                    .await?;
            print_output(&output)?;
        }
        Commands::Scrape { input } => {
            let partition: Partition = read_input(&input)?;
            let fetchers = backends::fetchers(store, config).await?;
            let fetcher = fetchers.worker_fetcher()?;
            let blob =
                scrape::run(fetcher.as_ref(), store, &partition, &config.pacer(), now).await?;
            print_output(&blob)?;
        }
        Commands::Combine { input } => {
            let blobs: Vec<BlobRef> = read_input(&input)?;
            print_output(&combine::run(store, &blobs, now).await?)?;
        }
        Commands::UpdateMaster { input } => {
            let combined: Option<BlobRef> = read_input(&input)?;
            print_output(&update_master::run(store, combined.as_ref(), config).await?)?;
        }
        Commands::ScrapeMissed { input } => {
            let partition: RetryPartition = read_input(&input)?;
            let fetchers = backends::fetchers(store, config).await?;
            let fetcher = fetchers.worker_fetcher()?;
            let output =
                scrape_missed::run(fetcher.as_ref(), store, &partition, &config.pacer(), now)
                    .await?;
            print_output(&output)?;
        }
        Commands::CombineMissed { input } => {
            let outputs: Vec<RetryOutput> = read_input(&input)?;
            print_output(&combine_missed::run(store, &outputs, now).await?)?;
        }
        Commands::Postprocess { input } => {
            let inputs: Vec<Option<BlobRef>> = read_input(&input)?;
            print_output(&postprocess::run(store, &inputs, now).await?)?;
        }
        Commands::Append { input } => {
            let processed: BlobRef = read_input(&input)?;
            let mut table = backends::history_table(config);
            let stats = append::run(store, &processed, &mut table, now.date_naive()).await?;
            log::info!("Historical table: {stats}");
            print_output(&serde_json::json!({
                "appended": stats.appended,
                "total": stats.total,
            }))?;
        }
        Commands::Run => {
            let fetchers = backends::fetchers(store, config).await?;
            let mut table = backends::history_table(config);
            let summary = runner::run(
                store,
                &fetchers,
                config,
                &PartitionRequest::default(),
                &mut table,
                now,
            )
            .await?;
            print_output(&summary)?;
        }
    }

    Ok(())
}

fn read_input<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    log::debug!("Reading stage input from {}", path.display());
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn print_output<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
