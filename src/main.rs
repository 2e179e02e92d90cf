mod artifact;
mod authority;
mod cip;
mod config;
mod db;
mod error;
mod fetch;
mod model;
mod parser;
mod project;
mod reconcile;
mod stages;
mod validate;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::fetch::Fetcher;
use crate::parser::SectionLabels;

#[derive(Parser)]
#[command(name = "cip_stem", about = "CIP code STEM overlay: NCES definitions + DHS eligibility")]
struct Cli {
    /// Config file (default: ./cip_stem.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the NCES CIP 2020 browse page
    FetchNcesIndex,
    /// Extract cipdetail URLs from the browse page and queue them
    ExtractNcesUrls,
    /// Fetch and parse every NCES detail page into the NCES dataset
    BuildNces,
    /// Download the DHS STEM designated degree program list PDF
    FetchDhs {
        /// Ignore the cached PDF and download it again
        #[arg(long)]
        refresh: bool,
    },
    /// Extract CIP rows from the DHS PDF
    ParseDhs,
    /// Check the NCES dataset
    ValidateNces,
    /// Check the DHS dataset
    ValidateDhs,
    /// Check the overlay
    ValidateOverlay,
    /// Merge NCES and DHS into the overlay
    Overlay,
    /// Recover STEM codes missing from the NCES snapshot via NCES search
    Backfill,
    /// Build the frontend index from the overlay
    Index,
    /// Copy the frontend index into the site data directory
    Publish,
    /// overlay -> validate-overlay -> index -> publish
    Run,
    /// Show raw-document cache statistics
    Stats,
    /// Manage the raw-document cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Drop cached documents
    Clear {
        /// Only ids starting with this prefix (e.g. "nces:detail", "dhs:pdf")
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = config::load(cli.config.as_deref())?;
    let labels = SectionLabels::default();

    let result = match cli.command {
        Commands::FetchNcesIndex => {
            let conn = db::connect(&settings.paths.cache_db)?;
            let fetcher = Fetcher::new(&settings.fetch)?;
            stages::nces::fetch_index(&settings, &conn, &fetcher).await
        }
        Commands::ExtractNcesUrls => {
            let conn = db::connect(&settings.paths.cache_db)?;
            stages::nces::extract_urls(&settings, &conn).map(|_| ())
        }
        Commands::BuildNces => {
            let conn = db::connect(&settings.paths.cache_db)?;
            let fetcher = Fetcher::new(&settings.fetch)?;
            stages::nces::build_dataset(&settings, &conn, &fetcher, &labels)
                .await
                .map(|_| ())
        }
        Commands::FetchDhs { refresh } => {
            let conn = db::connect(&settings.paths.cache_db)?;
            let fetcher = Fetcher::new(&settings.fetch)?;
            stages::dhs::fetch_pdf(&settings, &conn, &fetcher, refresh)
                .await
                .map(|_| ())
        }
        Commands::ParseDhs => stages::dhs::parse(&settings).map(|_| ()),
        Commands::ValidateNces => stages::check::validate_nces(&settings).map(|_| ()),
        Commands::ValidateDhs => stages::check::validate_dhs(&settings).map(|_| ()),
        Commands::ValidateOverlay => stages::check::validate_overlay(&settings).map(|_| ()),
        Commands::Overlay => stages::overlay::build_overlay(&settings).map(|_| ()),
        Commands::Backfill => {
            let conn = db::connect(&settings.paths.cache_db)?;
            let fetcher = Fetcher::new(&settings.fetch)?;
            stages::backfill::backfill(&settings, &conn, &fetcher, &labels)
                .await
                .map(|_| ())
        }
        Commands::Index => stages::publish::build_frontend_index(&settings).map(|_| ()),
        Commands::Publish => stages::publish::publish(&settings).map(|_| ()),
        Commands::Run => stages::run_offline(&settings),
        Commands::Stats => {
            let conn = db::connect(&settings.paths.cache_db)?;
            let s = db::get_stats(&conn)?;
            println!("Documents:   {}", s.documents);
            println!("Bytes:       {}", s.bytes);
            println!("Detail URLs: {}", s.detail_urls);
            println!("Visited:     {}", s.visited);
            println!("Unvisited:   {}", s.unvisited);
            for (kind, n) in &s.by_kind {
                println!("  {:<14} {}", kind, n);
            }
            Ok(())
        }
        Commands::Cache {
            action: CacheAction::Clear { prefix },
        } => {
            let conn = db::connect(&settings.paths.cache_db)?;
            let removed = db::clear_documents(&conn, prefix.as_deref())?;
            match prefix {
                Some(p) => println!("Removed {} cached documents matching '{}'", removed, p),
                None => println!("Removed {} cached documents", removed),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
