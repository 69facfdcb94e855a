//! # Token List Builder
//!
//! Populates the crosschain map from the enabled bridge feeds, then builds the Socket
//! route lists between every pair of production chains and writes them to the lists
//! folder.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --bin build_token_lists -- --bidirectional --debug
//! ```
//!
//! With `--debug` the map, its index, the diagnostic log, stats and every route list
//! are also written to the debug folder.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crosschain_token_map::{
    derived_list::{build_route_lists, NativeWrapperTable, RouteListBuilder, RouteOptions},
    export::{ExportWriter, Folder, MapExport},
    http::HttpFetcher,
    settings::Settings,
    sources::{default_sources, SocketClient},
    CrosschainMap,
};
use log::{info, warn};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "build_token_lists")]
#[command(about = "Builds bridge route token lists from crosschain token mappings")]
struct Args {
    /// Config file (without extension); defaults to ./Config.toml when present
    #[arg(short, long)]
    config: Option<String>,

    /// Also export the map, diagnostics and per-route lists to the debug folder
    #[arg(long)]
    debug: bool,

    /// One list per chain pair instead of one per direction
    #[arg(long)]
    bidirectional: bool,

    /// Ask Socket for its short token lists
    #[arg(long)]
    short_list: bool,

    /// Skip wrapped native token injection
    #[arg(long)]
    no_native_wrappers: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    env_logger::init();

    let args = Args::parse();
    let started = Instant::now();

    // 1. Load settings
    let settings = match &args.config {
        Some(path) => Settings::from_file(path),
        None => Settings::new(),
    }
    .context("Failed to load settings")?;
    info!("Settings loaded ({} supported chains)", settings.chains.supported.len());

    let writer = ExportWriter::new(&settings.output);
    writer.clear_folders().await?;

    // 2. Populate the map
    let mut map = CrosschainMap::new(settings.supported_chains());
    let sources = default_sources(&settings)?;
    let report = map.populate_with(&sources).await?;
    info!(
        "Map populated: {} identities, {} claims ({} conflicts, {} rejected)",
        map.store().len(),
        report.total(),
        report.conflicts,
        report.rejected
    );

    if args.debug {
        map.store()
            .check_consistency()
            .map_err(|e| anyhow!("Identity store is inconsistent: {}", e))?;
        writer.export_map(&map, &MapExport::ALL).await?;
    }

    // 3. Route lists
    let production = settings.production_chains();
    if production.len() < 2 {
        warn!("Fewer than two production chains are supported, no route lists to build");
        return Ok(());
    }

    let socket = SocketClient::new(HttpFetcher::new(&settings.http)?, &settings.socket)?;
    let wrappers = NativeWrapperTable::from_settings(&settings.native_wrappers);
    let builder = RouteListBuilder::new(map.store(), &wrappers);
    let options = RouteOptions {
        bidirectional: args.bidirectional,
        inject_native_wrappers: !args.no_native_wrappers,
    };

    let lists = build_route_lists(&socket, &builder, &production, args.short_list, options).await?;

    if args.debug {
        for (key, tokens) in &lists {
            writer.write_json(key, tokens, Folder::Debug).await?;
        }
    }

    let path = writer.write_json("SocketList", &lists, Folder::Lists).await?;
    info!(
        "Wrote {} route lists to {} in {:?}",
        lists.len(),
        path.display(),
        started.elapsed()
    );

    Ok(())
}
