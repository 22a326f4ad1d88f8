mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use cli::{Cli, Commands};
use stock_sync::app::{StockData, SyncReport, Synchronizer};
use stock_sync::config::Config;
use stock_sync::datasets::{DatasetKind, Scope};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir);
    }
    let data = StockData::connect(config)?;

    let report = match cli.command {
        Commands::Update { pools, keep_going } => {
            let mut sync = Synchronizer::new(&data).keep_going(keep_going);
            if !pools.is_empty() {
                sync = sync.with_pools(pools);
            }
            sync.run()?
        }
        Commands::Calendar => {
            let added = Synchronizer::new(&data).refresh_calendar()?;
            let latest = data.trade_calendar()?.latest_trade_day()?;
            info!("calendar gained {} days", added);
            println!("latest trading day: {latest}");
            return Ok(());
        }
        Commands::Stock {
            code,
            datasets,
            keep_going,
        } => {
            let kinds = select(datasets, Scope::Security)?;
            Synchronizer::new(&data)
                .keep_going(keep_going)
                .run_security(&code, &kinds)?
        }
        Commands::Market {
            datasets,
            keep_going,
        } => {
            let kinds = select(datasets, Scope::Market)?;
            Synchronizer::new(&data)
                .keep_going(keep_going)
                .run_market(&kinds)?
        }
    };

    finish(report)
}

/// Requested datasets, or every dataset of `scope` when none were named.
fn select(requested: Vec<DatasetKind>, scope: Scope) -> Result<Vec<DatasetKind>> {
    if requested.is_empty() {
        return Ok(DatasetKind::ALL
            .into_iter()
            .filter(|kind| kind.scope() == scope)
            .collect());
    }
    if let Some(kind) = requested.iter().find(|kind| kind.scope() != scope) {
        bail!("dataset `{kind}` cannot be updated by this command");
    }
    Ok(requested)
}

fn finish(report: SyncReport) -> Result<()> {
    println!("{report}");
    if !report.is_success() {
        bail!("{} dataset(s) failed", report.failed.len());
    }
    Ok(())
}
