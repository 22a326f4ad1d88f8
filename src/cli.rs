use std::path::PathBuf;

use clap::{Parser, Subcommand};

use stock_sync::code::SecurityCode;
use stock_sync::datasets::DatasetKind;
use stock_sync::fetch::PoolKind;

#[derive(Parser, Debug)]
#[command(name = "stock-sync")]
#[command(about = "Incrementally mirror Chinese A-share market data into local CSV tables")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON config file; built-in defaults are used when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root of the local data tree (overrides `data_dir` from the config)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calendar, reference tables, market data, index pool and every tracked security
    Update {
        /// Constituent pool to track (repeatable); defaults to the configured pools
        #[arg(long = "pool", value_parser = parse_pool)]
        pools: Vec<PoolKind>,

        /// Log failed datasets and continue with the rest
        #[arg(long)]
        keep_going: bool,
    },

    /// Refresh the trading calendar and print the latest trading day
    Calendar,

    /// Update per-security datasets for one code (600000.SH or sh.600000)
    Stock {
        #[arg(value_parser = parse_code)]
        code: SecurityCode,

        /// Dataset to update (repeatable); defaults to all per-security datasets
        #[arg(long = "dataset", value_parser = parse_dataset)]
        datasets: Vec<DatasetKind>,

        #[arg(long)]
        keep_going: bool,
    },

    /// Update market-wide datasets
    Market {
        #[arg(long = "dataset", value_parser = parse_dataset)]
        datasets: Vec<DatasetKind>,

        #[arg(long)]
        keep_going: bool,
    },
}

fn parse_pool(raw: &str) -> Result<PoolKind, String> {
    PoolKind::parse(raw).ok_or_else(|| format!("unknown pool `{raw}` (expected hs300 or zz500)"))
}

fn parse_code(raw: &str) -> Result<SecurityCode, String> {
    SecurityCode::parse(raw).map_err(|err| err.to_string())
}

fn parse_dataset(raw: &str) -> Result<DatasetKind, String> {
    DatasetKind::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = DatasetKind::ALL.iter().map(|kind| kind.name()).collect();
        format!("unknown dataset `{raw}` (one of: {})", known.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_update_with_pools() {
        let cli = Cli::try_parse_from([
            "stock-sync",
            "--data-dir",
            "/srv/stock_data",
            "update",
            "--pool",
            "zz500",
            "--keep-going",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/srv/stock_data")));
        match cli.command {
            Commands::Update { pools, keep_going } => {
                assert_eq!(pools, vec![PoolKind::Zz500]);
                assert!(keep_going);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn stock_accepts_session_form_codes() {
        let cli = Cli::try_parse_from([
            "stock-sync",
            "stock",
            "sh.600000",
            "--dataset",
            "day",
            "--dataset",
            "adj_factor",
        ])
        .unwrap();

        match cli.command {
            Commands::Stock { code, datasets, .. } => {
                assert_eq!(code.canonical(), "600000.SH");
                assert_eq!(datasets, vec![DatasetKind::Daily, DatasetKind::AdjFactor]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(Cli::try_parse_from(["stock-sync", "update", "--pool", "sz50"]).is_err());
        assert!(Cli::try_parse_from(["stock-sync", "market", "--dataset", "weekly"]).is_err());
        assert!(Cli::try_parse_from(["stock-sync", "stock", "600000"]).is_err());
    }
}
