use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use nonzero_ext::nonzero;

use crate::datasets::DatasetKind;
use crate::error::Result;
use crate::fetch::PoolKind;

pub mod loader;
pub mod validator;

pub const DEFAULT_ENDPOINT: &str = "http://api.tushare.pro";
pub const TOKEN_ENV: &str = "TUSHARE_TOKEN";

/// Per-endpoint overrides for the bulk provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    pub calls_per_minute: Option<NonZeroU32>,
    /// Maximum rows a single call returns. A page this full is treated as truncated.
    pub row_cap: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TushareConfig {
    pub endpoint: String,
    pub token: String,
    pub timeout_secs: u64,
    pub calls_per_minute: NonZeroU32,
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl Default for TushareConfig {
    fn default() -> Self {
        let endpoints = BTreeMap::from([
            (
                "block_trade".to_string(),
                EndpointConfig {
                    calls_per_minute: None,
                    row_cap: Some(1000),
                },
            ),
            (
                "index_daily".to_string(),
                EndpointConfig {
                    calls_per_minute: None,
                    row_cap: Some(8000),
                },
            ),
            (
                "stk_mins".to_string(),
                EndpointConfig {
                    calls_per_minute: None,
                    row_cap: Some(8000),
                },
            ),
        ]);

        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: String::new(),
            timeout_secs: 30,
            calls_per_minute: nonzero!(200u32),
            endpoints,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetOverride {
    pub step_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub tushare: TushareConfig,
    /// Constituent pools whose members get per-security datasets.
    pub pools: Vec<PoolKind>,
    pub datasets: BTreeMap<String, DatasetOverride>,
}

impl Config {
    pub fn builtin() -> Self {
        Config {
            data_dir: None,
            tushare: TushareConfig::default(),
            pools: PoolKind::ALL.to_vec(),
            datasets: BTreeMap::new(),
        }
    }

    /// Read a JSON config file, or the built-in defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        loader::load_config(path)
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validator::validate_config(self)
    }

    pub fn step_days_for(&self, kind: DatasetKind) -> Option<i64> {
        self.datasets
            .get(kind.name())
            .and_then(|dataset| dataset.step_days)
    }
}
