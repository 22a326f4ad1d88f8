use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Context, Result, SyncError};
use crate::fetch::PoolKind;

use super::{Config, DatasetOverride, TushareConfig, TOKEN_ENV};

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let raw = match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read config JSON at {}", path.display()))?;
            parse_raw(&json)
                .with_context(|| format!("failed to parse config JSON at {}", path.display()))?
        }
        None => RawConfig::default(),
    };
    raw.into_config()
}

fn parse_raw(json: &str) -> serde_json::Result<RawConfig> {
    serde_json::from_str(json)
}

/// Replace every `${NAME}` with the value of environment variable `NAME`.
pub fn expand_env_vars(value: &str) -> Result<String> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == '}' {
                    closed = true;
                    break;
                }
                name.push(next);
            }

            if name.is_empty() {
                return Err(SyncError::message(
                    "Encountered empty environment placeholder in config",
                ));
            }
            if !closed {
                return Err(SyncError::message(
                    "Unterminated environment placeholder in config",
                ));
            }

            let value = std::env::var(&name).with_context(|| {
                format!("Environment variable {name} required by config is not set")
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    data_dir: Option<String>,
    #[serde(default)]
    tushare: RawTushareConfig,
    #[serde(default)]
    pools: Option<Vec<String>>,
    #[serde(default)]
    datasets: BTreeMap<String, RawDatasetOverride>,
}

impl RawConfig {
    fn into_config(self) -> Result<Config> {
        let mut config = Config::builtin();

        if let Some(dir) = self.data_dir {
            config.data_dir = Some(PathBuf::from(expand_env_vars(&dir)?));
        }
        config.tushare = self.tushare.into_tushare_config()?;

        if let Some(pools) = self.pools {
            config.pools = pools
                .iter()
                .map(|name| {
                    PoolKind::parse(name).ok_or_else(|| {
                        SyncError::message(format!(
                            "unknown pool `{name}` (expected hs300 or zz500)"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
        }

        config.datasets = self
            .datasets
            .into_iter()
            .map(|(name, raw)| (name, DatasetOverride { step_days: raw.step_days }))
            .collect();

        Ok(config)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawTushareConfig {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    calls_per_minute: Option<NonZeroU32>,
    #[serde(default)]
    endpoints: BTreeMap<String, RawEndpointConfig>,
}

impl RawTushareConfig {
    fn into_tushare_config(self) -> Result<TushareConfig> {
        let mut cfg = TushareConfig::default();

        if let Some(endpoint) = self.endpoint {
            cfg.endpoint = endpoint;
        }
        cfg.token = match self.token {
            Some(template) => expand_env_vars(&template)?,
            None => std::env::var(TOKEN_ENV).unwrap_or_default(),
        };
        if let Some(timeout) = self.timeout_secs {
            cfg.timeout_secs = timeout;
        }
        if let Some(calls) = self.calls_per_minute {
            cfg.calls_per_minute = calls;
        }

        for (api, raw) in self.endpoints {
            let entry = cfg.endpoints.entry(api).or_default();
            if raw.calls_per_minute.is_some() {
                entry.calls_per_minute = raw.calls_per_minute;
            }
            if raw.row_cap.is_some() {
                entry.row_cap = raw.row_cap;
            }
        }

        Ok(cfg)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEndpointConfig {
    #[serde(default)]
    calls_per_minute: Option<NonZeroU32>,
    #[serde(default)]
    row_cap: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDatasetOverride {
    #[serde(default)]
    step_days: Option<i64>,
}
