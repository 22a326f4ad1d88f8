use crate::datasets::DatasetKind;
use crate::error::{Result, SyncError};

use super::{Config, TushareConfig};

/// Check a loaded config and surface every problem at once.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    if config.data_dir.is_none() {
        issues.push("data_dir must be set (config file or --data-dir)".to_string());
    }
    validate_tushare(&config.tushare, &mut issues);
    validate_datasets(config, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(SyncError::message(format!(
            "sync config invalid:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_tushare(tushare: &TushareConfig, issues: &mut Vec<String>) {
    if tushare.token.trim().is_empty() {
        issues.push(format!(
            "tushare.token is empty; set it in the config or via {}",
            super::TOKEN_ENV
        ));
    }
    if !tushare.endpoint.starts_with("http://") && !tushare.endpoint.starts_with("https://") {
        issues.push(format!(
            "tushare.endpoint `{}` must be an http(s) URL",
            tushare.endpoint
        ));
    }
    if tushare.timeout_secs == 0 {
        issues.push("tushare.timeout_secs must be greater than zero".to_string());
    }
    for (api, endpoint) in &tushare.endpoints {
        if endpoint.row_cap == Some(0) {
            issues.push(format!("tushare.endpoints.{api}.row_cap must be greater than zero"));
        }
    }
}

fn validate_datasets(config: &Config, issues: &mut Vec<String>) {
    for (name, dataset) in &config.datasets {
        if DatasetKind::parse(name).is_none() {
            issues.push(format!("datasets.{name} is not a known dataset"));
            continue;
        }
        if let Some(step) = dataset.step_days {
            if step <= 0 {
                issues.push(format!(
                    "datasets.{name}.step_days must be positive (got {step})"
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetOverride;

    fn valid() -> Config {
        let mut config = Config::builtin().with_data_dir("/srv/stock_data");
        config.tushare.token = "secret".to_string();
        config
    }

    #[test]
    fn accepts_complete_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn aggregates_all_issues() {
        let mut config = valid();
        config.data_dir = None;
        config.tushare.token.clear();
        config.tushare.timeout_secs = 0;
        config.datasets.insert(
            "day".to_string(),
            DatasetOverride {
                step_days: Some(0),
            },
        );
        config
            .datasets
            .insert("weekly".to_string(), DatasetOverride::default());

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.starts_with("sync config invalid:"));
        for needle in [
            "data_dir",
            "tushare.token",
            "timeout_secs",
            "datasets.day.step_days",
            "datasets.weekly",
        ] {
            assert!(message.contains(needle), "missing `{needle}` in {message}");
        }
    }
}
