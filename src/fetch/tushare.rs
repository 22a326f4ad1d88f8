use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use governor::Quota;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::TushareConfig;
use crate::error::{Context, Result, SyncError};

use super::{BulkProvider, Query, RateLimiters, RawTable};

#[derive(Serialize)]
struct Request<'a> {
    api_name: &'a str,
    token: &'a str,
    params: &'a BTreeMap<&'static str, String>,
    fields: String,
}

#[derive(Deserialize)]
struct Response {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<RawTable>,
}

/// HTTP client for the Tushare Pro API.
pub struct TushareClient {
    client: Client,
    endpoint: String,
    token: String,
    limiters: RateLimiters,
    row_caps: HashMap<String, usize>,
}

impl TushareClient {
    pub fn new(cfg: &TushareConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("Failed to construct Tushare HTTP client")?;

        let mut limiters = RateLimiters::per_minute(cfg.calls_per_minute);
        let mut row_caps = HashMap::new();
        for (api, endpoint) in &cfg.endpoints {
            if let Some(calls) = endpoint.calls_per_minute {
                limiters = limiters.with_quota(api.clone(), Quota::per_minute(calls));
            }
            if let Some(cap) = endpoint.row_cap {
                row_caps.insert(api.clone(), cap);
            }
        }

        info!(
            "Tushare client ready: {} ({} calls/min default)",
            cfg.endpoint, cfg.calls_per_minute
        );
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            token: cfg.token.clone(),
            limiters,
            row_caps,
        })
    }

    fn post(&self, query: &Query) -> Result<String> {
        let request = Request {
            api_name: query.api,
            token: &self.token,
            params: &query.params,
            fields: query.fields.join(","),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .with_context(|| format!("Tushare request `{}` failed", query.api))?
            .error_for_status()
            .with_context(|| format!("Tushare request `{}` returned error status", query.api))?;

        let body = response
            .text()
            .with_context(|| format!("Failed to read Tushare body for `{}`", query.api))?;
        Ok(body)
    }
}

impl BulkProvider for TushareClient {
    fn query(&self, query: &Query) -> Result<RawTable> {
        let body = self.limiters.call(query.api, || self.post(query))?;
        let table = parse_response(&body, query.api)?;
        debug!(
            "{} {:?} -> {} rows{}",
            query.api,
            query.params,
            table.len(),
            if table.has_more { " (more available)" } else { "" }
        );
        Ok(table)
    }

    fn row_cap(&self, api: &str) -> Option<usize> {
        self.row_caps.get(api).copied()
    }
}

fn parse_response(body: &str, api: &str) -> Result<RawTable> {
    let response: Response = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse Tushare JSON for `{api}`"))?;

    if response.code != 0 {
        return Err(SyncError::Provider {
            api: api.to_string(),
            code: response.code,
            message: response.msg.unwrap_or_default(),
        });
    }

    Ok(response.data.unwrap_or_default())
}
