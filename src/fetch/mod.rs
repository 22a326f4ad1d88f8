use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use log::warn;
use serde::Deserialize;

use crate::code::SecurityCode;
use crate::error::{Result, SyncError};
use crate::utils::compact_date;

pub mod decode;
pub mod limiter;
pub mod session;
pub mod tushare;

pub use decode::decode_rows;
pub use limiter::{RateLimiter, RateLimiters};
pub use session::TushareSession;
pub use tushare::TushareClient;

/// Column-major-named, row-major-valued result of one provider call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTable {
    pub fields: Vec<String>,
    #[serde(default)]
    pub items: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub has_more: bool,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field == name)
    }

    /// Rename provider fields to the names the stored schema uses.
    pub fn rename_fields(&mut self, renames: &[(&str, &str)]) {
        for field in &mut self.fields {
            if let Some((_, to)) = renames.iter().find(|(from, _)| *from == field.as_str()) {
                *field = (*to).to_string();
            }
        }
    }

    /// Append a column computed from each row.
    pub fn push_field<F>(&mut self, name: &str, derive: F)
    where
        F: Fn(&[serde_json::Value]) -> serde_json::Value,
    {
        for item in &mut self.items {
            let value = derive(item);
            item.push(value);
        }
        self.fields.push(name.to_string());
    }

    /// A page that filled `row_cap` or that the provider flagged as partial is an error,
    /// never a result.
    pub fn ensure_complete(
        &self,
        dataset: &str,
        window: impl fmt::Display,
        row_cap: Option<usize>,
    ) -> Result<()> {
        let full = row_cap.is_some_and(|cap| self.len() >= cap);
        if self.has_more || full {
            return Err(SyncError::CapacityExceeded {
                dataset: dataset.to_string(),
                window: window.to_string(),
                rows: self.len(),
            });
        }
        Ok(())
    }

    /// Keep only the rows for which `keep` holds.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: Fn(&[serde_json::Value]) -> bool,
    {
        self.items.retain(|item| keep(item));
    }
}

/// One bulk-provider call: endpoint name, parameters and the requested fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub api: &'static str,
    pub params: BTreeMap<&'static str, String>,
    pub fields: Vec<&'static str>,
}

impl Query {
    pub fn new(api: &'static str) -> Self {
        Self {
            api,
            params: BTreeMap::new(),
            fields: Vec::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.params.insert(name, value.into());
        self
    }

    pub fn date(self, name: &'static str, date: NaiveDate) -> Self {
        self.param(name, compact_date(date))
    }

    pub fn between(self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date("start_date", start).date("end_date", end)
    }

    pub fn code(self, code: &SecurityCode) -> Self {
        self.param("ts_code", code.canonical())
    }

    pub fn fields(mut self, fields: &[&'static str]) -> Self {
        self.fields = fields.to_vec();
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call `{}`", self.api)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            write!(f, " ({})", params.join(", "))?;
        }
        Ok(())
    }
}

/// Token-authenticated bulk data API (provider A).
pub trait BulkProvider: Send + Sync {
    fn query(&self, query: &Query) -> Result<RawTable>;

    /// Maximum rows a single call to `api` can return, when the provider enforces one.
    fn row_cap(&self, api: &str) -> Option<usize>;

    /// Run `query` and reject a truncated answer with [`SyncError::CapacityExceeded`].
    fn query_complete(&self, query: &Query) -> Result<RawTable> {
        let raw = self.query(query)?;
        raw.ensure_complete(query.api, query, self.row_cap(query.api))?;
        Ok(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    FiveMinutes,
}

/// Index constituent lists kept under `stock_pool/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolKind {
    Hs300,
    Zz500,
}

impl PoolKind {
    pub const ALL: [PoolKind; 2] = [PoolKind::Hs300, PoolKind::Zz500];

    pub fn name(self) -> &'static str {
        match self {
            PoolKind::Hs300 => "hs300",
            PoolKind::Zz500 => "zz500",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|pool| pool.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Index whose weights define the pool.
    pub fn index_code(self) -> &'static str {
        match self {
            PoolKind::Hs300 => "399300.SZ",
            PoolKind::Zz500 => "000905.SH",
        }
    }
}

/// Login-scoped provider of k-line bars and constituent lists (provider B).
///
/// Every query must happen between `login` and `logout`. Use [`SessionGuard`] so the
/// session is closed on every exit path.
pub trait SessionProvider: Send + Sync {
    fn login(&self) -> Result<()>;

    fn logout(&self) -> Result<()>;

    /// Bars for `code` with `date` (and `time` for intraday) columns in the stored layout.
    fn query_k_data(
        &self,
        code: &SecurityCode,
        frequency: Frequency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable>;

    /// Latest constituent list as of `as_of`, with `updateDate`, `code`, `code_name` columns.
    fn query_constituents(&self, pool: PoolKind, as_of: NaiveDate) -> Result<RawTable>;

    /// Industry of every listed security as of `as_of`, with `updateDate`, `code`,
    /// `code_name`, `industry` and `industryClassification` columns.
    fn query_stock_industry(&self, as_of: NaiveDate) -> Result<RawTable>;

    /// Rows one k-line call can return at most, when the provider has such a limit.
    fn row_cap(&self, _frequency: Frequency) -> Option<usize> {
        None
    }
}

/// Open session that logs out when dropped.
pub struct SessionGuard<'a> {
    provider: &'a dyn SessionProvider,
}

impl<'a> SessionGuard<'a> {
    pub fn login(provider: &'a dyn SessionProvider) -> Result<Self> {
        provider.login()?;
        Ok(Self { provider })
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.provider.logout() {
            warn!("session logout failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBulk, ScriptedSession};
    use crate::utils::ymd;
    use serde_json::json;

    #[test]
    fn query_builder_formats_dates_compactly() {
        let code = SecurityCode::parse("sh.600000").unwrap();
        let query = Query::new("adj_factor")
            .code(&code)
            .between(ymd(2024, 1, 2), ymd(2024, 3, 29))
            .fields(&["ts_code", "trade_date"]);

        assert_eq!(query.params["ts_code"], "600000.SH");
        assert_eq!(query.params["start_date"], "20240102");
        assert_eq!(query.params["end_date"], "20240329");
        assert_eq!(query.fields, vec!["ts_code", "trade_date"]);
    }

    #[test]
    fn raw_table_renames_and_derives_fields() {
        let mut raw = RawTable {
            fields: vec!["trade_time".into(), "vol".into()],
            items: vec![vec![json!("2024-01-02 09:35:00"), json!(1200)]],
            has_more: false,
        };

        raw.rename_fields(&[("trade_time", "time"), ("vol", "volume")]);
        raw.push_field("date", |row| json!(row[0].as_str().map(|t| &t[..10])));

        assert_eq!(raw.fields, vec!["time", "volume", "date"]);
        assert_eq!(raw.items[0][2], json!("2024-01-02"));
    }

    #[test]
    fn pool_names_round_trip() {
        for pool in PoolKind::ALL {
            assert_eq!(PoolKind::parse(pool.name()), Some(pool));
        }
        assert_eq!(PoolKind::parse("HS300"), Some(PoolKind::Hs300));
        assert_eq!(PoolKind::parse("sz50"), None);
    }

    #[test]
    fn guard_logs_out_on_error_paths() {
        let session = ScriptedSession::default();

        let result: Result<()> = (|| {
            let _guard = SessionGuard::login(&session)?;
            Err(SyncError::message("query failed"))
        })();

        assert!(result.is_err());
        assert_eq!(session.logins(), 1);
        assert_eq!(session.logouts(), 1);
    }


    #[test]
    fn complete_query_rejects_full_and_flagged_pages() {
        let page = |rows: usize, has_more: bool| RawTable {
            fields: vec!["ts_code".into()],
            items: (0..rows).map(|_| vec![json!("600000.SH")]).collect(),
            has_more,
        };
        let query = Query::new("stock_basic").param("list_status", "L");

        let bulk = ScriptedBulk::default()
            .respond("stock_basic", page(3, false))
            .row_cap("stock_basic", 3);
        match bulk.query_complete(&query).unwrap_err() {
            SyncError::CapacityExceeded { dataset, window, rows } => {
                assert_eq!(dataset, "stock_basic");
                assert_eq!(window, "call `stock_basic` (list_status=L)");
                assert_eq!(rows, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        let flagged = ScriptedBulk::default().respond("stock_basic", page(1, true));
        assert!(matches!(
            flagged.query_complete(&query),
            Err(SyncError::CapacityExceeded { rows: 1, .. })
        ));

        let under_cap = ScriptedBulk::default()
            .respond("stock_basic", page(2, false))
            .row_cap("stock_basic", 3);
        assert_eq!(under_cap.query_complete(&query).unwrap().len(), 2);
    }
}
