//! Scripted stand-ins for the remote providers, shared by unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::calendar::{TradeCalendar, TradingDay};
use crate::code::SecurityCode;
use crate::error::{Result, SyncError};
use crate::fetch::{BulkProvider, Frequency, PoolKind, Query, RawTable, SessionProvider};
use crate::utils::FixedClock;

type Handler = Box<dyn Fn(&Query) -> Result<RawTable> + Send + Sync>;

/// Bulk provider answering from per-api handlers and recording every query.
#[derive(Default)]
pub struct ScriptedBulk {
    handlers: HashMap<String, Handler>,
    row_caps: HashMap<String, usize>,
    calls: Mutex<Vec<Query>>,
}

impl ScriptedBulk {
    pub fn handle<F>(mut self, api: &str, handler: F) -> Self
    where
        F: Fn(&Query) -> Result<RawTable> + Send + Sync + 'static,
    {
        self.handlers.insert(api.to_string(), Box::new(handler));
        self
    }

    pub fn respond(self, api: &str, table: RawTable) -> Self {
        self.handle(api, move |_| Ok(table.clone()))
    }

    pub fn fail(self, api: &str, message: &'static str) -> Self {
        self.handle(api, move |_| Err(SyncError::message(message)))
    }

    pub fn row_cap(mut self, api: &str, cap: usize) -> Self {
        self.row_caps.insert(api.to_string(), cap);
        self
    }

    pub fn calls(&self) -> Vec<Query> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, api: &str) -> Vec<Query> {
        self.calls()
            .into_iter()
            .filter(|query| query.api == api)
            .collect()
    }
}

impl BulkProvider for ScriptedBulk {
    fn query(&self, query: &Query) -> Result<RawTable> {
        self.calls.lock().unwrap().push(query.clone());
        match self.handlers.get(query.api) {
            Some(handler) => handler(query),
            None => Ok(RawTable::default()),
        }
    }

    fn row_cap(&self, api: &str) -> Option<usize> {
        self.row_caps.get(api).copied()
    }
}

type BarHandler =
    Box<dyn Fn(&SecurityCode, Frequency, NaiveDate, NaiveDate) -> Result<RawTable> + Send + Sync>;

/// Session provider with login/logout counters and scripted answers.
#[derive(Default)]
pub struct ScriptedSession {
    logins: AtomicUsize,
    logouts: AtomicUsize,
    bars: Option<BarHandler>,
    pools: HashMap<PoolKind, RawTable>,
    industries: Option<RawTable>,
    bar_calls: Mutex<Vec<(String, Frequency, NaiveDate, NaiveDate)>>,
}

impl ScriptedSession {
    pub fn bars<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SecurityCode, Frequency, NaiveDate, NaiveDate) -> Result<RawTable>
            + Send
            + Sync
            + 'static,
    {
        self.bars = Some(Box::new(handler));
        self
    }

    pub fn pool(self, pool: PoolKind, codes: &[&str]) -> Self {
        let items = codes
            .iter()
            .map(|code| {
                vec![
                    serde_json::json!("2024-04-30"),
                    serde_json::json!(code),
                    serde_json::json!(format!("name of {code}")),
                ]
            })
            .collect();
        self.pool_table(
            pool,
            RawTable {
                fields: vec!["updateDate".into(), "code".into(), "code_name".into()],
                items,
                has_more: false,
            },
        )
    }

    pub fn pool_table(mut self, pool: PoolKind, table: RawTable) -> Self {
        self.pools.insert(pool, table);
        self
    }

    /// Industry table answering every `query_stock_industry`, from `(code, industry)` pairs.
    pub fn industries(self, rows: &[(&str, &str)]) -> Self {
        let items = rows
            .iter()
            .map(|(code, industry)| {
                vec![
                    serde_json::json!("2024-05-06"),
                    serde_json::json!(code),
                    serde_json::json!(format!("name of {code}")),
                    serde_json::json!(industry),
                    serde_json::json!("申万一级行业"),
                ]
            })
            .collect();
        self.industry_table(RawTable {
            fields: vec![
                "updateDate".into(),
                "code".into(),
                "code_name".into(),
                "industry".into(),
                "industryClassification".into(),
            ],
            items,
            has_more: false,
        })
    }

    pub fn industry_table(mut self, table: RawTable) -> Self {
        self.industries = Some(table);
        self
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn bar_calls(&self) -> Vec<(String, Frequency, NaiveDate, NaiveDate)> {
        self.bar_calls.lock().unwrap().clone()
    }
}

impl SessionProvider for ScriptedSession {
    fn login(&self) -> Result<()> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn query_k_data(
        &self,
        code: &SecurityCode,
        frequency: Frequency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable> {
        self.bar_calls
            .lock()
            .unwrap()
            .push((code.canonical(), frequency, start, end));
        match &self.bars {
            Some(handler) => handler(code, frequency, start, end),
            None => Ok(RawTable::default()),
        }
    }

    fn query_constituents(&self, pool: PoolKind, _as_of: NaiveDate) -> Result<RawTable> {
        Ok(self.pools.get(&pool).cloned().unwrap_or_default())
    }

    fn query_stock_industry(&self, _as_of: NaiveDate) -> Result<RawTable> {
        Ok(self.industries.clone().unwrap_or_default())
    }
}

/// Calendar over `[from, to]` where weekdays are open, "today" pinned to `today`.
pub fn weekday_calendar(
    data_dir: &Path,
    today: NaiveDate,
    from: NaiveDate,
    to: NaiveDate,
) -> TradeCalendar {
    let calendar = TradeCalendar::new(data_dir, Arc::new(FixedClock(today)));
    calendar.extend(weekday_days(from, to));
    calendar
}

pub fn weekday_days(from: NaiveDate, to: NaiveDate) -> Vec<TradingDay> {
    let mut days = Vec::new();
    let mut previous_open: Option<NaiveDate> = None;
    let mut date = from;
    while date <= to {
        let is_open = !matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        days.push(TradingDay {
            cal_date: date,
            is_open,
            pretrade_date: previous_open,
        });
        if is_open {
            previous_open = Some(date);
        }
        date += Duration::days(1);
    }
    days
}
