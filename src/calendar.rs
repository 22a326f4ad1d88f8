use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Context, Result, SyncError};
use crate::fetch::decode::value_to_string;
use crate::fetch::{BulkProvider, Query};
use crate::records::schema::parse_date;
use crate::utils::{write_atomically, Clock};

/// First year the calendar is kept for.
pub const CALENDAR_EPOCH_YEAR: i32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingDay {
    pub cal_date: NaiveDate,
    pub is_open: bool,
    pub pretrade_date: Option<NaiveDate>,
}

/// Exchange trading calendar cached at `{data_dir}/trade_calendar/trade_calendar.csv`.
pub struct TradeCalendar {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    days: RwLock<BTreeMap<NaiveDate, TradingDay>>,
}

impl TradeCalendar {
    pub fn new(data_dir: &Path, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: data_dir.join("trade_calendar").join("trade_calendar.csv"),
            clock,
            days: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Replace the in-memory calendar with the local file, or an empty one when absent.
    pub fn load(&self) -> Result<()> {
        let mut days = BTreeMap::new();
        if self.path.exists() {
            let mut reader = csv::Reader::from_path(&self.path)
                .with_context(|| format!("Failed to open calendar {}", self.path.display()))?;
            for row in reader.deserialize::<TradingDay>() {
                let day = row.with_context(|| {
                    format!("Failed to read calendar row in {}", self.path.display())
                })?;
                days.insert(day.cal_date, day);
            }
        } else {
            warn!(
                "no local trading calendar at {}, starting from empty",
                self.path.display()
            );
        }

        *self.write() = days;
        Ok(())
    }

    /// Fetch every missing year since the epoch and rewrite the file when anything was added.
    pub fn update(&self, provider: &dyn BulkProvider) -> Result<usize> {
        self.load()?;

        let mut fetched = Vec::new();
        for year in CALENDAR_EPOCH_YEAR..=self.today().year() {
            let jan_1 = NaiveDate::from_ymd_opt(year, 1, 1)
                .ok_or_else(|| SyncError::message(format!("year {year} out of range")))?;
            if self.read().contains_key(&jan_1) {
                continue;
            }
            let end = NaiveDate::from_ymd_opt(year, 12, 31)
                .ok_or_else(|| SyncError::message(format!("year {year} out of range")))?;
            fetched.extend(Self::fetch_year_calendar(provider, jan_1, end)?);
        }

        if fetched.is_empty() {
            return Ok(0);
        }

        let added = self.extend(fetched);
        self.save()?;
        info!("trading calendar extended by {} days", added);
        Ok(added)
    }

    /// Remote calendar rows for `[start, end]`, sorted by date.
    pub fn fetch_year_calendar(
        provider: &dyn BulkProvider,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TradingDay>> {
        let query = Query::new("trade_cal")
            .param("exchange", "SSE")
            .between(start, end)
            .fields(&["cal_date", "is_open", "pretrade_date"]);
        let raw = provider.query_complete(&query)?;

        let column = |name: &str| {
            raw.field_index(name).ok_or_else(|| {
                SyncError::message(format!("trade_cal response is missing `{name}`"))
            })
        };
        let (date_idx, open_idx) = (column("cal_date")?, column("is_open")?);
        let prev_idx = raw.field_index("pretrade_date");

        let mut days = Vec::with_capacity(raw.len());
        for item in &raw.items {
            let text = |idx: usize| item.get(idx).map(value_to_string).unwrap_or_default();
            let cal_date = parse_date(&text(date_idx)).ok_or_else(|| {
                SyncError::message(format!("bad calendar date `{}`", text(date_idx)))
            })?;
            let flag = text(open_idx);
            days.push(TradingDay {
                cal_date,
                is_open: flag == "1" || flag.eq_ignore_ascii_case("true"),
                pretrade_date: prev_idx.and_then(|idx| parse_date(&text(idx))),
            });
        }
        days.sort_by_key(|day| day.cal_date);

        info!("downloaded trading calendar {} -- {}", start, end);
        Ok(days)
    }

    /// Add days not yet known. Existing entries are never overwritten.
    pub fn extend(&self, days: impl IntoIterator<Item = TradingDay>) -> usize {
        let mut known = self.write();
        let before = known.len();
        for day in days {
            known.entry(day.cal_date).or_insert(day);
        }
        known.len() - before
    }

    fn save(&self) -> Result<()> {
        let days = self.read();
        write_atomically(&self.path, |tmp| {
            let mut writer = csv::Writer::from_path(tmp)?;
            for day in days.values() {
                writer.serialize(day)?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    pub fn day(&self, date: NaiveDate) -> Option<TradingDay> {
        self.read().get(&date).copied()
    }

    pub fn is_open(&self, date: NaiveDate) -> Option<bool> {
        self.day(date).map(|day| day.is_open)
    }

    /// Today when the market is open today, else the previous trading day recorded for today.
    pub fn latest_trade_day(&self) -> Result<NaiveDate> {
        self.latest_trade_day_on(self.today())
    }

    pub fn latest_trade_day_on(&self, date: NaiveDate) -> Result<NaiveDate> {
        let day = self.day(date).ok_or(SyncError::StaleCalendar(date))?;
        if day.is_open {
            return Ok(date);
        }
        day.pretrade_date.ok_or_else(|| {
            SyncError::message(format!("calendar entry {date} has no previous trading day"))
        })
    }

    /// The `n`-th open day on or after `base_date` (0 is the first), capped at the last known
    /// open day. With `last_date`, the result never passes the last open day on or before it,
    /// even when `last_date` lies beyond the calendar.
    pub fn next_n_trade_day(
        &self,
        base_date: NaiveDate,
        n: usize,
        last_date: Option<NaiveDate>,
    ) -> Result<NaiveDate> {
        let open: Vec<NaiveDate> = self
            .read()
            .range(base_date..)
            .filter(|(_, day)| day.is_open)
            .map(|(date, _)| *date)
            .collect();
        let Some(&day) = open.get(n.min(open.len().saturating_sub(1))) else {
            return Err(SyncError::message(format!(
                "no trading day on or after {base_date} in the calendar"
            )));
        };

        let Some(last) = last_date else {
            return Ok(day);
        };
        let latest = self
            .read()
            .range(..=last)
            .rev()
            .find(|(_, entry)| entry.is_open)
            .map(|(date, _)| *date)
            .ok_or_else(|| {
                SyncError::message(format!("no trading day on or before {last} in the calendar"))
            })?;
        Ok(day.min(latest))
    }

    /// Open days in `[from, to]`, ascending.
    pub fn trade_day_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        if from > to {
            return Vec::new();
        }
        self.read()
            .range(from..=to)
            .filter(|(_, day)| day.is_open)
            .map(|(date, _)| *date)
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<NaiveDate, TradingDay>> {
        self.days.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<NaiveDate, TradingDay>> {
        self.days.write().unwrap_or_else(PoisonError::into_inner)
    }
}
