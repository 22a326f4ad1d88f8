//! Generic incremental dataset store: staleness check, calendar-bounded windowing,
//! chunked retrieval and merge-then-persist.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};

use crate::calendar::TradeCalendar;
use crate::error::{Result, SyncError};
use crate::records::{Record, Schema, Table};
use crate::utils::modified_date;

/// Rule deciding whether the local copy must be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessPolicy {
    /// Stale when the file was last written before the latest trading day.
    FileMtime,
    /// Stale when the last row's temporal key is before the latest trading day.
    ContentCursor,
    /// Stale when the file is older than `days`, whatever the calendar says.
    FixedInterval { days: i64 },
}

/// How the fetch range `[start, latest trading day]` is split into provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Chunked { step_days: i64 },
    /// One call per open day in the range.
    TradeDays,
    /// One un-windowed call returning the provider's full current view.
    Snapshot,
}

/// Range handed to a [`RecordSource`] for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRange {
    Between(NaiveDate, NaiveDate),
    Day(NaiveDate),
    Snapshot,
}

impl fmt::Display for FetchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchRange::Between(start, end) => write!(f, "{start} -- {end}"),
            FetchRange::Day(day) => write!(f, "{day}"),
            FetchRange::Snapshot => f.write_str("snapshot"),
        }
    }
}

/// Rows returned by one provider call, already laid out by the dataset schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub row_cap: Option<usize>,
    pub has_more: bool,
}

impl Page {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            row_cap: None,
            has_more: false,
        }
    }

    /// A page that filled the provider's row cap, or that the provider flagged as partial.
    pub fn is_truncated(&self) -> bool {
        self.has_more || self.row_cap.is_some_and(|cap| self.records.len() >= cap)
    }
}

/// Remote fetch function behind one dataset.
pub trait RecordSource: Send + Sync {
    fn fetch(&self, range: FetchRange) -> Result<Page>;
}

/// Static description of one dataset kind.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSpec {
    pub name: &'static str,
    pub schema: &'static Schema,
    pub base_date: NaiveDate,
    pub policy: StalenessPolicy,
    pub window: Window,
}

impl DatasetSpec {
    /// Same dataset with a different chunk size. Other windows are left alone.
    pub fn with_step(mut self, step_days: i64) -> Self {
        if let Window::Chunked { .. } = self.window {
            self.window = Window::Chunked { step_days };
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Staleness policy said the local copy is current; nothing was fetched.
    Fresh,
    /// Fetch ran but returned no rows; the file was not rewritten.
    NoNewRows,
    Updated { fetched: usize, added: usize },
}

/// One dataset table on disk plus the machinery to bring it up to date.
pub struct DatasetStore {
    spec: DatasetSpec,
    path: PathBuf,
    label: String,
    source: Box<dyn RecordSource>,
    calendar: Arc<TradeCalendar>,
    listing_date: Option<NaiveDate>,
    table: Option<Table>,
}

impl DatasetStore {
    pub fn new(
        spec: DatasetSpec,
        path: PathBuf,
        label: impl Into<String>,
        source: Box<dyn RecordSource>,
        calendar: Arc<TradeCalendar>,
    ) -> Self {
        Self {
            spec,
            path,
            label: label.into(),
            source,
            calendar,
            listing_date: None,
            table: None,
        }
    }

    /// Never start fetching before the security was listed.
    pub fn with_listing_date(mut self, listing_date: Option<NaiveDate>) -> Self {
        self.listing_date = listing_date;
        self
    }

    pub fn spec(&self) -> &DatasetSpec {
        &self.spec
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Read the local table, or start from an empty one when the file is absent.
    pub fn load(&mut self) -> Result<&Table> {
        let table = if self.path.exists() {
            Table::read_csv(&self.path, self.spec.schema)?
        } else {
            warn!(
                "{}: no local data at {}, starting from empty",
                self.label,
                self.path.display()
            );
            Table::empty(self.spec.schema)
        };
        Ok(self.table.insert(table))
    }

    pub fn prepare(&mut self) -> Result<&Table> {
        if self.table.is_none() {
            self.load()?;
        }
        let schema = self.spec.schema;
        Ok(self.table.get_or_insert_with(|| Table::empty(schema)))
    }

    pub fn should_update(&mut self) -> Result<bool> {
        match self.spec.policy {
            StalenessPolicy::FileMtime => match modified_date(&self.path)? {
                None => Ok(true),
                Some(mtime) => Ok(mtime < self.calendar.latest_trade_day()?),
            },
            StalenessPolicy::ContentCursor => {
                let last = self.prepare()?.last_key_date();
                match last {
                    None => Ok(true),
                    Some(last) => Ok(last < self.calendar.latest_trade_day()?),
                }
            }
            StalenessPolicy::FixedInterval { days } => match modified_date(&self.path)? {
                None => Ok(true),
                Some(mtime) => Ok((self.calendar.today() - mtime).num_days() > days),
            },
        }
    }

    /// Resume cursor: the day after the last stored key, or the dataset's base date
    /// (not before listing) when nothing is stored yet.
    pub fn start_date(&mut self) -> Result<NaiveDate> {
        let base = self.spec.base_date;
        let listing = self.listing_date;
        let start = match self.prepare()?.last_key_date() {
            Some(last) => last + Duration::days(1),
            None => listing.map_or(base, |listed| base.max(listed)),
        };
        Ok(start)
    }

    /// Bring the table up to date. Rows fetched before a failure are still merged and
    /// persisted, then the failure is returned.
    pub fn update(&mut self) -> Result<UpdateOutcome> {
        self.prepare()?;
        if !self.should_update()? {
            info!("{}: local data is current", self.label);
            return Ok(UpdateOutcome::Fresh);
        }

        let start = match self.listing_date {
            Some(listed) => self.start_date()?.max(listed),
            None => self.start_date()?,
        };
        let boundary = self.calendar.latest_trade_day()?;

        let mut chunks: Vec<Vec<Record>> = Vec::new();
        let fetched = self.fetch_windows(start, boundary, &mut chunks);
        if let Err(err) = &fetched {
            warn!("{}: update interrupted: {}", self.label, err);
        }

        let rows: usize = chunks.iter().map(Vec::len).sum();
        let persisted = if chunks.is_empty() {
            Ok(0)
        } else {
            self.merge_and_persist(chunks)
        };

        match (fetched, persisted) {
            (Err(err), Err(persist_err)) => {
                warn!(
                    "{}: checkpoint of {} rows failed: {}",
                    self.label, rows, persist_err
                );
                Err(err)
            }
            (Err(err), Ok(_)) => Err(err),
            (Ok(()), Err(persist_err)) => Err(persist_err),
            (Ok(()), Ok(_)) if rows == 0 => {
                info!("{}: no new rows through {}", self.label, boundary);
                Ok(UpdateOutcome::NoNewRows)
            }
            (Ok(()), Ok(added)) => {
                info!(
                    "{}: updated through {} ({} fetched, {} new) at {}",
                    self.label,
                    boundary,
                    rows,
                    added,
                    self.path.display()
                );
                Ok(UpdateOutcome::Updated {
                    fetched: rows,
                    added,
                })
            }
        }
    }

    fn fetch_windows(
        &self,
        start: NaiveDate,
        boundary: NaiveDate,
        chunks: &mut Vec<Vec<Record>>,
    ) -> Result<()> {
        match self.spec.window {
            Window::Snapshot => self.fetch_one(FetchRange::Snapshot, chunks),
            Window::TradeDays => {
                for day in self.calendar.trade_day_between(start, boundary) {
                    self.fetch_one(FetchRange::Day(day), chunks)?;
                }
                Ok(())
            }
            Window::Chunked { step_days } => {
                let mut start = start;
                while start <= boundary {
                    let end = (start + Duration::days(step_days)).min(boundary);
                    self.fetch_one(FetchRange::Between(start, end), chunks)?;
                    start = end + Duration::days(1);
                }
                Ok(())
            }
        }
    }

    fn fetch_one(&self, range: FetchRange, chunks: &mut Vec<Vec<Record>>) -> Result<()> {
        let page = self.source.fetch(range)?;
        if page.is_truncated() {
            return Err(SyncError::CapacityExceeded {
                dataset: self.label.clone(),
                window: format!("window {range}"),
                rows: page.records.len(),
            });
        }

        if page.records.is_empty() {
            debug!("{}: {} returned no rows", self.label, range);
        } else {
            info!("{}: fetched {} rows for {}", self.label, page.records.len(), range);
            chunks.push(page.records);
        }
        Ok(())
    }

    fn merge_and_persist(&mut self, chunks: Vec<Vec<Record>>) -> Result<usize> {
        let table = self
            .table
            .get_or_insert_with(|| Table::empty(self.spec.schema));
        let added = table.merge(chunks);
        table.write_csv(&self.path)?;
        Ok(added)
    }
}
