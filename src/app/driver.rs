use std::collections::BTreeSet;
use std::fmt;

use log::{info, warn};

use crate::code::SecurityCode;
use crate::datasets::DatasetKind;
use crate::error::{Result, SyncError};
use crate::fetch::{PoolKind, SessionGuard};
use crate::reference::IndexBasic;
use crate::store::UpdateOutcome;

use super::StockData;

/// What one driver run touched.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, label: String, refreshed: bool) {
        if refreshed {
            self.updated.push(label);
        } else {
            self.skipped.push(label);
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} already current, {} failed",
            self.updated.len(),
            self.skipped.len(),
            self.failed.len()
        )?;
        for (label, err) in &self.failed {
            write!(f, "\n  - {label}: {err}")?;
        }
        Ok(())
    }
}

/// Runs dataset updates in a fixed order inside one provider session.
pub struct Synchronizer<'a> {
    data: &'a StockData,
    pools: Vec<PoolKind>,
    keep_going: bool,
}

impl<'a> Synchronizer<'a> {
    pub fn new(data: &'a StockData) -> Self {
        Self {
            data,
            pools: data.config().pools.clone(),
            keep_going: false,
        }
    }

    pub fn with_pools(mut self, pools: Vec<PoolKind>) -> Self {
        self.pools = pools;
        self
    }

    /// Log failed datasets and carry on instead of stopping at the first one.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// Full pass: calendar, reference tables (industries after concepts), market-wide
    /// datasets, the default index pool, then every tracked security.
    pub fn run(&self) -> Result<SyncReport> {
        let session = self.data.session_provider()?;
        let _guard = SessionGuard::login(session.as_ref())?;
        let mut report = SyncReport::default();

        self.refresh_calendar()?;

        let bulk = self.data.bulk_provider()?;
        let stock_basic = self.data.stock_basic()?;
        self.step(&mut report, "stock_basic".to_string(), || {
            stock_basic.update(bulk.as_ref())
        })?;
        let stock_company = self.data.stock_company()?;
        self.step(&mut report, "stock_company".to_string(), || {
            stock_company.update(bulk.as_ref())
        })?;
        let index_basic = self.data.index_basic()?;
        self.step(&mut report, "index_basic".to_string(), || {
            index_basic.update(bulk.as_ref())
        })?;
        for kind in &self.pools {
            let pool = self.data.pool(*kind)?;
            self.step(&mut report, format!("stock_pool[{}]", kind.name()), || {
                pool.update(session.as_ref())
            })?;
        }

        let concepts = self.data.concepts()?;
        self.step(&mut report, "concept_detail".to_string(), || {
            concepts.update(bulk.as_ref())
        })?;
        let stock_industry = self.data.stock_industry()?;
        self.step(&mut report, "stock_industry".to_string(), || {
            stock_industry.update(session.as_ref())
        })?;
        self.update_datasets(&mut report, &DatasetKind::MARKET, None)?;
        for index in IndexBasic::default_index_pool() {
            self.update_datasets(&mut report, &[DatasetKind::IndexDaily], Some(&index))?;
        }

        let codes = self.tracked_codes()?;
        info!("updating {} tracked securities", codes.len());
        for code in &codes {
            self.update_datasets(&mut report, &DatasetKind::SECURITY, Some(code))?;
        }

        info!("sync finished: {}", report);
        Ok(report)
    }

    /// Update the trading calendar only.
    pub fn refresh_calendar(&self) -> Result<usize> {
        let bulk = self.data.bulk_provider()?;
        self.data.trade_calendar()?.update(bulk.as_ref())
    }

    /// Update `kinds` for a single security, refreshing the calendar first.
    pub fn run_security(&self, code: &SecurityCode, kinds: &[DatasetKind]) -> Result<SyncReport> {
        let session = self.data.session_provider()?;
        let _guard = SessionGuard::login(session.as_ref())?;
        let mut report = SyncReport::default();

        self.refresh_calendar()?;
        self.update_datasets(&mut report, kinds, Some(code))?;
        Ok(report)
    }

    /// Update market-wide `kinds`, refreshing the calendar first.
    pub fn run_market(&self, kinds: &[DatasetKind]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        self.refresh_calendar()?;
        self.update_datasets(&mut report, kinds, None)?;
        Ok(report)
    }

    /// Members of every configured pool, deduplicated and sorted.
    pub fn tracked_codes(&self) -> Result<Vec<SecurityCode>> {
        let mut codes = BTreeSet::new();
        for kind in &self.pools {
            codes.extend(self.data.pool(*kind)?.stock_codes());
        }
        Ok(codes.into_iter().collect())
    }

    fn update_datasets(
        &self,
        report: &mut SyncReport,
        kinds: &[DatasetKind],
        code: Option<&SecurityCode>,
    ) -> Result<()> {
        for kind in kinds {
            self.step(report, kind.label(code), || {
                let mut store = self.data.store(*kind, code)?;
                Ok(matches!(store.update()?, UpdateOutcome::Updated { .. }))
            })?;
        }
        Ok(())
    }

    fn step<F>(&self, report: &mut SyncReport, label: String, update: F) -> Result<()>
    where
        F: FnOnce() -> Result<bool>,
    {
        match update() {
            Ok(refreshed) => {
                report.record(label, refreshed);
                Ok(())
            }
            Err(err) if self.keep_going && !is_fatal(&err) => {
                warn!("{}: update failed: {}", label, err);
                report.failed.push((label, err.to_string()));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Errors that would fail every later dataset the same way.
fn is_fatal(err: &SyncError) -> bool {
    matches!(
        err,
        SyncError::NotConfigured(_) | SyncError::StaleCalendar(_)
    )
}
