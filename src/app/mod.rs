//! Shared context handed to every component that needs the data directory,
//! the providers or one of the shared reference tables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use once_cell::sync::OnceCell;

use crate::calendar::TradeCalendar;
use crate::code::SecurityCode;
use crate::config::Config;
use crate::datasets::{DatasetKind, Scope};
use crate::error::{Result, SyncError};
use crate::fetch::{BulkProvider, PoolKind, SessionProvider, TushareClient, TushareSession};
use crate::reference::{
    ConceptDetail, ConstituentPool, IndexBasic, StockBasic, StockCompany, StockIndustry,
};
use crate::store::DatasetStore;
use crate::utils::{Clock, SystemClock};

pub mod driver;

pub use driver::{SyncReport, Synchronizer};

/// Construct-once context. Sub-services are built and loaded on first access
/// and shared afterwards.
pub struct StockData {
    config: Config,
    clock: Arc<dyn Clock>,
    bulk: Option<Arc<dyn BulkProvider>>,
    session: Option<Arc<dyn SessionProvider>>,
    calendar: OnceCell<Arc<TradeCalendar>>,
    stock_basic: OnceCell<Arc<StockBasic>>,
    stock_company: OnceCell<Arc<StockCompany>>,
    concepts: OnceCell<Arc<ConceptDetail>>,
    stock_industry: OnceCell<Arc<StockIndustry>>,
    index_basic: OnceCell<Arc<IndexBasic>>,
    hs300: OnceCell<Arc<ConstituentPool>>,
    zz500: OnceCell<Arc<ConstituentPool>>,
}

impl StockData {
    /// Context without providers. `data_dir` is taken from the config when present.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            bulk: None,
            session: None,
            calendar: OnceCell::new(),
            stock_basic: OnceCell::new(),
            stock_company: OnceCell::new(),
            concepts: OnceCell::new(),
            stock_industry: OnceCell::new(),
            index_basic: OnceCell::new(),
            hs300: OnceCell::new(),
            zz500: OnceCell::new(),
        }
    }

    /// Validated context wired to the Tushare client for both provider roles.
    pub fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let client: Arc<dyn BulkProvider> = Arc::new(TushareClient::new(&config.tushare)?);
        let session: Arc<dyn SessionProvider> = Arc::new(TushareSession::new(client.clone()));
        info!("using Tushare endpoint {}", config.tushare.endpoint);
        Ok(Self::new(config)
            .with_bulk_provider(client)
            .with_session_provider(session))
    }

    /// Point the context at `data_dir`. Anything built for a previous directory is dropped.
    pub fn setup(&mut self, data_dir: impl Into<PathBuf>) {
        self.config.data_dir = Some(data_dir.into());
        self.calendar = OnceCell::new();
        self.stock_basic = OnceCell::new();
        self.stock_company = OnceCell::new();
        self.concepts = OnceCell::new();
        self.stock_industry = OnceCell::new();
        self.index_basic = OnceCell::new();
        self.hs300 = OnceCell::new();
        self.zz500 = OnceCell::new();
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_bulk_provider(mut self, provider: Arc<dyn BulkProvider>) -> Self {
        self.bulk = Some(provider);
        self
    }

    pub fn with_session_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(provider);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn data_dir(&self) -> Result<&Path> {
        self.config
            .data_dir
            .as_deref()
            .ok_or(SyncError::NotConfigured("data directory"))
    }

    pub fn bulk_provider(&self) -> Result<Arc<dyn BulkProvider>> {
        self.bulk
            .clone()
            .ok_or(SyncError::NotConfigured("bulk provider"))
    }

    pub fn session_provider(&self) -> Result<Arc<dyn SessionProvider>> {
        self.session
            .clone()
            .ok_or(SyncError::NotConfigured("session provider"))
    }

    pub fn trade_calendar(&self) -> Result<Arc<TradeCalendar>> {
        self.calendar
            .get_or_try_init(|| {
                let calendar = TradeCalendar::new(self.data_dir()?, self.clock.clone());
                calendar.load()?;
                Ok(Arc::new(calendar))
            })
            .cloned()
    }

    pub fn stock_basic(&self) -> Result<Arc<StockBasic>> {
        self.stock_basic
            .get_or_try_init(|| {
                let table = StockBasic::new(self.data_dir()?, self.clock.clone());
                table.load()?;
                Ok(Arc::new(table))
            })
            .cloned()
    }

    pub fn stock_company(&self) -> Result<Arc<StockCompany>> {
        self.stock_company
            .get_or_try_init(|| {
                let table = StockCompany::new(self.data_dir()?, self.clock.clone());
                table.load()?;
                Ok(Arc::new(table))
            })
            .cloned()
    }

    pub fn concepts(&self) -> Result<Arc<ConceptDetail>> {
        self.concepts
            .get_or_try_init(|| {
                let table = ConceptDetail::new(self.data_dir()?, self.clock.clone());
                table.load()?;
                Ok(Arc::new(table))
            })
            .cloned()
    }

    pub fn stock_industry(&self) -> Result<Arc<StockIndustry>> {
        self.stock_industry
            .get_or_try_init(|| {
                let table = StockIndustry::new(self.data_dir()?, self.clock.clone());
                table.load()?;
                Ok(Arc::new(table))
            })
            .cloned()
    }

    pub fn index_basic(&self) -> Result<Arc<IndexBasic>> {
        self.index_basic
            .get_or_try_init(|| {
                let table = IndexBasic::new(self.data_dir()?, self.clock.clone());
                table.load()?;
                Ok(Arc::new(table))
            })
            .cloned()
    }

    pub fn pool(&self, kind: PoolKind) -> Result<Arc<ConstituentPool>> {
        let cell = match kind {
            PoolKind::Hs300 => &self.hs300,
            PoolKind::Zz500 => &self.zz500,
        };
        cell.get_or_try_init(|| {
            let pool = ConstituentPool::new(self.data_dir()?, kind, self.clock.clone());
            pool.load()?;
            Ok(Arc::new(pool))
        })
        .cloned()
    }

    /// Store for one dataset, bound to the shared calendar. Per-security stores
    /// never reach back before the security's listing date.
    pub fn store(&self, kind: DatasetKind, code: Option<&SecurityCode>) -> Result<DatasetStore> {
        let data_dir = self.data_dir()?;
        let mut spec = kind.spec();
        if let Some(step) = self.config.step_days_for(kind) {
            spec = spec.with_step(step);
        }

        let path = kind.path(data_dir, code)?;
        let source = kind.source(code, self.bulk.as_ref(), self.session.as_ref())?;
        let listing_date = match (kind.scope(), code) {
            (Scope::Security, Some(code)) => self.stock_basic()?.list_date_of(code),
            _ => None,
        };

        Ok(
            DatasetStore::new(spec, path, kind.label(code), source, self.trade_calendar()?)
                .with_listing_date(listing_date),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Window;
    use crate::testing::{ScriptedBulk, ScriptedSession};
    use crate::utils::{ymd, FixedClock};

    fn context(dir: &Path) -> StockData {
        let mut data = StockData::new(Config::builtin())
            .with_clock(Arc::new(FixedClock(ymd(2024, 5, 6))))
            .with_bulk_provider(Arc::new(ScriptedBulk::default()))
            .with_session_provider(Arc::new(ScriptedSession::default()));
        data.setup(dir);
        data
    }

    #[test]
    fn data_dir_before_setup_is_fatal() {
        let data = StockData::new(Config::builtin());
        assert!(matches!(
            data.data_dir(),
            Err(SyncError::NotConfigured("data directory"))
        ));
        assert!(matches!(
            data.trade_calendar(),
            Err(SyncError::NotConfigured(_))
        ));
    }

    #[test]
    fn accessors_memoize_shared_instances() {
        let dir = tempfile::tempdir().unwrap();
        let data = context(dir.path());

        let first = data.trade_calendar().unwrap();
        let second = data.trade_calendar().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(
            &data.pool(PoolKind::Hs300).unwrap(),
            &data.pool(PoolKind::Hs300).unwrap()
        ));
        assert!(!Arc::ptr_eq(
            &data.pool(PoolKind::Hs300).unwrap(),
            &data.pool(PoolKind::Zz500).unwrap()
        ));
    }

    #[test]
    fn setup_rebinds_reference_tables() {
        let first_dir = tempfile::tempdir().unwrap();
        let second_dir = tempfile::tempdir().unwrap();
        let mut data = context(first_dir.path());
        let before = data.trade_calendar().unwrap();

        data.setup(second_dir.path());
        let after = data.trade_calendar().unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(after.file_path().starts_with(second_dir.path()));
    }

    #[test]
    fn store_applies_step_override_and_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::builtin();
        config.datasets.insert(
            "5min".to_string(),
            crate::config::DatasetOverride {
                step_days: Some(20),
            },
        );
        let mut data = StockData::new(config)
            .with_clock(Arc::new(FixedClock(ymd(2024, 5, 6))))
            .with_session_provider(Arc::new(ScriptedSession::default()));
        data.setup(dir.path());

        let code = SecurityCode::parse("sz.000001").unwrap();
        let store = data.store(DatasetKind::FiveMinute, Some(&code)).unwrap();
        assert_eq!(store.spec().window, Window::Chunked { step_days: 20 });
        assert_eq!(
            store.file_path(),
            dir.path().join("stocks").join("000001.SZ").join("5min.csv")
        );
        assert_eq!(store.label(), "5min[000001.SZ]");

        let missing_bulk = data.store(DatasetKind::Margin, None);
        assert!(matches!(
            missing_bulk,
            Err(SyncError::NotConfigured("bulk provider"))
        ));
    }
}
