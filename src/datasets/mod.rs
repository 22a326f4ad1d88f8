//! Catalogue of the datasets kept in sync, each an instance of the generic store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::code::SecurityCode;
use crate::error::{Result, SyncError};
use crate::fetch::{BulkProvider, Frequency, SessionProvider};
use crate::store::{DatasetSpec, RecordSource, StalenessPolicy, Window};
use crate::utils::ymd;

pub mod market;
pub mod source;
pub mod stocks;

pub use source::{BulkSource, KlineSource};

/// Earliest date any exchange data exists for.
pub const MARKET_EPOCH: NaiveDate = ymd(1990, 12, 19);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `stocks/{code}/`
    Security,
    /// `index/{code}/`
    Index,
    /// `market/`
    Market,
}

/// Where a dataset's rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Bulk(&'static str),
    Session(Frequency),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Daily,
    FiveMinute,
    AdjFactor,
    Top10Holders,
    StkHolderTrade,
    PledgeStat,
    PledgeDetail,
    IndexDaily,
    Margin,
    BlockTrade,
    TopInst,
}

impl DatasetKind {
    pub const SECURITY: [DatasetKind; 7] = [
        DatasetKind::Daily,
        DatasetKind::FiveMinute,
        DatasetKind::AdjFactor,
        DatasetKind::Top10Holders,
        DatasetKind::StkHolderTrade,
        DatasetKind::PledgeStat,
        DatasetKind::PledgeDetail,
    ];

    pub const MARKET: [DatasetKind; 3] = [
        DatasetKind::Margin,
        DatasetKind::BlockTrade,
        DatasetKind::TopInst,
    ];

    pub const ALL: [DatasetKind; 11] = [
        DatasetKind::Daily,
        DatasetKind::FiveMinute,
        DatasetKind::AdjFactor,
        DatasetKind::Top10Holders,
        DatasetKind::StkHolderTrade,
        DatasetKind::PledgeStat,
        DatasetKind::PledgeDetail,
        DatasetKind::IndexDaily,
        DatasetKind::Margin,
        DatasetKind::BlockTrade,
        DatasetKind::TopInst,
    ];

    /// Name used on the command line, in config overrides and in log labels.
    pub fn name(self) -> &'static str {
        match self {
            DatasetKind::Daily => "day",
            DatasetKind::FiveMinute => "5min",
            DatasetKind::AdjFactor => "adj_factor",
            DatasetKind::Top10Holders => "top10_holders",
            DatasetKind::StkHolderTrade => "stk_holder_trade",
            DatasetKind::PledgeStat => "pledge_stat",
            DatasetKind::PledgeDetail => "pledge_detail",
            DatasetKind::IndexDaily => "index_daily",
            DatasetKind::Margin => "margin_trading",
            DatasetKind::BlockTrade => "block_trade",
            DatasetKind::TopInst => "top_inst",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn scope(self) -> Scope {
        match self {
            DatasetKind::IndexDaily => Scope::Index,
            DatasetKind::Margin | DatasetKind::BlockTrade | DatasetKind::TopInst => Scope::Market,
            _ => Scope::Security,
        }
    }

    pub fn feed(self) -> Feed {
        match self {
            DatasetKind::Daily => Feed::Session(Frequency::Daily),
            DatasetKind::FiveMinute => Feed::Session(Frequency::FiveMinutes),
            DatasetKind::AdjFactor => Feed::Bulk("adj_factor"),
            DatasetKind::Top10Holders => Feed::Bulk("top10_holders"),
            DatasetKind::StkHolderTrade => Feed::Bulk("stk_holdertrade"),
            DatasetKind::PledgeStat => Feed::Bulk("pledge_stat"),
            DatasetKind::PledgeDetail => Feed::Bulk("pledge_detail"),
            DatasetKind::IndexDaily => Feed::Bulk("index_daily"),
            DatasetKind::Margin => Feed::Bulk("margin"),
            DatasetKind::BlockTrade => Feed::Bulk("block_trade"),
            DatasetKind::TopInst => Feed::Bulk("top_inst"),
        }
    }

    pub fn spec(self) -> DatasetSpec {
        use StalenessPolicy::{ContentCursor, FileMtime};

        let (schema, base_date, policy, window) = match self {
            DatasetKind::Daily => {
                (&stocks::DAILY, ymd(2006, 1, 1), FileMtime, chunked(1000))
            }
            DatasetKind::FiveMinute => {
                (&stocks::FIVE_MINUTE, ymd(2011, 1, 1), ContentCursor, chunked(50))
            }
            DatasetKind::AdjFactor => {
                (&stocks::ADJ_FACTOR, MARKET_EPOCH, ContentCursor, chunked(3000))
            }
            DatasetKind::Top10Holders => {
                (&stocks::TOP10_HOLDERS, MARKET_EPOCH, FileMtime, chunked(3650))
            }
            DatasetKind::StkHolderTrade => {
                (&stocks::STK_HOLDER_TRADE, MARKET_EPOCH, FileMtime, chunked(365))
            }
            DatasetKind::PledgeStat => {
                (&stocks::PLEDGE_STAT, MARKET_EPOCH, FileMtime, Window::Snapshot)
            }
            DatasetKind::PledgeDetail => {
                (&stocks::PLEDGE_DETAIL, MARKET_EPOCH, FileMtime, Window::Snapshot)
            }
            DatasetKind::IndexDaily => {
                (&market::INDEX_DAILY, MARKET_EPOCH, ContentCursor, chunked(3000))
            }
            DatasetKind::Margin => {
                (&market::MARGIN, ymd(2014, 9, 22), ContentCursor, chunked(365))
            }
            DatasetKind::BlockTrade => {
                (&market::BLOCK_TRADE, ymd(2008, 1, 2), FileMtime, chunked(10))
            }
            DatasetKind::TopInst => {
                (&market::TOP_INST, ymd(2008, 1, 2), FileMtime, Window::TradeDays)
            }
        };

        DatasetSpec {
            name: self.name(),
            schema,
            base_date,
            policy,
            window,
        }
    }

    fn file_stem(self) -> &'static str {
        match self {
            DatasetKind::IndexDaily => "day",
            other => other.name(),
        }
    }

    /// `{data_dir}/{category}/{code?}/{dataset}.csv`
    pub fn path(self, data_dir: &Path, code: Option<&SecurityCode>) -> Result<PathBuf> {
        let file = format!("{}.csv", self.file_stem());
        match (self.scope(), code) {
            (Scope::Security, Some(code)) => {
                Ok(data_dir.join("stocks").join(code.canonical()).join(file))
            }
            (Scope::Index, Some(code)) => {
                Ok(data_dir.join("index").join(code.canonical()).join(file))
            }
            (Scope::Market, None) => Ok(data_dir.join("market").join(file)),
            (Scope::Market, Some(code)) => Err(SyncError::message(format!(
                "{} is market-wide and takes no code (got {code})",
                self
            ))),
            (_, None) => Err(SyncError::message(format!("{self} needs a security code"))),
        }
    }

    pub fn label(self, code: Option<&SecurityCode>) -> String {
        match code {
            Some(code) => format!("{}[{}]", self.name(), code),
            None => self.name().to_string(),
        }
    }

    /// Build the remote fetch function for this dataset.
    pub fn source(
        self,
        code: Option<&SecurityCode>,
        bulk: Option<&Arc<dyn BulkProvider>>,
        session: Option<&Arc<dyn SessionProvider>>,
    ) -> Result<Box<dyn RecordSource>> {
        let schema = self.spec().schema;
        match self.feed() {
            Feed::Bulk(api) => {
                let bulk = bulk.ok_or(SyncError::NotConfigured("bulk provider"))?;
                Ok(Box::new(BulkSource::new(
                    bulk.clone(),
                    api,
                    schema,
                    code.cloned(),
                )))
            }
            Feed::Session(frequency) => {
                let session = session.ok_or(SyncError::NotConfigured("session provider"))?;
                let code = code
                    .cloned()
                    .ok_or_else(|| SyncError::message(format!("{self} needs a security code")))?;
                Ok(Box::new(KlineSource::new(
                    session.clone(),
                    code,
                    frequency,
                    schema,
                )))
            }
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const fn chunked(step_days: i64) -> Window {
    Window::Chunked { step_days }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_schema_contains_its_temporal_key() {
        for kind in DatasetKind::ALL {
            let schema = kind.spec().schema;
            assert!(
                schema.position(schema.temporal_key).is_some(),
                "{kind}: key `{}` missing",
                schema.temporal_key
            );
        }
    }

    #[test]
    fn names_round_trip() {
        for kind in DatasetKind::ALL {
            assert_eq!(DatasetKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(DatasetKind::parse("weekly"), None);
    }

    #[test]
    fn lays_out_files_by_scope() {
        let base = Path::new("/data");
        let stock = SecurityCode::parse("sz.000001").unwrap();
        let index = SecurityCode::parse("000300.SH").unwrap();

        assert_eq!(
            DatasetKind::FiveMinute.path(base, Some(&stock)).unwrap(),
            Path::new("/data/stocks/000001.SZ/5min.csv")
        );
        assert_eq!(
            DatasetKind::IndexDaily.path(base, Some(&index)).unwrap(),
            Path::new("/data/index/000300.SH/day.csv")
        );
        assert_eq!(
            DatasetKind::BlockTrade.path(base, None).unwrap(),
            Path::new("/data/market/block_trade.csv")
        );
        assert!(DatasetKind::Daily.path(base, None).is_err());
        assert!(DatasetKind::Margin.path(base, Some(&stock)).is_err());
    }

    #[test]
    fn catalogue_matches_documented_windows() {
        assert_eq!(DatasetKind::Daily.spec().window, Window::Chunked { step_days: 1000 });
        assert_eq!(DatasetKind::BlockTrade.spec().window, Window::Chunked { step_days: 10 });
        assert_eq!(DatasetKind::TopInst.spec().window, Window::TradeDays);
        assert_eq!(DatasetKind::PledgeDetail.spec().window, Window::Snapshot);
        assert_eq!(DatasetKind::Margin.spec().base_date, ymd(2014, 9, 22));
        assert_eq!(
            DatasetKind::FiveMinute.spec().policy,
            StalenessPolicy::ContentCursor
        );
    }

    #[test]
    fn session_datasets_need_a_session() {
        let code = SecurityCode::parse("600000.SH").unwrap();
        assert!(matches!(
            DatasetKind::Daily.source(Some(&code), None, None),
            Err(SyncError::NotConfigured(_))
        ));
    }
}
