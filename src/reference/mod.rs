//! Reference tables refreshed wholesale on a fixed interval.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use log::{info, warn};

use crate::error::Result;
use crate::records::{Record, Schema, Table};
use crate::utils::{modified_date, Clock};

pub mod concept;
pub mod index_basic;
pub mod pool;
pub mod stock_basic;
pub mod stock_company;
pub mod stock_industry;

pub use concept::ConceptDetail;
pub use index_basic::IndexBasic;
pub use pool::ConstituentPool;
pub use stock_basic::StockBasic;
pub use stock_company::StockCompany;
pub use stock_industry::StockIndustry;

/// Reference tables are refetched once their file is older than this many days.
pub const REFRESH_DAYS: i64 = 7;

/// A table replaced as a whole on refresh, shared behind the context.
pub struct ReferenceTable {
    label: &'static str,
    path: PathBuf,
    clock: Arc<dyn Clock>,
    max_age_days: i64,
    table: RwLock<Table>,
}

impl ReferenceTable {
    pub fn new(
        label: &'static str,
        path: PathBuf,
        schema: &'static Schema,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            label,
            path,
            clock,
            max_age_days: REFRESH_DAYS,
            table: RwLock::new(Table::empty(schema)),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<()> {
        let schema = self.read(|table| table.schema());
        let table = if self.path.exists() {
            Table::read_csv(&self.path, schema)?
        } else {
            warn!(
                "{}: no local data at {}, download it with `stock-sync update`",
                self.label,
                self.path.display()
            );
            Table::empty(schema)
        };
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
        Ok(())
    }

    /// True when the file is absent or older than the refresh interval.
    pub fn should_update(&self) -> Result<bool> {
        Ok(match modified_date(&self.path)? {
            None => true,
            Some(mtime) => (self.clock.today() - mtime).num_days() > self.max_age_days,
        })
    }

    /// Swap in freshly fetched rows and rewrite the file.
    pub fn replace(&self, rows: Vec<Record>) -> Result<usize> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.replace(rows);
        table.write_csv(&self.path)?;
        info!(
            "{}: refreshed {} rows at {}",
            self.label,
            table.len(),
            self.path.display()
        );
        Ok(table.len())
    }

    pub fn read<R>(&self, f: impl FnOnce(&Table) -> R) -> R {
        f(&self.table.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.read(Table::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(Table::is_empty)
    }
}
