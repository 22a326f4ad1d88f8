use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::code::SecurityCode;
use crate::error::Result;
use crate::fetch::{decode_rows, BulkProvider, Query};
use crate::records::{Column, Schema};
use crate::utils::Clock;

use super::ReferenceTable;

pub static STOCK_BASIC: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::text("symbol"),
        Column::text("name"),
        Column::text("area"),
        Column::text("industry"),
        Column::text("fullname"),
        Column::text("market"),
        Column::text("exchange"),
        Column::text("list_status"),
        Column::date("list_date"),
        Column::date("delist_date"),
        Column::text("is_hs"),
    ],
    temporal_key: "list_date",
};

/// Listed securities with their listing dates.
pub struct StockBasic {
    table: ReferenceTable,
}

impl StockBasic {
    pub fn new(data_dir: &Path, clock: Arc<dyn Clock>) -> Self {
        let path = data_dir.join("stock_basic").join("stock_basic.csv");
        Self {
            table: ReferenceTable::new("stock_basic", path, &STOCK_BASIC, clock),
        }
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn load(&self) -> Result<()> {
        self.table.load()
    }

    /// Refetch the full listing when the local copy is more than a week old.
    pub fn update(&self, provider: &dyn BulkProvider) -> Result<bool> {
        if !self.table.should_update()? {
            return Ok(false);
        }
        let query = Query::new("stock_basic")
            .param("exchange", "")
            .param("list_status", "L")
            .fields(&STOCK_BASIC.header());
        let raw = provider.query_complete(&query)?;
        self.table.replace(decode_rows(&STOCK_BASIC, &raw)?)?;
        Ok(true)
    }

    pub fn list_date_of(&self, code: &SecurityCode) -> Option<NaiveDate> {
        let position = STOCK_BASIC.position("list_date")?;
        self.table.read(|table| {
            table
                .find("ts_code", &code.canonical())
                .and_then(|row| row[position].as_date())
        })
    }
}
