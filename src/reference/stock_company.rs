use std::path::Path;
use std::sync::Arc;

use crate::code::SecurityCode;
use crate::error::Result;
use crate::fetch::{decode_rows, BulkProvider, Query};
use crate::records::{Column, Record, Schema};
use crate::utils::Clock;

use super::ReferenceTable;

pub static STOCK_COMPANY: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::text("exchange"),
        Column::text("chairman"),
        Column::text("manager"),
        Column::text("secretary"),
        Column::float("reg_capital"),
        Column::date("setup_date"),
        Column::text("province"),
        Column::text("city"),
        Column::text("introduction"),
        Column::text("website"),
        Column::text("email"),
        Column::text("office"),
        Column::int("employees"),
        Column::text("main_business"),
        Column::text("business_scope"),
    ],
    temporal_key: "setup_date",
};

/// Company profiles of listed securities, kept next to the listing table.
pub struct StockCompany {
    table: ReferenceTable,
}

impl StockCompany {
    pub fn new(data_dir: &Path, clock: Arc<dyn Clock>) -> Self {
        let path = data_dir.join("stock_basic").join("stock_company.csv");
        Self {
            table: ReferenceTable::new("stock_company", path, &STOCK_COMPANY, clock),
        }
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn load(&self) -> Result<()> {
        self.table.load()
    }

    pub fn update(&self, provider: &dyn BulkProvider) -> Result<bool> {
        if !self.table.should_update()? {
            return Ok(false);
        }
        let query = Query::new("stock_company")
            .param("exchange", "")
            .fields(&STOCK_COMPANY.header());
        let raw = provider.query_complete(&query)?;
        self.table.replace(decode_rows(&STOCK_COMPANY, &raw)?)?;
        Ok(true)
    }

    pub fn profile_of(&self, code: &SecurityCode) -> Option<Record> {
        self.table
            .read(|table| table.find("ts_code", &code.canonical()).cloned())
    }
}
