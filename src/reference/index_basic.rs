use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::code::SecurityCode;
use crate::error::{Result, SyncError};
use crate::fetch::{decode_rows, BulkProvider, Query};
use crate::records::{Column, Schema, Value};
use crate::utils::Clock;

use super::ReferenceTable;

/// Index publishers queried one by one on refresh.
pub const INDEX_MARKETS: &[(&str, &str)] = &[
    ("MSCI", "MSCI indices"),
    ("CSI", "China Securities Index"),
    ("SSE", "Shanghai Stock Exchange indices"),
    ("SZSE", "Shenzhen Stock Exchange indices"),
    ("CICC", "CICC indices"),
    ("SW", "Shenwan indices"),
    ("OTH", "other indices"),
];

/// Indices whose daily bars are always kept.
const DEFAULT_INDEX_POOL: &[&str] = &[
    "000001.SH", "000002.SH", "000003.SH", "000004.SH", "000005.SH", "000006.SH", "000007.SH",
    "000008.SH", "000009.SH", "000010.SH", "000011.SH", "000012.SH", "000013.SH", "000015.SH",
    "000016.SH", "399001.SZ", "399002.SZ", "399003.SZ", "399004.SZ", "399005.SZ", "399006.SZ",
    "399007.SZ", "399008.SZ", "399107.SZ", "399108.SZ", "399300.SZ",
];

pub static INDEX_BASIC: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::text("name"),
        Column::text("fullname"),
        Column::text("market"),
        Column::text("publisher"),
        Column::text("index_type"),
        Column::text("category"),
        Column::date("base_date"),
        Column::float("base_point"),
        Column::date("list_date"),
        Column::text("weight_rule"),
        Column::text("desc"),
        Column::date("exp_date"),
    ],
    temporal_key: "list_date",
};

pub struct IndexBasic {
    table: ReferenceTable,
}

impl IndexBasic {
    pub fn new(data_dir: &Path, clock: Arc<dyn Clock>) -> Self {
        let path = data_dir.join("index").join("index_basic.csv");
        Self {
            table: ReferenceTable::new("index_basic", path, &INDEX_BASIC, clock),
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

        let mut rows = Vec::new();
        for (market, description) in INDEX_MARKETS {
            let query = Query::new("index_basic")
                .param("market", *market)
                .fields(&INDEX_BASIC.header());
            let raw = provider.query_complete(&query)?;
            info!("index_basic: {} rows for {}", raw.len(), description);
            rows.extend(decode_rows(&INDEX_BASIC, &raw)?);
        }
        self.table.replace(rows)?;
        Ok(true)
    }

    /// Full name of the index, falling back to the short name when the provider left it empty.
    pub fn name_of_index(&self, code: &str) -> Result<String> {
        let fullname = INDEX_BASIC.position("fullname");
        let name = INDEX_BASIC.position("name");
        self.table
            .read(|table| {
                let row = table.find("ts_code", code)?;
                [fullname, name]
                    .into_iter()
                    .flatten()
                    .find_map(|idx| match &row[idx] {
                        Value::Text(text) if !text.is_empty() => Some(text.clone()),
                        _ => None,
                    })
            })
            .ok_or_else(|| SyncError::message(format!("unknown index code `{code}`")))
    }

    pub fn default_index_pool() -> Vec<SecurityCode> {
        DEFAULT_INDEX_POOL
            .iter()
            .filter_map(|code| match SecurityCode::parse(code) {
                Ok(code) => Some(code),
                Err(err) => {
                    warn!("skipping default index {}: {}", code, err);
                    None
                }
            })
            .collect()
    }
}
