use std::path::Path;
use std::sync::Arc;

use crate::code::SecurityCode;
use crate::error::Result;
use crate::fetch::{decode_rows, SessionProvider};
use crate::records::{Column, Schema, Value};
use crate::utils::Clock;

use super::ReferenceTable;

pub static STOCK_INDUSTRY: Schema = Schema {
    columns: &[
        Column::date("updateDate"),
        Column::code("code"),
        Column::text("code_name"),
        Column::text("industry"),
        Column::text("industryClassification"),
    ],
    temporal_key: "updateDate",
};

/// Industry classification of listed securities, at `market/stock_industry.csv`.
pub struct StockIndustry {
    clock: Arc<dyn Clock>,
    table: ReferenceTable,
}

impl StockIndustry {
    pub fn new(data_dir: &Path, clock: Arc<dyn Clock>) -> Self {
        let path = data_dir.join("market").join("stock_industry.csv");
        Self {
            table: ReferenceTable::new("stock_industry", path, &STOCK_INDUSTRY, clock.clone()),
            clock,
        }
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn load(&self) -> Result<()> {
        self.table.load()
    }

    /// Refresh the classification through an open session.
    pub fn update(&self, session: &dyn SessionProvider) -> Result<bool> {
        if !self.table.should_update()? {
            return Ok(false);
        }
        let raw = session.query_stock_industry(self.clock.today())?;
        raw.ensure_complete("stock_industry", "industry list", None)?;
        self.table.replace(decode_rows(&STOCK_INDUSTRY, &raw)?)?;
        Ok(true)
    }

    /// Industry `code` is classified under, if it has one.
    pub fn industry_of(&self, code: &SecurityCode) -> Option<String> {
        let idx = STOCK_INDUSTRY.position("industry")?;
        self.table.read(|table| {
            let row = table.find("code", &code.canonical())?;
            match &row[idx] {
                Value::Text(industry) if !industry.is_empty() => Some(industry.clone()),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::fetch::RawTable;
    use crate::testing::ScriptedSession;
    use crate::utils::{ymd, FixedClock};
    use serde_json::json;

    #[test]
    fn stores_industry_by_code() {
        let dir = tempfile::tempdir().unwrap();
        let session = ScriptedSession::default()
            .industries(&[("sh.600000", "银行"), ("sz.000858", "白酒"), ("sz.000001", "")]);
        let industry = StockIndustry::new(dir.path(), Arc::new(FixedClock(ymd(2024, 5, 6))));

        assert!(industry.update(&session).unwrap());
        assert!(dir.path().join("market").join("stock_industry.csv").exists());
        assert!(!industry.update(&session).unwrap());

        let code = SecurityCode::parse("600000.SH").unwrap();
        assert_eq!(industry.industry_of(&code).as_deref(), Some("银行"));
        let unclassified = SecurityCode::parse("000001.SZ").unwrap();
        assert_eq!(industry.industry_of(&unclassified), None);
        let unknown = SecurityCode::parse("600519.SH").unwrap();
        assert_eq!(industry.industry_of(&unknown), None);
    }

    #[test]
    fn reloads_the_written_table() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock(ymd(2024, 5, 6)));
        let session = ScriptedSession::default().industries(&[("sz.000858", "白酒")]);
        StockIndustry::new(dir.path(), clock.clone())
            .update(&session)
            .unwrap();

        let reloaded = StockIndustry::new(dir.path(), clock);
        reloaded.load().unwrap();

        assert_eq!(reloaded.table().len(), 1);
        let code = SecurityCode::parse("000858.SZ").unwrap();
        assert_eq!(reloaded.industry_of(&code).as_deref(), Some("白酒"));
    }

    #[test]
    fn partial_industry_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = ScriptedSession::default().industry_table(RawTable {
            fields: vec!["updateDate".into(), "code".into(), "industry".into()],
            items: vec![vec![json!("2024-05-06"), json!("sh.600000"), json!("银行")]],
            has_more: true,
        });
        let industry = StockIndustry::new(dir.path(), Arc::new(FixedClock(ymd(2024, 5, 6))));

        let err = industry.update(&session).unwrap_err();

        assert!(matches!(
            err,
            SyncError::CapacityExceeded { ref dataset, .. } if dataset == "stock_industry"
        ));
        assert!(!industry.table().file_path().exists());
    }
}
