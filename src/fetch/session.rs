use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use log::info;
use serde_json::Value as Json;

use crate::code::SecurityCode;
use crate::error::{Result, SyncError};

use super::decode::value_to_string;
use super::{BulkProvider, Frequency, PoolKind, Query, RawTable, SessionProvider};

const DAILY_FIELDS: &[&str] = &[
    "ts_code",
    "trade_date",
    "open",
    "high",
    "low",
    "close",
    "pre_close",
    "vol",
    "amount",
    "pct_chg",
];

const DAILY_RENAMES: &[(&str, &str)] = &[
    ("ts_code", "code"),
    ("trade_date", "date"),
    ("pre_close", "preclose"),
    ("vol", "volume"),
    ("pct_chg", "pctChg"),
];

const MINUTE_FIELDS: &[&str] = &[
    "ts_code",
    "trade_time",
    "open",
    "high",
    "low",
    "close",
    "vol",
    "amount",
];

const MINUTE_RENAMES: &[(&str, &str)] = &[
    ("ts_code", "code"),
    ("trade_time", "time"),
    ("vol", "volume"),
];

const WEIGHT_FIELDS: &[&str] = &["index_code", "con_code", "trade_date", "weight"];

const WEIGHT_RENAMES: &[(&str, &str)] = &[("trade_date", "updateDate"), ("con_code", "code")];

const INDUSTRY_FIELDS: &[&str] = &["ts_code", "name", "industry"];

const INDUSTRY_RENAMES: &[(&str, &str)] = &[("ts_code", "code"), ("name", "code_name")];

/// Label stored in `industryClassification` for the listing endpoint's industry field.
const INDUSTRY_CLASSIFICATION: &str = "tushare stock_basic";

/// Weight snapshots are monthly; this look-back always covers the latest one.
const WEIGHT_LOOKBACK_DAYS: i64 = 45;

/// Session-style k-line and constituent provider backed by a bulk provider.
///
/// The bulk API is stateless, so login only gates usage: queries outside a session fail.
pub struct TushareSession {
    bulk: Arc<dyn BulkProvider>,
    active: AtomicBool,
}

impl TushareSession {
    pub fn new(bulk: Arc<dyn BulkProvider>) -> Self {
        Self {
            bulk,
            active: AtomicBool::new(false),
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::message("session provider queried outside login/logout"))
        }
    }
}

impl SessionProvider for TushareSession {
    fn login(&self) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        info!("session opened");
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("session closed");
        }
        Ok(())
    }

    fn query_k_data(
        &self,
        code: &SecurityCode,
        frequency: Frequency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable> {
        self.ensure_active()?;
        match frequency {
            Frequency::Daily => {
                let query = Query::new("daily")
                    .code(code)
                    .between(start, end)
                    .fields(DAILY_FIELDS);
                let mut raw = self.bulk.query(&query)?;
                raw.rename_fields(DAILY_RENAMES);
                Ok(raw)
            }
            Frequency::FiveMinutes => {
                let query = Query::new("stk_mins")
                    .code(code)
                    .param("freq", "5min")
                    .param("start_date", format!("{} 09:00:00", start.format("%Y-%m-%d")))
                    .param("end_date", format!("{} 19:00:00", end.format("%Y-%m-%d")))
                    .fields(MINUTE_FIELDS);
                let mut raw = self.bulk.query(&query)?;
                raw.rename_fields(MINUTE_RENAMES);
                let time_idx = raw.field_index("time");
                raw.push_field("date", |row| {
                    let stamp = time_idx
                        .and_then(|idx| row.get(idx))
                        .map(value_to_string)
                        .unwrap_or_default();
                    match stamp.get(..10) {
                        Some(day) => Json::String(day.to_string()),
                        None => Json::Null,
                    }
                });
                Ok(raw)
            }
        }
    }

    fn query_constituents(&self, pool: PoolKind, as_of: NaiveDate) -> Result<RawTable> {
        self.ensure_active()?;
        let query = Query::new("index_weight")
            .param("index_code", pool.index_code())
            .between(as_of - Duration::days(WEIGHT_LOOKBACK_DAYS), as_of)
            .fields(WEIGHT_FIELDS);
        let mut raw = self.bulk.query_complete(&query)?;

        if let Some(idx) = raw.field_index("trade_date") {
            let latest = raw
                .items
                .iter()
                .filter_map(|row| row.get(idx).map(value_to_string))
                .max();
            if let Some(latest) = latest {
                raw.retain(|row| row.get(idx).map(value_to_string).as_ref() == Some(&latest));
            }
        }
        raw.rename_fields(WEIGHT_RENAMES);
        Ok(raw)
    }

    fn query_stock_industry(&self, as_of: NaiveDate) -> Result<RawTable> {
        self.ensure_active()?;
        let query = Query::new("stock_basic")
            .param("list_status", "L")
            .fields(INDUSTRY_FIELDS);
        let mut raw = self.bulk.query_complete(&query)?;

        raw.rename_fields(INDUSTRY_RENAMES);
        let update_date = Json::from(as_of.format("%Y-%m-%d").to_string());
        raw.push_field("updateDate", |_| update_date.clone());
        raw.push_field("industryClassification", |_| Json::from(INDUSTRY_CLASSIFICATION));
        info!("stock_industry: {} listed securities as of {}", raw.len(), as_of);
        Ok(raw)
    }

    fn row_cap(&self, frequency: Frequency) -> Option<usize> {
        self.bulk.row_cap(match frequency {
            Frequency::Daily => "daily",
            Frequency::FiveMinutes => "stk_mins",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBulk;
    use crate::utils::ymd;
    use serde_json::json;

    fn session_over(bulk: ScriptedBulk) -> (Arc<ScriptedBulk>, TushareSession) {
        let bulk = Arc::new(bulk);
        let session = TushareSession::new(bulk.clone());
        (bulk, session)
    }

    #[test]
    fn refuses_queries_outside_a_session() {
        let (_, session) = session_over(ScriptedBulk::default());
        let code = SecurityCode::parse("600000.SH").unwrap();

        let err = session
            .query_k_data(&code, Frequency::Daily, ymd(2024, 1, 2), ymd(2024, 1, 5))
            .unwrap_err();
        assert!(err.to_string().contains("outside login"));
    }

    #[test]
    fn daily_bars_use_stored_column_names() {
        let bulk = ScriptedBulk::default().respond(
            "daily",
            RawTable {
                fields: DAILY_FIELDS.iter().map(|f| f.to_string()).collect(),
                items: vec![vec![
                    json!("600000.SH"),
                    json!("20240102"),
                    json!(7.1),
                    json!(7.2),
                    json!(7.0),
                    json!(7.15),
                    json!(7.05),
                    json!(120000.0),
                    json!(85000.5),
                    json!(1.42),
                ]],
                has_more: false,
            },
        );
        let (bulk, session) = session_over(bulk);
        let code = SecurityCode::parse("sh.600000").unwrap();

        session.login().unwrap();
        let raw = session
            .query_k_data(&code, Frequency::Daily, ymd(2024, 1, 2), ymd(2024, 1, 5))
            .unwrap();
        session.logout().unwrap();

        assert_eq!(
            raw.fields,
            vec![
                "code", "date", "open", "high", "low", "close", "preclose", "volume", "amount",
                "pctChg"
            ]
        );
        let calls = bulk.calls();
        assert_eq!(calls[0].params["ts_code"], "600000.SH");
        assert_eq!(calls[0].params["start_date"], "20240102");
    }

    #[test]
    fn intraday_bars_gain_a_date_column() {
        let bulk = ScriptedBulk::default().respond(
            "stk_mins",
            RawTable {
                fields: MINUTE_FIELDS.iter().map(|f| f.to_string()).collect(),
                items: vec![vec![
                    json!("000001.SZ"),
                    json!("2024-01-02 09:35:00"),
                    json!(9.4),
                    json!(9.45),
                    json!(9.39),
                    json!(9.42),
                    json!(53000),
                    json!(499_000.0),
                ]],
                has_more: false,
            },
        );
        let (bulk, session) = session_over(bulk);
        let code = SecurityCode::parse("000001.SZ").unwrap();

        session.login().unwrap();
        let raw = session
            .query_k_data(&code, Frequency::FiveMinutes, ymd(2024, 1, 2), ymd(2024, 1, 2))
            .unwrap();

        assert_eq!(raw.field_index("time"), Some(1));
        let date_idx = raw.field_index("date").unwrap();
        assert_eq!(raw.items[0][date_idx], json!("2024-01-02"));
        assert_eq!(bulk.calls()[0].params["freq"], "5min");
        assert_eq!(bulk.calls()[0].params["end_date"], "2024-01-02 19:00:00");
    }

    #[test]
    fn constituents_keep_only_latest_snapshot() {
        let bulk = ScriptedBulk::default().respond(
            "index_weight",
            RawTable {
                fields: WEIGHT_FIELDS.iter().map(|f| f.to_string()).collect(),
                items: vec![
                    vec![json!("399300.SZ"), json!("600000.SH"), json!("20240329"), json!(0.5)],
                    vec![json!("399300.SZ"), json!("600519.SH"), json!("20240430"), json!(4.9)],
                    vec![json!("399300.SZ"), json!("000001.SZ"), json!("20240430"), json!(0.9)],
                ],
                has_more: false,
            },
        );
        let (_, session) = session_over(bulk);

        session.login().unwrap();
        let raw = session
            .query_constituents(PoolKind::Hs300, ymd(2024, 5, 6))
            .unwrap();

        assert_eq!(raw.len(), 2);
        assert_eq!(raw.field_index("updateDate"), Some(2));
        assert_eq!(raw.field_index("code"), Some(1));
    }

    #[test]
    fn row_caps_follow_the_backing_endpoint() {
        let (_, session) = session_over(ScriptedBulk::default().row_cap("stk_mins", 8000));

        assert_eq!(session.row_cap(Frequency::FiveMinutes), Some(8000));
        assert_eq!(session.row_cap(Frequency::Daily), None);
    }


    #[test]
    fn capped_constituent_window_is_an_error() {
        let bulk = ScriptedBulk::default()
            .respond(
                "index_weight",
                RawTable {
                    fields: WEIGHT_FIELDS.iter().map(|f| f.to_string()).collect(),
                    items: vec![
                        vec![json!("000905.SH"), json!("600000.SH"), json!("20240430"), json!(0.2)],
                        vec![json!("000905.SH"), json!("000001.SZ"), json!("20240430"), json!(0.3)],
                    ],
                    has_more: false,
                },
            )
            .row_cap("index_weight", 2);
        let (_, session) = session_over(bulk);

        session.login().unwrap();
        let err = session
            .query_constituents(PoolKind::Zz500, ymd(2024, 5, 6))
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::CapacityExceeded { ref dataset, rows: 2, .. } if dataset == "index_weight"
        ));
    }


    #[test]
    fn industry_rows_carry_the_as_of_date() {
        let bulk = ScriptedBulk::default().respond(
            "stock_basic",
            RawTable {
                fields: INDUSTRY_FIELDS.iter().map(|f| f.to_string()).collect(),
                items: vec![
                    vec![json!("600000.SH"), json!("浦发银行"), json!("银行")],
                    vec![json!("600519.SH"), json!("贵州茅台"), json!("白酒")],
                ],
                has_more: false,
            },
        );
        let (bulk, session) = session_over(bulk);

        assert!(session.query_stock_industry(ymd(2024, 5, 6)).is_err());
        session.login().unwrap();
        let raw = session.query_stock_industry(ymd(2024, 5, 6)).unwrap();

        assert_eq!(
            raw.fields,
            vec!["code", "code_name", "industry", "updateDate", "industryClassification"]
        );
        assert_eq!(raw.items[1][2], json!("白酒"));
        assert_eq!(raw.items[1][3], json!("2024-05-06"));
        assert_eq!(bulk.calls_to("stock_basic")[0].params["list_status"], "L");
    }
}
