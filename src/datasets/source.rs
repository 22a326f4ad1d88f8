use std::sync::Arc;

use crate::code::SecurityCode;
use crate::error::{Result, SyncError};
use crate::fetch::{decode_rows, BulkProvider, Frequency, Query, SessionProvider};
use crate::records::Schema;
use crate::store::{FetchRange, Page, RecordSource};

/// Dataset rows served by one bulk-provider endpoint, optionally scoped to a security.
pub struct BulkSource {
    provider: Arc<dyn BulkProvider>,
    api: &'static str,
    schema: &'static Schema,
    code: Option<SecurityCode>,
}

impl BulkSource {
    pub fn new(
        provider: Arc<dyn BulkProvider>,
        api: &'static str,
        schema: &'static Schema,
        code: Option<SecurityCode>,
    ) -> Self {
        Self {
            provider,
            api,
            schema,
            code,
        }
    }
}

impl RecordSource for BulkSource {
    fn fetch(&self, range: FetchRange) -> Result<Page> {
        let mut query = Query::new(self.api).fields(&self.schema.header());
        if let Some(code) = &self.code {
            query = query.code(code);
        }
        query = match range {
            FetchRange::Between(start, end) => query.between(start, end),
            FetchRange::Day(day) => query.date("trade_date", day),
            FetchRange::Snapshot => query,
        };

        let raw = self.provider.query(&query)?;
        Ok(Page {
            records: decode_rows(self.schema, &raw)?,
            row_cap: self.provider.row_cap(self.api),
            has_more: raw.has_more,
        })
    }
}

/// K-line bars from the session provider.
pub struct KlineSource {
    session: Arc<dyn SessionProvider>,
    code: SecurityCode,
    frequency: Frequency,
    schema: &'static Schema,
}

impl KlineSource {
    pub fn new(
        session: Arc<dyn SessionProvider>,
        code: SecurityCode,
        frequency: Frequency,
        schema: &'static Schema,
    ) -> Self {
        Self {
            session,
            code,
            frequency,
            schema,
        }
    }
}

impl RecordSource for KlineSource {
    fn fetch(&self, range: FetchRange) -> Result<Page> {
        let (start, end) = match range {
            FetchRange::Between(start, end) => (start, end),
            FetchRange::Day(day) => (day, day),
            FetchRange::Snapshot => {
                return Err(SyncError::message(format!(
                    "k-line data for {} needs a date range",
                    self.code
                )))
            }
        };
        let raw = self
            .session
            .query_k_data(&self.code, self.frequency, start, end)?;
        Ok(Page {
            records: decode_rows(self.schema, &raw)?,
            row_cap: self.session.row_cap(self.frequency),
            has_more: raw.has_more,
        })
    }
}
