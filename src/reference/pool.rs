use std::path::Path;
use std::sync::Arc;

use log::warn;

use crate::code::SecurityCode;
use crate::error::Result;
use crate::fetch::{decode_rows, PoolKind, SessionProvider};
use crate::records::{Column, Schema, Value};
use crate::utils::Clock;

use super::ReferenceTable;

pub static CONSTITUENTS: Schema = Schema {
    columns: &[
        Column::date("updateDate"),
        Column::code("code"),
        Column::text("code_name"),
    ],
    temporal_key: "updateDate",
};

/// Members of one tracked index, kept at `stock_pool/{pool}.csv`.
pub struct ConstituentPool {
    kind: PoolKind,
    clock: Arc<dyn Clock>,
    table: ReferenceTable,
}

impl ConstituentPool {
    pub fn new(data_dir: &Path, kind: PoolKind, clock: Arc<dyn Clock>) -> Self {
        let path = data_dir
            .join("stock_pool")
            .join(format!("{}.csv", kind.name()));
        Self {
            kind,
            table: ReferenceTable::new(kind.name(), path, &CONSTITUENTS, clock.clone()),
            clock,
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn load(&self) -> Result<()> {
        self.table.load()
    }

    /// Refresh the member list through an open session.
    pub fn update(&self, session: &dyn SessionProvider) -> Result<bool> {
        if !self.table.should_update()? {
            return Ok(false);
        }
        let raw = session.query_constituents(self.kind, self.clock.today())?;
        raw.ensure_complete(self.kind.name(), "constituent list", None)?;
        self.table.replace(decode_rows(&CONSTITUENTS, &raw)?)?;
        Ok(true)
    }

    pub fn stock_codes(&self) -> Vec<SecurityCode> {
        self.table.read(|table| {
            let Some(column) = table.column("code") else {
                return Vec::new();
            };
            column
                .filter_map(|value| match value {
                    Value::Text(raw) => match SecurityCode::parse(raw) {
                        Ok(code) => Some(code),
                        Err(err) => {
                            warn!("{}: skipping member: {}", self.kind.name(), err);
                            None
                        }
                    },
                    _ => None,
                })
                .collect()
        })
    }
}
