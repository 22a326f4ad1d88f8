use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::code::SecurityCode;
use crate::error::Result;
use crate::fetch::decode::value_to_string;
use crate::fetch::{decode_rows, BulkProvider, Query};
use crate::records::{Column, Schema, Value};
use crate::utils::Clock;

use super::ReferenceTable;

pub static CONCEPT_DETAIL: Schema = Schema {
    columns: &[
        Column::text("id"),
        Column::text("concept_name"),
        Column::code("ts_code"),
        Column::text("name"),
        Column::date("in_date"),
        Column::date("out_date"),
    ],
    temporal_key: "in_date",
};

/// Concept boards and their member securities, at `market/concept_detail.csv`.
pub struct ConceptDetail {
    table: ReferenceTable,
}

impl ConceptDetail {
    pub fn new(data_dir: &Path, clock: Arc<dyn Clock>) -> Self {
        let path = data_dir.join("market").join("concept_detail.csv");
        Self {
            table: ReferenceTable::new("concept_detail", path, &CONCEPT_DETAIL, clock),
        }
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn load(&self) -> Result<()> {
        self.table.load()
    }

    /// List the concept boards, then fetch the members of each one.
    pub fn update(&self, provider: &dyn BulkProvider) -> Result<bool> {
        if !self.table.should_update()? {
            return Ok(false);
        }

        let concepts = provider.query_complete(
            &Query::new("concept")
                .param("src", "ts")
                .fields(&["code", "name"]),
        )?;
        let name_idx = concepts.field_index("name");
        let Some(code_idx) = concepts.field_index("code") else {
            info!("concept: provider returned no concept list");
            return Ok(false);
        };

        let mut rows = Vec::new();
        for item in &concepts.items {
            let Some(id) = item.get(code_idx).map(value_to_string) else {
                continue;
            };
            let raw = provider.query_complete(
                &Query::new("concept_detail")
                    .param("id", id.clone())
                    .fields(&CONCEPT_DETAIL.header()),
            )?;
            let name = name_idx
                .and_then(|idx| item.get(idx))
                .map(value_to_string)
                .unwrap_or_default();
            info!("concept_detail: {} members in {} ({})", raw.len(), name, id);
            rows.extend(decode_rows(&CONCEPT_DETAIL, &raw)?);
        }

        self.table.replace(rows)?;
        Ok(true)
    }

    /// Names of every concept board `code` belongs to.
    pub fn concepts_of(&self, code: &SecurityCode) -> Vec<String> {
        let (Some(code_idx), Some(name_idx)) = (
            CONCEPT_DETAIL.position("ts_code"),
            CONCEPT_DETAIL.position("concept_name"),
        ) else {
            return Vec::new();
        };
        let canonical = code.canonical();
        self.table.read(|table| {
            table
                .rows()
                .iter()
                .filter(|row| row[code_idx].as_str() == Some(canonical.as_str()))
                .filter_map(|row| match &row[name_idx] {
                    Value::Text(name) => Some(name.clone()),
                    _ => None,
                })
                .collect()
        })
    }
}
