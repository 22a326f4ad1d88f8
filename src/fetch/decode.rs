use serde_json::Value as Json;

use crate::error::{Context, Result};
use crate::records::{parse_cell, Record, Schema, Value};

use super::RawTable;

pub fn value_to_string(value: &Json) -> String {
    match value {
        Json::String(s) => s.trim().to_string(),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

/// Map provider rows onto `schema` by field name. Columns the provider did not send stay null.
pub fn decode_rows(schema: &Schema, raw: &RawTable) -> Result<Vec<Record>> {
    let positions: Vec<Option<usize>> = schema
        .columns
        .iter()
        .map(|column| raw.field_index(column.name))
        .collect();

    let mut records = Vec::with_capacity(raw.items.len());
    for (row_no, item) in raw.items.iter().enumerate() {
        let mut record = Vec::with_capacity(schema.columns.len());
        for (column, position) in schema.columns.iter().zip(&positions) {
            let cell = match position.and_then(|idx| item.get(idx)) {
                Some(json) => parse_cell(column, &value_to_string(json)).with_context(|| {
                    format!("row {row_no}: bad `{}` value {json}", column.name)
                })?,
                None => Value::Null,
            };
            record.push(cell);
        }
        records.push(record);
    }
    Ok(records)
}
