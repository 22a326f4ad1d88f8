//! Declarative dataset schemas and the on-disk table they describe.

pub mod schema;
pub mod table;

pub use schema::{parse_cell, Column, ColumnKind, Record, Schema, Value};
pub use table::Table;
