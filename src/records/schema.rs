use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::code::SecurityCode;
use crate::error::{Result, SyncError};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Security identifier. Recognized shapes are normalized to canonical form,
    /// others kept verbatim.
    Code,
    Float,
    Int,
    Bool,
    Date,
    DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub const fn code(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Code)
    }

    pub const fn float(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Float)
    }

    pub const fn int(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Int)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Bool)
    }

    pub const fn date(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Date)
    }

    pub const fn datetime(name: &'static str) -> Self {
        Self::new(name, ColumnKind::DateTime)
    }
}

/// Declarative table layout: ordered columns plus the column used as sort key and resume cursor.
#[derive(Debug)]
pub struct Schema {
    pub columns: &'static [Column],
    pub temporal_key: &'static str,
}

impl Schema {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Index of the temporal key. A schema whose key is not one of its columns is a
    /// programming error.
    pub fn key_position(&self) -> usize {
        self.position(self.temporal_key).unwrap_or_else(|| {
            panic!(
                "temporal key `{}` missing from schema columns",
                self.temporal_key
            )
        })
    }

    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.name).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Float(f64),
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

pub type Record = Vec<Value>;

impl Value {
    /// Position on the time axis, used to order rows and derive the resume cursor.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(date) => date.and_hms_opt(0, 0, 0),
            Value::DateTime(datetime) => Some(*datetime),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        self.as_datetime().map(|datetime| datetime.date())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(text) => f.write_str(text),
            Value::Float(number) => write!(f, "{number}"),
            Value::Int(number) => write!(f, "{number}"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            Value::DateTime(datetime) => write!(f, "{}", datetime.format(DATETIME_FORMAT)),
        }
    }
}

/// Parse a textual cell into the column's kind. Empty text is a null cell.
pub fn parse_cell(column: &Column, raw: &str) -> Result<Value> {
    let text = raw.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") || text == "None" {
        return Ok(Value::Null);
    }

    let invalid = || {
        SyncError::message(format!(
            "column `{}` cannot parse `{}` as {:?}",
            column.name, text, column.kind
        ))
    };

    let value = match column.kind {
        ColumnKind::Text => Value::Text(text.to_string()),
        ColumnKind::Code => Value::Text(
            SecurityCode::parse(text)
                .map(|code| code.canonical())
                .unwrap_or_else(|_| text.to_string()),
        ),
        ColumnKind::Float => Value::Float(text.parse::<f64>().map_err(|_| invalid())?),
        ColumnKind::Int => match text.parse::<i64>() {
            Ok(number) => Value::Int(number),
            Err(_) => {
                let number = text.parse::<f64>().map_err(|_| invalid())?;
                if number.fract() != 0.0 {
                    return Err(invalid());
                }
                Value::Int(number as i64)
            }
        },
        ColumnKind::Bool => Value::Bool(parse_flag(text).ok_or_else(invalid)?),
        ColumnKind::Date => Value::Date(parse_date(text).ok_or_else(invalid)?),
        ColumnKind::DateTime => Value::DateTime(parse_datetime(text).ok_or_else(invalid)?),
    };
    Ok(value)
}

fn parse_flag(text: &str) -> Option<bool> {
    match text {
        "1" | "1.0" | "Y" => Some(true),
        "0" | "0.0" | "N" => Some(false),
        other if other.eq_ignore_ascii_case("true") => Some(true),
        other if other.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Calendar dates as providers send them: `YYYYMMDD`, `YYYY-MM-DD`, `YYYYMM` or a full timestamp.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    match text.len() {
        8 => NaiveDate::parse_from_str(text, "%Y%m%d").ok(),
        10 => NaiveDate::parse_from_str(text, DATE_FORMAT).ok(),
        6 => NaiveDate::parse_from_str(&format!("{text}01"), "%Y%m%d").ok(),
        19 => NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
            .ok()
            .map(|datetime| datetime.date()),
        _ => None,
    }
}

/// Timestamps: `YYYY-MM-DD HH:MM:SS`, `YYYYMMDDHHMMSS`, or the 17-digit form with trailing millis.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    match text.len() {
        19 => NaiveDateTime::parse_from_str(text, DATETIME_FORMAT).ok(),
        17 if text.bytes().all(|b| b.is_ascii_digit()) => {
            NaiveDateTime::parse_from_str(&text[..14], "%Y%m%d%H%M%S").ok()
        }
        14 => NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S").ok(),
        _ => parse_date(text).and_then(|date| date.and_hms_opt(0, 0, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ymd;

    #[test]
    fn parses_provider_date_shapes() {
        assert_eq!(parse_date("20240501"), Some(ymd(2024, 5, 1)));
        assert_eq!(parse_date("2024-05-01"), Some(ymd(2024, 5, 1)));
        assert_eq!(parse_date("202405"), Some(ymd(2024, 5, 1)));
        assert_eq!(parse_date("2024-05-01 09:35:00"), Some(ymd(2024, 5, 1)));
        assert_eq!(parse_date("May 1"), None);
    }

    #[test]
    fn parses_session_bar_timestamps() {
        let expected = ymd(2024, 1, 2).and_hms_opt(9, 35, 0).unwrap();
        assert_eq!(parse_datetime("20240102093500000"), Some(expected));
        assert_eq!(parse_datetime("2024-01-02 09:35:00"), Some(expected));
        assert_eq!(parse_datetime("20240102093500"), Some(expected));
    }

    #[test]
    fn parses_cells_by_kind() {
        assert_eq!(
            parse_cell(&Column::code("code"), "sz.000001").unwrap(),
            Value::Text("000001.SZ".into())
        );
        assert_eq!(
            parse_cell(&Column::code("ts_code"), "830799.BJ").unwrap(),
            Value::Text("830799.BJ".into())
        );
        assert_eq!(
            parse_cell(&Column::int("n"), "3.0").unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            parse_cell(&Column::boolean("is_open"), "1").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(parse_cell(&Column::float("x"), "").unwrap(), Value::Null);
        assert!(parse_cell(&Column::float("x"), "abc").is_err());
        assert!(parse_cell(&Column::int("n"), "2.5").is_err());
    }

    #[test]
    fn renders_cells_in_persisted_form() {
        assert_eq!(Value::Date(ymd(2024, 5, 1)).to_string(), "2024-05-01");
        assert_eq!(Value::Float(10.5).to_string(), "10.5");
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Null.to_string(), "");
        let stamp = ymd(2024, 1, 2).and_hms_opt(9, 35, 0).unwrap();
        assert_eq!(Value::DateTime(stamp).to_string(), "2024-01-02 09:35:00");
    }
}
