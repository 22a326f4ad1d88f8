use chrono::NaiveDate;
use thiserror::Error;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error("{0} accessed before StockData::setup(data_dir) was called")]
    NotConfigured(&'static str),
    #[error("invalid security code `{0}`")]
    InvalidCode(String),
    #[error("trading calendar has no entry for {0}; run the calendar update first")]
    StaleCalendar(NaiveDate),
    #[error(
        "{dataset}: {window} returned {rows} rows, hitting the provider row cap; \
         narrow the request (shrink step_days for windowed datasets)"
    )]
    CapacityExceeded {
        dataset: String,
        window: String,
        rows: usize,
    },
    #[error("provider call `{api}` failed with code {code}: {message}")]
    Provider {
        api: String,
        code: i64,
        message: String,
    },
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        SyncError::Message(msg.into())
    }
}
