pub mod app;
pub mod calendar;
pub mod code;
pub mod config;
pub mod datasets;
pub mod error;
pub mod fetch;
pub mod records;
pub mod reference;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;

pub use app::{StockData, SyncReport, Synchronizer};
pub use error::{Result, SyncError};
