pub mod file;
pub mod time;

pub use file::{ensure_parent_dir, modified_date, write_atomically};
pub use time::{compact_date, ymd, Clock, FixedClock, SystemClock};
