//! Layouts of the index and market-wide tables.

use crate::records::{Column, Schema};

pub static INDEX_DAILY: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::date("trade_date"),
        Column::float("close"),
        Column::float("open"),
        Column::float("high"),
        Column::float("low"),
        Column::float("pre_close"),
        Column::float("change"),
        Column::float("pct_chg"),
        Column::float("vol"),
        Column::float("amount"),
    ],
    temporal_key: "trade_date",
};

pub static MARGIN: Schema = Schema {
    columns: &[
        Column::date("trade_date"),
        Column::text("exchange_id"),
        Column::float("rzye"),
        Column::float("rzmre"),
        Column::float("rzche"),
        Column::float("rqye"),
        Column::float("rqmcl"),
        Column::float("rzrqye"),
        Column::float("rqyl"),
    ],
    temporal_key: "trade_date",
};

pub static BLOCK_TRADE: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::date("trade_date"),
        Column::float("price"),
        Column::float("vol"),
        Column::float("amount"),
        Column::text("buyer"),
        Column::text("seller"),
    ],
    temporal_key: "trade_date",
};

pub static TOP_INST: Schema = Schema {
    columns: &[
        Column::date("trade_date"),
        Column::code("ts_code"),
        Column::text("exalter"),
        Column::text("side"),
        Column::float("buy"),
        Column::float("buy_rate"),
        Column::float("sell"),
        Column::float("sell_rate"),
        Column::float("net_buy"),
        Column::text("reason"),
    ],
    temporal_key: "trade_date",
};
