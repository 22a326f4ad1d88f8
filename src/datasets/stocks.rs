//! Layouts of the per-security tables under `stocks/{code}/`.

use crate::records::{Column, Schema};

pub static DAILY: Schema = Schema {
    columns: &[
        Column::date("date"),
        Column::code("code"),
        Column::float("open"),
        Column::float("high"),
        Column::float("low"),
        Column::float("close"),
        Column::float("preclose"),
        Column::float("volume"),
        Column::float("amount"),
        Column::float("pctChg"),
    ],
    temporal_key: "date",
};

pub static FIVE_MINUTE: Schema = Schema {
    columns: &[
        Column::date("date"),
        Column::datetime("time"),
        Column::code("code"),
        Column::float("open"),
        Column::float("high"),
        Column::float("low"),
        Column::float("close"),
        Column::float("volume"),
        Column::float("amount"),
    ],
    temporal_key: "time",
};

pub static ADJ_FACTOR: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::date("trade_date"),
        Column::float("adj_factor"),
    ],
    temporal_key: "trade_date",
};

pub static TOP10_HOLDERS: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::date("ann_date"),
        Column::date("end_date"),
        Column::text("holder_name"),
        Column::float("hold_amount"),
        Column::float("hold_ratio"),
    ],
    temporal_key: "end_date",
};

pub static STK_HOLDER_TRADE: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::date("ann_date"),
        Column::text("holder_name"),
        Column::text("holder_type"),
        Column::text("in_de"),
        Column::float("change_vol"),
        Column::float("change_ratio"),
        Column::float("after_share"),
        Column::float("after_ratio"),
        Column::float("avg_price"),
        Column::float("total_share"),
        Column::date("begin_date"),
        Column::date("close_date"),
    ],
    temporal_key: "ann_date",
};

pub static PLEDGE_STAT: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::date("end_date"),
        Column::int("pledge_count"),
        Column::float("unrest_pledge"),
        Column::float("rest_pledge"),
        Column::float("total_share"),
        Column::float("pledge_ratio"),
    ],
    temporal_key: "end_date",
};

pub static PLEDGE_DETAIL: Schema = Schema {
    columns: &[
        Column::code("ts_code"),
        Column::date("ann_date"),
        Column::text("holder_name"),
        Column::float("pledge_amount"),
        Column::date("start_date"),
        Column::date("end_date"),
        Column::text("is_release"),
        Column::date("release_date"),
        Column::text("pledgor"),
        Column::float("holding_amount"),
        Column::float("pledged_amount"),
        Column::float("p_total_ratio"),
        Column::float("h_total_ratio"),
        Column::text("is_buyback"),
    ],
    temporal_key: "end_date",
};
