use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::aggregation::Coverage;
use crate::status::Status;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn status_cell(status: Status) -> Cell {
    let color = match status {
        Status::Success => TableColor::Green,
        Status::Failed => TableColor::Red,
        status if status.is_active() => TableColor::Yellow,
        _ => TableColor::DarkGrey,
    };
    Cell::new(status).fg(color)
}

#[allow(clippy::cast_precision_loss)]
pub fn color_coded_duration_cell(seconds: Option<i64>) -> Cell {
    let Some(seconds) = seconds else {
        return Cell::new("-").fg(TableColor::DarkGrey);
    };
    let minutes = seconds as f64 / 60.0;
    let text = format!("{minutes:.1}min");
    if minutes <= 10.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if minutes <= 15.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn color_coded_coverage_cell(coverage: Option<Coverage>) -> Cell {
    let Some(coverage) = coverage else {
        return Cell::new("-").fg(TableColor::DarkGrey);
    };
    let text = format!("{coverage}%");
    let rate = coverage.as_f64();
    if rate >= 80.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if rate >= 50.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn flag_cell(flag: bool, warn_color: TableColor) -> Cell {
    if flag {
        Cell::new("yes").fg(warn_color)
    } else {
        Cell::new("no").fg(TableColor::DarkGrey)
    }
}
