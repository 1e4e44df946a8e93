use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::records::Conclusion;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn color_coded_minutes_cell(minutes: f64) -> Cell {
    let text = format!("{minutes:.2}min");
    if minutes <= 10.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if minutes <= 30.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn conclusion_cell(conclusion: Option<Conclusion>) -> Cell {
    match conclusion {
        Some(Conclusion::Success) => Cell::new("success").fg(TableColor::Green),
        Some(Conclusion::Failure) => Cell::new("failure").fg(TableColor::Red),
        Some(other) => Cell::new(other.as_str()).fg(TableColor::Yellow),
        None => Cell::new("in progress").fg(TableColor::DarkGrey),
    }
}
