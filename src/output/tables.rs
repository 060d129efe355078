use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::model::{PodStatus, Resources, RunStatus, StageStatus};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn color_coded_duration_cell(seconds: f64) -> Cell {
    let text = format_seconds(seconds);
    let minutes = seconds / 60.0;
    if minutes <= 10.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if minutes <= 15.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

/// Allocation against capacity, red once a node is nearly full.
pub fn color_coded_utilization_cell(used: Resources, capacity: Resources) -> Cell {
    let pct = utilization(used, capacity);
    let text = format!("{pct:.0}%");
    if pct >= 90.0 {
        Cell::new(text).fg(TableColor::Red)
    } else if pct >= 70.0 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Green)
    }
}

pub fn run_status_cell(status: RunStatus) -> Cell {
    let color = match status {
        RunStatus::Succeeded => TableColor::Green,
        RunStatus::Failed => TableColor::Red,
        RunStatus::Running => TableColor::Yellow,
        RunStatus::Pending => TableColor::DarkGrey,
    };
    Cell::new(status).fg(color)
}

pub fn stage_status_cell(status: StageStatus) -> Cell {
    let color = match status {
        StageStatus::Succeeded => TableColor::Green,
        StageStatus::Failed => TableColor::Red,
        StageStatus::Running => TableColor::Yellow,
        StageStatus::Pending => TableColor::DarkGrey,
    };
    Cell::new(status).fg(color)
}

pub fn pod_status_cell(status: PodStatus) -> Cell {
    let color = match status {
        PodStatus::Running => TableColor::Green,
        PodStatus::Pending => TableColor::Yellow,
        PodStatus::Crashloop => TableColor::Red,
    };
    Cell::new(status).fg(color)
}

/// Higher of CPU and memory utilisation, in percent.
#[allow(clippy::cast_precision_loss)]
pub fn utilization(used: Resources, capacity: Resources) -> f64 {
    let ratio = |used: u64, cap: u64| {
        if cap == 0 {
            0.0
        } else {
            used as f64 / cap as f64 * 100.0
        }
    };
    ratio(used.cpu, capacity.cpu).max(ratio(used.memory, capacity.memory))
}

pub fn format_seconds(seconds: f64) -> String {
    if seconds >= 60.0 {
        format!("{:.1}min", seconds / 60.0)
    } else {
        format!("{seconds:.0}s")
    }
}
