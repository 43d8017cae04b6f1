//! One-shot output: plain text table or JSON.

use anyhow::Result;
use chrono::{DateTime, Utc};
use gpuwatch_common::render::{build_rows, DisplayRow, COLUMNS};
use gpuwatch_common::StoreSnapshot;

fn cells(row: &DisplayRow) -> [&str; 5] {
    [
        row.host.as_str(),
        row.gpu.as_str(),
        row.utilization.as_str(),
        row.memory.as_str(),
        row.status.as_ref().map(|s| s.text.as_str()).unwrap_or(""),
    ]
}

/// Column-aligned table, header first.
pub fn plain_table(snapshot: &StoreSnapshot, now: DateTime<Utc>) -> String {
    let rows = build_rows(snapshot, now);

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(cells(row)) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    out.push_str(&format_line(COLUMNS, &widths));
    out.push('\n');
    for row in &rows {
        out.push_str(&format_line(cells(row), &widths));
        out.push('\n');
    }
    out
}

fn format_line(values: [&str; 5], widths: &[usize; 5]) -> String {
    let padded: Vec<String> = values
        .iter()
        .zip(widths.iter())
        .map(|(value, width)| format!("{:<width$}", value, width = *width))
        .collect();
    padded.join("  ").trim_end().to_string()
}

pub fn json(snapshot: &StoreSnapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(&snapshot.to_report())?)
}
