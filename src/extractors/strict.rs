// src/extractors/strict.rs
use crate::extractors::fixed_width::{candidate_blocks, slice_fields, TableLayout};
use crate::extractors::normalize::is_footer_row;
use crate::extractors::row::{RawRow, STRICT_COLUMN_ORDER};

/// Slices every row of every candidate table at the header marker offsets.
///
/// Columns are assigned by position only; a boundary that falls outside a row
/// leaves that column at its default.
pub fn extract(text: &str) -> Vec<RawRow> {
    let mut records = Vec::new();

    for block in candidate_blocks(text) {
        let Some(layout) = TableLayout::prepare(block, false) else {
            tracing::debug!("Strict: candidate table has no <C> header or no rows, skipping");
            continue;
        };

        for row in layout.rows.iter().filter(|r| !r.trim().is_empty()) {
            let entry = row_from_slices(slice_fields(row, &layout.boundaries));
            if is_footer_row(&entry) {
                tracing::trace!("Strict: dropping row without voting figures: {:?}", row.trim());
                continue;
            }
            records.push(entry);
        }
    }

    tracing::debug!("Strict fixed-width pass produced {} rows", records.len());
    records
}

fn row_from_slices(slices: Vec<Option<String>>) -> RawRow {
    let mut entry = RawRow::default();
    for (column, slice) in STRICT_COLUMN_ORDER.iter().zip(slices) {
        if let Some(value) = slice {
            entry.set(*column, value);
        }
    }
    entry
}
