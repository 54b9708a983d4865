// src/utils/table_debug.rs
use crate::extractors::cascade::Cascade;
use crate::extractors::fixed_width::{candidate_blocks, slice_fields, TableLayout};
use crate::extractors::markup::find_information_table;
use crate::utils::error::AppError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Renders what the deterministic strategies see: which one matches, then
/// each candidate table with a ruler under its header marking the column
/// boundaries and every kept row with its slices.
pub fn render_table_debug(text: &str) -> String {
    let mut out = String::new();

    match find_information_table(text) {
        Some(block) => out.push_str(&format!("XML informationTable block: {} bytes\n\n", block.len())),
        None => out.push_str("XML informationTable block: none\n\n"),
    }

    match Cascade::run_deterministic(text) {
        Some((strategy, rows)) => out.push_str(&format!("Deterministic match: {:?}, {} raw rows\n\n", strategy, rows.len())),
        None => out.push_str("Deterministic match: none\n\n"),
    }

    let blocks = candidate_blocks(text);
    out.push_str(&format!("Candidate <TABLE> blocks: {}\n", blocks.len()));

    for (n, block) in blocks.iter().enumerate() {
        out.push_str(&format!("\n=== table {} ===\n", n + 1));

        let Some(layout) = TableLayout::prepare(block, false) else {
            out.push_str("(no <C> header line or no data rows)\n");
            continue;
        };

        out.push_str(&layout.header);
        out.push('\n');
        out.push_str(&ruler(layout.boundaries.offsets()));
        out.push('\n');
        out.push_str(&format!(
            "offsets {:?}, width {}, {} rows kept\n",
            layout.boundaries.offsets(),
            layout.width,
            layout.rows.len()
        ));

        for row in &layout.rows {
            out.push_str(row.trim_end());
            out.push('\n');
            let slices = slice_fields(row, &layout.boundaries)
                .into_iter()
                .map(|s| s.map_or_else(|| "<out of range>".to_string(), |v| format!("{:?}", v)))
                .collect::<Vec<_>>();
            out.push_str(&format!("    -> [{}]\n", slices.join(", ")));
        }
    }

    out
}

/// `^` under each boundary offset.
fn ruler(offsets: &[usize]) -> String {
    let Some(&last) = offsets.last() else {
        return String::new();
    };
    let mut line = vec![' '; last + 1];
    for &offset in offsets {
        line[offset] = '^';
    }
    line.into_iter().collect()
}

/// Writes the table dump next to the other debug artifacts of a filing.
pub fn save_table_debug(text: &str, filename: &Path) -> Result<(), AppError> {
    let mut file = File::create(filename)?;
    file.write_all(render_table_debug(text).as_bytes())?;

    tracing::info!("Saved table debug dump to {}", filename.display());
    Ok(())
}
