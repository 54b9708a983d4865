// src/extractors/fixed_width.rs
//! Table discovery and column geometry for legacy SGML `<TABLE>` filings.
//!
//! Pre-2013 13F filings carry the holdings as a fixed-width text table
//! wrapped in `<TABLE>` tags. A header line holds `<S>`/`<C>` markers whose
//! character offsets are the only reliable hint about where columns start.

use once_cell::sync::Lazy;
use regex::Regex;

static TABLE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<table>(.*?)</table>").expect("Failed to compile TABLE_BLOCK_RE")
});

/// Rows shorter than this fraction of the widest row are separators or notes.
const MIN_ROW_FILL: f64 = 0.3;

/// Gap appended to every row before slicing so the last column has whitespace to land on.
const ROW_TAIL_PADDING: usize = 5;

/// Bodies of all `<TABLE>...</TABLE>` blocks, in document order.
pub fn table_blocks(text: &str) -> Vec<&str> {
    TABLE_BLOCK_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Table blocks that look like an information table (mention "issuer").
pub fn candidate_blocks(text: &str) -> Vec<&str> {
    table_blocks(text)
        .into_iter()
        .filter(|block| block.to_lowercase().contains("issuer"))
        .collect()
}

/// Character offsets of the column markers in a table header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryMap {
    offsets: Vec<usize>,
}

impl BoundaryMap {
    /// Every `<` in the header starts a column (`<S>` and `<C>` alike).
    pub fn from_header(header: &str) -> Self {
        let offsets = header
            .chars()
            .enumerate()
            .filter(|(_, c)| *c == '<')
            .map(|(i, _)| i)
            .collect();
        Self { offsets }
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// A candidate table block split into its marker header and data rows.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub header: String,
    pub boundaries: BoundaryMap,
    /// Data rows below the header, noise-filtered and right-padded to `width`.
    pub rows: Vec<String>,
    pub width: usize,
}

impl TableLayout {
    /// Returns `None` when the block has no `<C>` header line or nothing below it.
    ///
    /// With `synthetic_trailing_marker` an extra `<C>` is appended to the
    /// header, for tables whose last column carries no marker.
    pub fn prepare(block: &str, synthetic_trailing_marker: bool) -> Option<Self> {
        let lines: Vec<&str> = block.trim_matches('\n').lines().collect();

        let header_index = lines
            .iter()
            .position(|line| line.to_lowercase().contains("<c>"))?;

        let mut header = lines[header_index].to_string();
        if synthetic_trailing_marker {
            header.push_str("  <C>");
        }

        let data_lines = &lines[header_index + 1..];
        let width = data_lines.iter().map(|l| l.chars().count()).max()?;

        let threshold = width as f64 * MIN_ROW_FILL;
        let rows = data_lines
            .iter()
            .filter(|line| line.trim().chars().count() as f64 >= threshold)
            .map(|line| {
                let mut row = line.to_string();
                let pad = width - line.chars().count();
                row.extend(std::iter::repeat(' ').take(pad));
                row
            })
            .collect::<Vec<_>>();

        tracing::trace!(
            "Table layout: header at line {}, {} markers, {}/{} rows kept (width {})",
            header_index,
            header.matches('<').count(),
            rows.len(),
            data_lines.len(),
            width
        );

        let boundaries = BoundaryMap::from_header(&header);
        if boundaries.is_empty() {
            return None;
        }

        Some(Self {
            boundaries,
            header,
            rows,
            width,
        })
    }
}

/// Cuts one row into one slice per boundary.
///
/// A column's left edge moves left until it sits at a token start, so a
/// value printed a little before its marker is kept whole. The right edge
/// moves left from the next marker until it sits on whitespace, so the next
/// column's first token is not captured. The last column runs to end of
/// line. `None` marks a boundary that falls outside the row.
pub fn slice_fields(row: &str, boundaries: &BoundaryMap) -> Vec<Option<String>> {
    let mut chars: Vec<char> = row.chars().collect();
    chars.extend(std::iter::repeat(' ').take(ROW_TAIL_PADDING));

    let offsets = boundaries.offsets();
    (0..offsets.len())
        .map(|i| slice_column(&chars, offsets, i))
        .collect()
}

fn slice_column(chars: &[char], offsets: &[usize], i: usize) -> Option<String> {
    let mut left = offsets[i];
    if left > 0 && !chars.get(left)?.is_whitespace() {
        while left > 0 && !chars[left - 1].is_whitespace() {
            left -= 1;
        }
    }

    let right = match offsets.get(i + 1) {
        Some(&next) => {
            let mut right = next;
            while right > left && !chars.get(right)?.is_whitespace() {
                right -= 1;
            }
            right
        }
        None => chars.len(),
    };

    let right = right.min(chars.len());
    if left >= right {
        return Some(String::new());
    }
    Some(chars[left..right].iter().collect::<String>().trim().to_string())
}
