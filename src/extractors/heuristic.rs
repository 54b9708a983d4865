// src/extractors/heuristic.rs
//! Token-level recovery for fixed-width tables whose markers don't line up
//! with the data.
//!
//! Instead of slicing at marker offsets, each row is decomposed by shape:
//! issuer, class and CUSIP are separated by runs of two or more spaces; the
//! first two numbers after the CUSIP are value and amount; the trailing
//! numbers are the voting columns; the words in between are classified by
//! vocabulary.

use crate::extractors::fixed_width::{candidate_blocks, TableLayout};
use crate::extractors::normalize::is_footer_row;
use crate::extractors::row::RawRow;
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;

static ROW_SPLIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<name>.+?)\s{2,}(?P<title>.+?)\s{2,}(?P<cusip>\S+)\s*(?P<rest>.*)$")
        .expect("Failed to compile ROW_SPLIT_RE")
});

static LEADING_AMOUNTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([\d,]+)?\s*([\d,]+)?\s*(.*)$").expect("Failed to compile LEADING_AMOUNTS_RE")
});

static NUMERIC_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\d,]+").expect("Failed to compile NUMERIC_TOKEN_RE"));

static TRAILING_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[\d,]+$").expect("Failed to compile TRAILING_NUMBER_RE"));

const SHARE_TYPES: [&str; 4] = ["SH", "PRN", "SHARES", "PRF"];
const OPTION_TYPES: [&str; 4] = ["PUT", "CALL", "P", "C"];

pub fn extract(text: &str) -> Vec<RawRow> {
    let mut records = Vec::new();

    for block in candidate_blocks(text) {
        let Some(layout) = TableLayout::prepare(block, true) else {
            tracing::debug!("Heuristic: candidate table has no <C> header or no rows, skipping");
            continue;
        };
        tracing::debug!(
            "Heuristic: parsing {} rows against a {}-column header",
            layout.rows.len(),
            layout.boundaries.len()
        );

        for line in &layout.rows {
            let entry = match parse_line(line) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::trace!("Heuristic: {}", e);
                    continue;
                }
            };
            if entry.name_of_issuer.to_lowercase() == "total" || is_footer_row(&entry) {
                continue;
            }
            records.push(entry);
        }
    }

    tracing::debug!("Heuristic fixed-width pass produced {} rows", records.len());
    records
}

/// Decomposes one table row. Fails only when the issuer / class / CUSIP split doesn't match.
pub fn parse_line(line: &str) -> Result<RawRow, ExtractError> {
    let ln = strip_wrapping_quotes(line);
    let caps = ROW_SPLIT_RE
        .captures(ln)
        .ok_or_else(|| ExtractError::RowParse(format!("unexpected layout: {:?}", line.trim())))?;

    let mut row = RawRow {
        name_of_issuer: caps["name"].trim().to_string(),
        title_of_class: caps["title"].trim().to_string(),
        cusip: caps["cusip"].trim().to_string(),
        ..RawRow::default()
    };
    let rest = caps.name("rest").map_or("", |m| m.as_str());

    let (value, amount, tail) = match LEADING_AMOUNTS_RE.captures(rest) {
        Some(c) => (
            c.get(1).map_or("", |m| m.as_str()),
            c.get(2).map_or("", |m| m.as_str()),
            c.get(3).map_or("", |m| m.as_str()),
        ),
        None => ("", "", rest),
    };
    row.value = value.to_string();
    row.shares_or_percent_amount = amount.to_string();

    let numbers: Vec<&str> = NUMERIC_TOKEN_RE.find_iter(tail).map(|m| m.as_str()).collect();
    let words = strip_trailing_numbers(tail, numbers.len()).trim();

    let mut discretion: Vec<&str> = Vec::new();
    for token in words.split_whitespace() {
        let upper = token.to_uppercase();
        if row.shares_or_percent_type.is_empty() && SHARE_TYPES.contains(&upper.as_str()) {
            row.shares_or_percent_type = token.to_string();
        } else if row.put_call.is_empty() && OPTION_TYPES.contains(&upper.as_str()) {
            row.put_call = token.to_string();
        } else {
            discretion.push(token);
        }
    }
    row.investment_discretion = discretion.join(" ");

    // Right to left: none, shared, sole, then the other-manager number.
    let mut from_right = numbers.iter().rev();
    row.voting_authority_none = from_right.next().copied().unwrap_or_default().to_string();
    row.voting_authority_shared = from_right.next().copied().unwrap_or_default().to_string();
    row.voting_authority_sole = from_right.next().copied().unwrap_or_default().to_string();
    row.other_manager = from_right.next().copied().unwrap_or_default().to_string();

    Ok(row)
}

/// Some filers paste rows as quoted CSV-ish lines: `"APPLE INC   COM ...",`
fn strip_wrapping_quotes(line: &str) -> &str {
    let ln = line.trim();
    if ln.len() >= 3 && ln.starts_with('"') && ln.ends_with("\",") {
        return ln[1..ln.len() - 2].trim_end();
    }
    if ln.len() >= 2 && ln.starts_with('"') && ln.ends_with('"') {
        return &ln[1..ln.len() - 1];
    }
    ln
}

/// Removes the last `count` whitespace-separated numeric tokens.
///
/// Leaves `tail` untouched unless all of them sit in one contiguous run at the end.
fn strip_trailing_numbers(tail: &str, count: usize) -> &str {
    let mut rest = tail.trim_end();
    for _ in 0..count {
        match TRAILING_NUMBER_RE.find(rest) {
            Some(m) => rest = &rest[..m.start()],
            None => return tail,
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_row() {
        let row = parse_line(
            "APPLE INC                COM          037833100    1,250    10,000 SH       SOLE          10,000      0      0",
        )
        .unwrap();
        assert_eq!(row.name_of_issuer, "APPLE INC");
        assert_eq!(row.title_of_class, "COM");
        assert_eq!(row.cusip, "037833100");
        assert_eq!(row.value, "1,250");
        assert_eq!(row.shares_or_percent_amount, "10,000");
        assert_eq!(row.shares_or_percent_type, "SH");
        assert_eq!(row.put_call, "");
        assert_eq!(row.investment_discretion, "SOLE");
        assert_eq!(row.other_manager, "");
        assert_eq!(row.voting_authority_sole, "10,000");
        assert_eq!(row.voting_authority_shared, "0");
        assert_eq!(row.voting_authority_none, "0");
    }

    #[test]
    fn test_parse_row_with_option_and_other_manager() {
        let row = parse_line(
            "BERKSHIRE HATHAWAY INC DEL  CL B NEW  084670702  75  3,000  SH  PUT  SHARED DEFINED   1   500   200   0",
        )
        .unwrap();
        assert_eq!(row.name_of_issuer, "BERKSHIRE HATHAWAY INC DEL");
        assert_eq!(row.title_of_class, "CL B NEW");
        assert_eq!(row.cusip, "084670702");
        assert_eq!(row.value, "75");
        assert_eq!(row.shares_or_percent_amount, "3,000");
        assert_eq!(row.put_call, "PUT");
        assert_eq!(row.investment_discretion, "SHARED DEFINED");
        assert_eq!(row.other_manager, "1");
        assert_eq!(row.voting_authority_sole, "500");
        assert_eq!(row.voting_authority_shared, "200");
        assert_eq!(row.voting_authority_none, "0");
    }

    #[test]
    fn test_fewer_trailing_numbers_fill_from_the_right() {
        let row = parse_line("ACME CORP  COM  000360206  10  200  SH  SOLE  200").unwrap();
        assert_eq!(row.voting_authority_none, "200");
        assert_eq!(row.voting_authority_shared, "");
        assert_eq!(row.voting_authority_sole, "");
        assert_eq!(row.investment_discretion, "SOLE");
    }

    #[test]
    fn test_quoted_row() {
        let row = parse_line(r#""ACME CORP  COM  000360206  10  200  SH  SOLE  200  0  0","#).unwrap();
        assert_eq!(row.name_of_issuer, "ACME CORP");
        assert_eq!(row.voting_authority_sole, "200");
        assert_eq!(row.voting_authority_none, "0");
    }

    #[test]
    fn test_unsplittable_row_is_an_error() {
        assert!(matches!(parse_line("SINGLE-COLUMN-NOTE"), Err(ExtractError::RowParse(_))));
        assert!(parse_line("").is_err());
    }

    #[test]
    fn test_extract_skips_totals_and_zero_voting_rows() {
        let text = "\
<TABLE>
NAME OF ISSUER            TITLE        CUSIP        VALUE   SHARES
<S>                       <C>
APPLE INC                 COM          037833100    1,250    10,000 SH  SOLE   10,000      0      0
GHOST HOLDINGS            COM          999999999       10       100 SH  SOLE        0      0      0
TOTAL                     ALL          -            1,260    10,100          10,000      0      0
this row does not split into columns at all but is long enough
</TABLE>";
        let rows = extract(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name_of_issuer, "APPLE INC");
        assert_eq!(rows[0].voting_authority_sole, "10,000");
    }
}
