// src/extractors/normalize.rs
use crate::extractors::row::{InfoTableRow, RawRow};
use once_cell::sync::Lazy;
use regex::Regex;

// Plain decimal notation only. f64::from_str would also take "inf", "NaN" and exponents.
static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)$").expect("Failed to compile DECIMAL_RE")
});

/// Parses a numeric cell. Never fails: anything unusable becomes `0.0`.
pub fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();

    if !DECIMAL_RE.is_match(cleaned) {
        if !cleaned.is_empty() {
            tracing::trace!("Non-numeric amount {:?} defaulted to 0", raw);
        }
        return 0.0;
    }

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => n,
        _ => 0.0,
    }
}

/// Converts a raw row into the typed output record.
pub fn normalize(raw: RawRow) -> InfoTableRow {
    InfoTableRow {
        value: parse_amount(&raw.value),
        shares_or_percent_amount: parse_amount(&raw.shares_or_percent_amount),
        voting_authority_sole: parse_amount(&raw.voting_authority_sole),
        voting_authority_shared: parse_amount(&raw.voting_authority_shared),
        voting_authority_none: parse_amount(&raw.voting_authority_none),
        name_of_issuer: raw.name_of_issuer,
        title_of_class: raw.title_of_class,
        cusip: raw.cusip,
        figi: raw.figi,
        shares_or_percent_type: raw.shares_or_percent_type,
        put_call: raw.put_call,
        investment_discretion: raw.investment_discretion,
        other_manager: raw.other_manager,
    }
}

pub fn normalize_all(rows: Vec<RawRow>) -> Vec<InfoTableRow> {
    rows.into_iter().map(normalize).collect()
}

/// Fixed-width subtotal and footer lines carry no voting figures.
///
/// This also drops genuine holdings reported with zero voting authority in
/// all three categories; see DESIGN.md.
pub fn is_footer_row(row: &RawRow) -> bool {
    let sum = parse_amount(&row.voting_authority_sole)
        + parse_amount(&row.voting_authority_shared)
        + parse_amount(&row.voting_authority_none);
    sum == 0.0
}
