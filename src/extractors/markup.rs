// src/extractors/markup.rs
//! XML information tables (the format EDGAR has required since 2013).

use crate::extractors::row::RawRow;
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node};

// First <informationTable> ... </informationTable>, with or without a namespace prefix.
static INFORMATION_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<[\w:]*informationTable.*?</[\w:]*informationTable>")
        .expect("Failed to compile INFORMATION_TABLE_RE")
});

/// Returns the raw `informationTable` block, if the filing has one.
pub fn find_information_table(text: &str) -> Option<&str> {
    INFORMATION_TABLE_RE.find(text).map(|m| m.as_str())
}

/// Extracts every `infoTable` entry of the XML information table.
///
/// `Ok(vec![])` means the filing has no XML table. A block that is present
/// but not well-formed is an `Err`, left to the cascade to fall through on.
pub fn extract(text: &str) -> Result<Vec<RawRow>, ExtractError> {
    let Some(block) = find_information_table(text) else {
        return Ok(Vec::new());
    };

    let doc = Document::parse(block).map_err(|e| ExtractError::StructuralParse(e.to_string()))?;
    let root = doc.root_element();
    let ns = root.tag_name().namespace();
    tracing::debug!("informationTable root <{}> namespace {:?}", root.tag_name().name(), ns);

    let rows = root
        .children()
        .filter(|n| is_tag(n, ns, "infoTable"))
        .map(|info| read_info_table(info, ns))
        .collect::<Vec<_>>();

    Ok(rows)
}

fn read_info_table(info: Node, ns: Option<&str>) -> RawRow {
    let text = |path: &[&str], default: &str| text_at(info, ns, path, default);
    let amount = |path: &[&str]| text_at(info, ns, path, "0").replace(',', "");

    RawRow {
        name_of_issuer: text(&["nameOfIssuer"], ""),
        title_of_class: text(&["titleOfClass"], ""),
        cusip: text(&["cusip"], ""),
        figi: text(&["figi"], ""),
        value: amount(&["value"]),
        shares_or_percent_amount: amount(&["shrsOrPrnAmt", "sshPrnamt"]),
        shares_or_percent_type: text(&["shrsOrPrnAmt", "sshPrnamtType"], ""),
        put_call: text(&["putCall"], ""),
        investment_discretion: text(&["investmentDiscretion"], ""),
        other_manager: text(&["otherManager"], ""),
        voting_authority_sole: amount(&["votingAuthority", "Sole"]),
        voting_authority_shared: amount(&["votingAuthority", "Shared"]),
        voting_authority_none: amount(&["votingAuthority", "None"]),
    }
}

fn is_tag(node: &Node, ns: Option<&str>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name && node.tag_name().namespace() == ns
}

/// Follows `path` through direct children; `default` if any step is missing.
fn text_at(node: Node, ns: Option<&str>, path: &[&str], default: &str) -> String {
    let mut current = node;
    for name in path {
        match current.children().find(|c| is_tag(c, ns, name)) {
            Some(child) => current = child,
            None => return default.to_string(),
        }
    }
    current.text().unwrap_or_default().trim().to_string()
}
