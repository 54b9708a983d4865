// src/extractors/row.rs
use serde::{Deserialize, Serialize};

fn zero() -> String {
    "0".to_string()
}

/// One information-table row as recovered from the filing, before numeric cleanup.
///
/// Every strategy (and the model fallback) produces this shape. Numeric
/// columns are still text here; see [`crate::extractors::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub name_of_issuer: String,
    #[serde(default)]
    pub title_of_class: String,
    #[serde(default)]
    pub cusip: String,
    #[serde(default)]
    pub figi: String,
    #[serde(default = "zero")]
    pub value: String,
    #[serde(default = "zero")]
    pub shares_or_percent_amount: String,
    #[serde(default)]
    pub shares_or_percent_type: String,
    #[serde(default)]
    pub put_call: String,
    #[serde(default)]
    pub investment_discretion: String,
    #[serde(default)]
    pub other_manager: String,
    #[serde(default = "zero")]
    pub voting_authority_sole: String,
    #[serde(default = "zero")]
    pub voting_authority_shared: String,
    #[serde(default = "zero")]
    pub voting_authority_none: String,
}

impl Default for RawRow {
    fn default() -> Self {
        Self {
            name_of_issuer: String::new(),
            title_of_class: String::new(),
            cusip: String::new(),
            figi: String::new(),
            value: zero(),
            shares_or_percent_amount: zero(),
            shares_or_percent_type: String::new(),
            put_call: String::new(),
            investment_discretion: String::new(),
            other_manager: String::new(),
            voting_authority_sole: zero(),
            voting_authority_shared: zero(),
            voting_authority_none: zero(),
        }
    }
}

/// The information-table columns a fixed-width table can carry. FIGI postdates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    NameOfIssuer,
    TitleOfClass,
    Cusip,
    Value,
    SharesOrPercentAmount,
    SharesOrPercentType,
    PutCall,
    InvestmentDiscretion,
    OtherManager,
    VotingAuthoritySole,
    VotingAuthorityShared,
    VotingAuthorityNone,
}

/// Left-to-right column order of a legacy fixed-width table.
pub const STRICT_COLUMN_ORDER: [Column; 12] = [
    Column::NameOfIssuer,
    Column::TitleOfClass,
    Column::Cusip,
    Column::Value,
    Column::SharesOrPercentAmount,
    Column::SharesOrPercentType,
    Column::PutCall,
    Column::InvestmentDiscretion,
    Column::OtherManager,
    Column::VotingAuthoritySole,
    Column::VotingAuthorityShared,
    Column::VotingAuthorityNone,
];

impl RawRow {
    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        let value = value.into();
        match column {
            Column::NameOfIssuer => self.name_of_issuer = value,
            Column::TitleOfClass => self.title_of_class = value,
            Column::Cusip => self.cusip = value,
            Column::Value => self.value = value,
            Column::SharesOrPercentAmount => self.shares_or_percent_amount = value,
            Column::SharesOrPercentType => self.shares_or_percent_type = value,
            Column::PutCall => self.put_call = value,
            Column::InvestmentDiscretion => self.investment_discretion = value,
            Column::OtherManager => self.other_manager = value,
            Column::VotingAuthoritySole => self.voting_authority_sole = value,
            Column::VotingAuthorityShared => self.voting_authority_shared = value,
            Column::VotingAuthorityNone => self.voting_authority_none = value,
        }
    }
}

/// The normalized output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoTableRow {
    pub name_of_issuer: String,
    pub title_of_class: String,
    pub cusip: String,
    pub figi: String,
    pub value: f64,
    pub shares_or_percent_amount: f64,
    pub shares_or_percent_type: String,
    pub put_call: String,
    pub investment_discretion: String,
    pub other_manager: String,
    pub voting_authority_sole: f64,
    pub voting_authority_shared: f64,
    pub voting_authority_none: f64,
}
