// src/edgar/models.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ARCHIVES_BASE: &str = "https://www.sec.gov/Archives/edgar/data";

/// The parts of the EDGAR submissions index we use.
/// Example: https://data.sec.gov/submissions/CIK0001067983.json
#[derive(Debug, Deserialize)]
pub struct CompanySubmission {
    pub cik: String,
    pub name: String,
    #[serde(default)]
    pub addresses: HashMap<String, Address>,
    pub filings: Filings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state_or_country: Option<String>,
    pub zip_code: Option<String>,
}

impl Address {
    /// Non-empty parts joined with ", ".
    pub fn one_line(&self) -> String {
        [&self.street1, &self.street2, &self.city, &self.state_or_country, &self.zip_code]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Deserialize)]
pub struct Filings {
    pub recent: FilingsList,
}

/// Column-oriented: the i-th entry of every vector describes the same filing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilingsList {
    pub accession_number: Vec<String>,
    pub filing_date: Vec<String>,
    pub report_date: Vec<String>,
    pub form: Vec<String>,
}

/// One 13F filing to retrieve and extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingInfo {
    pub accession_number: String,
    pub filing_date: String,
    pub report_date: String,
    pub form_type: String,
    pub cik: String, // zero-padded to 10 digits
    pub company_name: String,
    pub business_address: String,
}

impl FilingInfo {
    /// A filing known only by its identifiers (no submissions lookup).
    pub fn from_ids(cik: &str, accession_number: &str) -> Self {
        Self {
            accession_number: accession_number.trim().to_string(),
            filing_date: String::new(),
            report_date: String::new(),
            form_type: "13F".to_string(),
            cik: pad_cik(cik),
            company_name: String::new(),
            business_address: String::new(),
        }
    }

    /// A filing read from disk. `cik` is the output directory name, kept unpadded.
    pub fn local(name: &str) -> Self {
        Self {
            accession_number: name.to_string(),
            filing_date: String::new(),
            report_date: String::new(),
            form_type: "13F".to_string(),
            cik: "local".to_string(),
            company_name: String::new(),
            business_address: String::new(),
        }
    }

    fn archive_dir_url(&self) -> String {
        format!("{}/{}/{}", ARCHIVES_BASE, self.cik, self.accession_number.replace('-', ""))
    }

    /// The filing index page listing every document in the submission.
    pub fn index_url(&self) -> String {
        format!("{}/{}-index.html", self.archive_dir_url(), self.accession_number)
    }

    /// The complete submission text file, with every document concatenated.
    pub fn full_text_url(&self) -> String {
        format!("{}/{}.txt", self.archive_dir_url(), self.accession_number)
    }
}

/// Document links found on a filing index page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilingDocuments {
    pub complete_text_url: Option<String>,
    pub info_table_url: Option<String>,
}

/// EDGAR paths use the 10-digit, zero-padded CIK.
pub fn pad_cik(cik: &str) -> String {
    format!("{:0>10}", cik.trim())
}
