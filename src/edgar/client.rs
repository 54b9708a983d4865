// src/edgar/client.rs
use crate::edgar::models::{pad_cik, CompanySubmission, FilingDocuments, FilingInfo};
use crate::utils::error::EdgarError;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header;
use scraper::{Html, Selector};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const SEC_BASE: &str = "https://www.sec.gov";
// SEC rejects requests without a contact User-Agent.
const DEFAULT_USER_AGENT: &str = "sec13f-extractor admin@example.com";
// SEC asks for 10 requests/second max, counted across every concurrent worker.
const DEFAULT_REQUESTS_PER_SECOND: u32 = 8;

type EdgarRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("Failed to compile TABLE_SELECTOR"));
static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("Failed to compile ROW_SELECTOR"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Failed to compile LINK_SELECTOR"));

static VALUE_MULTIPLIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"x\$(\d+)").expect("Failed to compile VALUE_MULTIPLIER_RE"));

/// Settings every EDGAR request needs. Passed explicitly; nothing is global.
///
/// Clones share one rate limiter, so the quota holds no matter how many
/// filings are in flight.
#[derive(Clone)]
pub struct EdgarConfig {
    pub user_agent: String,
    limiter: Arc<EdgarRateLimiter>,
}

impl std::fmt::Debug for EdgarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgarConfig")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT, DEFAULT_REQUESTS_PER_SECOND)
    }
}

impl EdgarConfig {
    /// Requests are spaced evenly, without bursts: at most
    /// `requests_per_second` in any one-second window.
    pub fn new(user_agent: impl Into<String>, requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);
        Self {
            user_agent: user_agent.into(),
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Defaults, with the User-Agent taken from `EDGAR_USER_AGENT` when set.
    pub fn from_env() -> Self {
        match std::env::var("EDGAR_USER_AGENT") {
            Ok(ua) if !ua.trim().is_empty() => Self::new(ua, DEFAULT_REQUESTS_PER_SECOND),
            _ => {
                tracing::warn!(
                    "EDGAR_USER_AGENT not set, using placeholder '{}'; SEC may throttle it",
                    DEFAULT_USER_AGENT
                );
                Self::default()
            }
        }
    }

    /// Waits for this client's next request slot.
    async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}

/// Creates a reqwest client configured for EDGAR interaction.
fn build_edgar_client(config: &EdgarConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(60))
        .build()
}

/// Downloads a document (filing text, index page, info table) from its URL.
/// Includes mandatory User-Agent and waits for the shared rate limiter.
pub async fn download_filing_doc(config: &EdgarConfig, url: &str) -> Result<String, EdgarError> {
    let client = build_edgar_client(config)?;

    tracing::debug!("Downloading document from: {}", url);

    config.wait_for_permit().await;

    let response = client
        .get(url)
        .header(header::ACCEPT, "application/xml,text/html,text/plain,*/*")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        tracing::error!("HTTP error status: {} for URL: {}", status, url);
        if status == reqwest::StatusCode::FORBIDDEN {
            tracing::warn!("Received 403 Forbidden - check User-Agent and rate limits.");
            return Err(EdgarError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EdgarError::FilingDocNotFound(url.to_string()));
        }
        return Err(EdgarError::Http(status));
    }

    let body = response.text().await?;
    tracing::debug!("Successfully downloaded {} bytes from {}", body.len(), url);

    Ok(body)
}

/// Fetches the company submission data for a given CIK
pub async fn get_company_submissions(
    config: &EdgarConfig,
    cik: &str,
) -> Result<CompanySubmission, EdgarError> {
    let url = format!("https://data.sec.gov/submissions/CIK{}.json", pad_cik(cik));

    let client = build_edgar_client(config)?;
    config.wait_for_permit().await;

    let response = client.get(&url).send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(EdgarError::IndexNotFound(pad_cik(cik)));
    }
    if !response.status().is_success() {
        return Err(EdgarError::Http(response.status()));
    }

    let submission: CompanySubmission = response.json().await?;
    Ok(submission)
}

/// Finds 13F filings (any 13F form variant) for a CIK, optionally limited to filing years.
pub async fn find_13f_filings(
    config: &EdgarConfig,
    cik: &str,
    start_year: Option<u32>,
    end_year: Option<u32>,
) -> Result<Vec<FilingInfo>, EdgarError> {
    let submission = get_company_submissions(config, cik).await?;
    select_13f_filings(&submission, start_year, end_year)
}

fn select_13f_filings(
    submission: &CompanySubmission,
    start_year: Option<u32>,
    end_year: Option<u32>,
) -> Result<Vec<FilingInfo>, EdgarError> {
    let recent = &submission.filings.recent;
    let cik = pad_cik(&submission.cik);
    let business_address = submission
        .addresses
        .get("business")
        .map(|a| a.one_line())
        .unwrap_or_default();

    let mut filings = Vec::new();
    for (i, form) in recent.form.iter().enumerate() {
        if !form.contains("13F") {
            continue;
        }

        let filing_date = recent
            .filing_date
            .get(i)
            .ok_or_else(|| EdgarError::Parse("Missing filing date".to_string()))?;
        let year = filing_date
            .get(0..4)
            .and_then(|y| y.parse::<u32>().ok())
            .ok_or_else(|| EdgarError::Parse(format!("Invalid date format: {}", filing_date)))?;

        if start_year.is_some_and(|start| year < start) || end_year.is_some_and(|end| year > end) {
            continue;
        }

        let accession_number = recent
            .accession_number
            .get(i)
            .ok_or_else(|| EdgarError::Parse("Missing accession number".to_string()))?;

        filings.push(FilingInfo {
            accession_number: accession_number.clone(),
            filing_date: filing_date.clone(),
            report_date: recent.report_date.get(i).cloned().unwrap_or_default(),
            form_type: form.clone(),
            cik: cik.clone(),
            company_name: submission.name.clone(),
            business_address: business_address.clone(),
        });
    }

    Ok(filings)
}

/// Fetches the filing index page and picks out the document links.
pub async fn get_filing_index(
    config: &EdgarConfig,
    filing: &FilingInfo,
) -> Result<FilingDocuments, EdgarError> {
    let html = download_filing_doc(config, &filing.index_url()).await?;
    Ok(parse_filing_index(&html))
}

/// Reads the document table of a filing index page.
///
/// The information table is the row that mentions "table" and links to an
/// `.html` rendition (the last such row wins). The complete submission text
/// is linked from the last row.
pub fn parse_filing_index(html: &str) -> FilingDocuments {
    let document = Html::parse_document(html);
    let Some(table) = document.select(&TABLE_SELECTOR).next() else {
        return FilingDocuments::default();
    };

    let rows: Vec<_> = table.select(&ROW_SELECTOR).collect();
    let mut documents = FilingDocuments::default();

    for row in &rows {
        let Some(link) = row.select(&LINK_SELECTOR).next() else {
            continue;
        };
        let link_text = link.text().collect::<String>();
        if row.html().to_lowercase().contains("table") && link_text.contains(".html") {
            documents.info_table_url = link.value().attr("href").map(absolute_url);
        }
    }

    documents.complete_text_url = rows
        .last()
        .and_then(|row| row.select(&LINK_SELECTOR).next())
        .and_then(|link| link.value().attr("href"))
        .map(absolute_url);

    documents
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", SEC_BASE, href)
    }
}

/// Scale of the `value` column: `x$1000` headings give 1000, as does a
/// "[thousands]" note; otherwise values are in dollars.
pub fn detect_value_multiplier(text: &str) -> u64 {
    if let Some(n) = VALUE_MULTIPLIER_RE
        .captures(text)
        .and_then(|c| c[1].parse::<u64>().ok())
    {
        return n;
    }
    if text.to_lowercase().contains("[thousands]") {
        return 1000;
    }
    1
}
