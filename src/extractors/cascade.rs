// src/extractors/cascade.rs
//! Runs the extraction strategies in priority order; the first non-empty result wins.

use crate::extractors::fallback::{fallback_scope, ModelFallback, NoFallback};
use crate::extractors::normalize::normalize_all;
use crate::extractors::row::{InfoTableRow, RawRow};
use crate::extractors::{heuristic, markup, strict};
use crate::utils::error::ExtractError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    StructuredMarkup,
    StrictFixedWidth,
    HeuristicFixedWidth,
    ModelFallback,
}

impl Strategy {
    /// Position in the cascade, 1-based.
    pub fn index(self) -> u8 {
        match self {
            Strategy::StructuredMarkup => 1,
            Strategy::StrictFixedWidth => 2,
            Strategy::HeuristicFixedWidth => 3,
            Strategy::ModelFallback => 4,
        }
    }
}

/// A deterministic, I/O-free way of pulling rows out of raw filing text.
pub trait ExtractionStrategy: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// An empty `Ok` means the document doesn't have this strategy's shape.
    fn extract(&self, text: &str) -> Result<Vec<RawRow>, ExtractError>;
}

pub struct StructuredMarkupStrategy;
pub struct StrictFixedWidthStrategy;
pub struct HeuristicFixedWidthStrategy;

impl ExtractionStrategy for StructuredMarkupStrategy {
    fn strategy(&self) -> Strategy {
        Strategy::StructuredMarkup
    }

    fn extract(&self, text: &str) -> Result<Vec<RawRow>, ExtractError> {
        markup::extract(text)
    }
}

impl ExtractionStrategy for StrictFixedWidthStrategy {
    fn strategy(&self) -> Strategy {
        Strategy::StrictFixedWidth
    }

    fn extract(&self, text: &str) -> Result<Vec<RawRow>, ExtractError> {
        Ok(strict::extract(text))
    }
}

impl ExtractionStrategy for HeuristicFixedWidthStrategy {
    fn strategy(&self) -> Strategy {
        Strategy::HeuristicFixedWidth
    }

    fn extract(&self, text: &str) -> Result<Vec<RawRow>, ExtractError> {
        Ok(heuristic::extract(text))
    }
}

static STRUCTURED: StructuredMarkupStrategy = StructuredMarkupStrategy;
static STRICT: StrictFixedWidthStrategy = StrictFixedWidthStrategy;
static HEURISTIC: HeuristicFixedWidthStrategy = HeuristicFixedWidthStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeState {
    TryStructured,
    TryStrict,
    TryHeuristic,
    TryModelFallback,
    Done,
}

impl CascadeState {
    /// The deterministic strategy run in this state, if any.
    fn strategy(self) -> Option<&'static dyn ExtractionStrategy> {
        match self {
            CascadeState::TryStructured => Some(&STRUCTURED),
            CascadeState::TryStrict => Some(&STRICT),
            CascadeState::TryHeuristic => Some(&HEURISTIC),
            CascadeState::TryModelFallback | CascadeState::Done => None,
        }
    }

    fn next(self) -> Self {
        match self {
            CascadeState::TryStructured => CascadeState::TryStrict,
            CascadeState::TryStrict => CascadeState::TryHeuristic,
            CascadeState::TryHeuristic => CascadeState::TryModelFallback,
            CascadeState::TryModelFallback | CascadeState::Done => CascadeState::Done,
        }
    }
}

/// Which strategy produced a filing's rows, for auditing and triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub strategy: Strategy,
    pub strategy_index: u8,
    pub row_count: usize,
    /// False when the cascade reached the fallback but found nothing worth sending.
    pub fallback_invoked: bool,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub rows: Vec<InfoTableRow>,
    pub attempt: AttemptRecord,
}

/// Runs one strategy; errors and empty results both mean "try the next one".
fn attempt(strategy: &dyn ExtractionStrategy, text: &str) -> Option<(Strategy, Vec<RawRow>)> {
    match strategy.extract(text) {
        Ok(rows) if !rows.is_empty() => {
            tracing::info!("{:?} extracted {} rows", strategy.strategy(), rows.len());
            Some((strategy.strategy(), rows))
        }
        Ok(_) => {
            tracing::debug!("{:?} found no rows", strategy.strategy());
            None
        }
        Err(e) => {
            tracing::warn!("{:?} failed, falling through: {}", strategy.strategy(), e);
            None
        }
    }
}

/// Holds the model fallback; everything else is stateless, so one cascade
/// can serve many filings concurrently.
pub struct Cascade {
    fallback: Box<dyn ModelFallback>,
}

impl Default for Cascade {
    fn default() -> Self {
        Self::new(Box::new(NoFallback))
    }
}

impl Cascade {
    pub fn new(fallback: Box<dyn ModelFallback>) -> Self {
        Self { fallback }
    }

    /// The three deterministic strategies only, without normalization.
    pub fn run_deterministic(text: &str) -> Option<(Strategy, Vec<RawRow>)> {
        let mut state = CascadeState::TryStructured;
        while let Some(strategy) = state.strategy() {
            if let Some(found) = attempt(strategy, text) {
                return Some(found);
            }
            state = state.next();
        }
        None
    }

    /// Extracts and normalizes the information table of one filing.
    ///
    /// Only a blank document is an error. A filing nothing could parse comes
    /// back as zero rows with strategy index 4.
    pub async fn extract(&self, text: &str) -> Result<Extraction, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::EmptyDocument);
        }

        let (strategy, raw_rows, fallback_invoked) = match Self::run_deterministic(text) {
            Some((strategy, rows)) => (strategy, rows, false),
            None => {
                let (invoked, rows) = self.run_fallback(text).await;
                (Strategy::ModelFallback, rows, invoked)
            }
        };
        let rows = normalize_all(raw_rows);
        let attempt = AttemptRecord {
            strategy,
            strategy_index: strategy.index(),
            row_count: rows.len(),
            fallback_invoked,
        };
        Ok(Extraction { rows, attempt })
    }

    async fn run_fallback(&self, text: &str) -> (bool, Vec<RawRow>) {
        let Some(scope) = fallback_scope(text) else {
            tracing::info!("No deterministic strategy matched and no issuer/CUSIP table to hand to the model");
            return (false, Vec::new());
        };

        match self.fallback.extract_rows(&scope).await {
            Ok(rows) => (true, rows),
            Err(e) => {
                tracing::warn!("Model fallback failed, recording zero rows: {}", e);
                (true, Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::strict::tests::sgml_filing;
    use crate::utils::error::FallbackError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const XML_FILING: &str = "<SEC-DOCUMENT>\n<XML>\n<informationTable><infoTable><nameOfIssuer>ACME INC</nameOfIssuer><value>1,234</value><votingAuthority><Sole>10</Sole></votingAuthority></infoTable></informationTable>\n</XML>\n</SEC-DOCUMENT>";

    struct CountingFallback {
        calls: Arc<AtomicUsize>,
        result: Result<Vec<RawRow>, String>,
    }

    #[async_trait]
    impl ModelFallback for CountingFallback {
        async fn extract_rows(&self, _block: &str) -> Result<Vec<RawRow>, FallbackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(FallbackError::Api)
        }
    }

    fn counting(result: Result<Vec<RawRow>, String>) -> (Cascade, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cascade = Cascade::new(Box::new(CountingFallback { calls: calls.clone(), result }));
        (cascade, calls)
    }

    #[test]
    fn test_state_order() {
        let mut state = CascadeState::TryStructured;
        let mut seen = vec![state];
        while state != CascadeState::Done {
            state = state.next();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                CascadeState::TryStructured,
                CascadeState::TryStrict,
                CascadeState::TryHeuristic,
                CascadeState::TryModelFallback,
                CascadeState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_structured_markup_wins() {
        let extraction = Cascade::default().extract(XML_FILING).await.unwrap();
        assert_eq!(extraction.attempt.strategy, Strategy::StructuredMarkup);
        assert_eq!(extraction.attempt.strategy_index, 1);
        assert_eq!(extraction.rows.len(), 1);
        assert_eq!(extraction.rows[0].name_of_issuer, "ACME INC");
        assert_eq!(extraction.rows[0].value, 1234.0);
    }

    #[tokio::test]
    async fn test_markup_takes_priority_over_fixed_width() {
        let mut text = sgml_filing(&[[
            "APPLE INC", "COM", "037833100", "1,250", "10,000", "SH", "", "SOLE", "", "10,000", "0", "0",
        ]]);
        assert!(!strict::extract(&text).is_empty());
        text.push_str(XML_FILING);

        let extraction = Cascade::default().extract(&text).await.unwrap();
        assert_eq!(extraction.attempt.strategy, Strategy::StructuredMarkup);
        assert_eq!(extraction.rows[0].name_of_issuer, "ACME INC");
    }

    #[tokio::test]
    async fn test_broken_markup_falls_through_to_strict() {
        let mut text = sgml_filing(&[
            ["APPLE INC", "COM", "037833100", "1,250", "10,000", "SH", "", "SOLE", "", "10,000", "0", "0"],
            ["EMPTY VOTES CO", "COM", "000000000", "5", "50", "SH", "", "SOLE", "", "0", "0", "0"],
        ]);
        text.push_str("<informationTable><infoTable><nameOfIssuer>X</infoTable></informationTable>");

        let extraction = Cascade::default().extract(&text).await.unwrap();
        assert_eq!(extraction.attempt.strategy, Strategy::StrictFixedWidth);
        assert_eq!(extraction.attempt.row_count, 1);
        let row = &extraction.rows[0];
        assert_eq!(row.cusip, "037833100");
        assert_eq!(row.value, 1250.0);
        assert_eq!(row.shares_or_percent_amount, 10000.0);
        assert_eq!(row.voting_authority_sole, 10000.0);
    }

    #[tokio::test]
    async fn test_heuristic_when_markers_are_missing() {
        // Only two markers: positional slicing lumps every number into the
        // second column, leaves the voting columns empty and drops every row.
        let text = "\
<TABLE>
NAME OF ISSUER            TITLE        CUSIP
<S>                       <C>
APPLE INC                 COM          037833100    1,250    10,000 SH  SOLE   10,000      0      0
MICROSOFT CORP            COM          594918104      980     4,500 SH  SOLE    4,500      0      0
</TABLE>";
        assert!(strict::extract(text).is_empty());

        let extraction = Cascade::default().extract(text).await.unwrap();
        assert_eq!(extraction.attempt.strategy, Strategy::HeuristicFixedWidth);
        assert_eq!(extraction.attempt.strategy_index, 3);
        assert_eq!(extraction.rows.len(), 2);
        assert_eq!(extraction.rows[1].name_of_issuer, "MICROSOFT CORP");
        assert_eq!(extraction.rows[1].voting_authority_sole, 4500.0);
    }

    #[tokio::test]
    async fn test_model_fallback_invoked_once_and_empty_result() {
        let text = "The filer reports holdings by issuer and CUSIP in a narrative form only.";
        let (cascade, calls) = counting(Ok(Vec::new()));

        let extraction = cascade.extract(text).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(extraction.rows.is_empty());
        assert_eq!(extraction.attempt.strategy_index, 4);
        assert!(extraction.attempt.fallback_invoked);
    }

    #[tokio::test]
    async fn test_model_fallback_rows_are_normalized() {
        let text = "<TABLE>Name of Issuer  CUSIP\nsomething unparseable\n</TABLE>";
        let model_row = RawRow {
            name_of_issuer: "APPLE INC".into(),
            value: "1,000".into(),
            voting_authority_sole: "N/A".into(),
            ..RawRow::default()
        };
        let (cascade, calls) = counting(Ok(vec![model_row]));

        let extraction = cascade.extract(text).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(extraction.attempt.strategy, Strategy::ModelFallback);
        assert_eq!(extraction.rows.len(), 1);
        assert_eq!(extraction.rows[0].value, 1000.0);
        assert_eq!(extraction.rows[0].voting_authority_sole, 0.0);
    }

    #[tokio::test]
    async fn test_model_failure_is_zero_rows_not_error() {
        let text = "issuer cusip prose";
        let (cascade, calls) = counting(Err("timeout".to_string()));

        let extraction = cascade.extract(text).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(extraction.rows.is_empty());
        assert_eq!(extraction.attempt.strategy, Strategy::ModelFallback);
    }

    #[tokio::test]
    async fn test_fallback_not_invoked_without_scope() {
        let (cascade, calls) = counting(Ok(Vec::new()));
        let extraction = cascade.extract("a cover letter with no holdings").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(extraction.attempt.strategy_index, 4);
        assert!(!extraction.attempt.fallback_invoked);
    }

    #[tokio::test]
    async fn test_extract_agrees_with_deterministic_run() {
        let text = sgml_filing(&[[
            "APPLE INC", "COM", "037833100", "1,250", "10,000", "SH", "", "SOLE", "", "10,000", "0", "0",
        ]]);
        let (expected, raw) = Cascade::run_deterministic(&text).unwrap();
        let (cascade, calls) = counting(Ok(Vec::new()));

        let extraction = cascade.extract(&text).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(extraction.attempt.strategy, expected);
        assert!(!extraction.attempt.fallback_invoked);
        assert_eq!(extraction.rows, normalize_all(raw));
    }

    #[tokio::test]
    async fn test_blank_document_is_an_error() {
        let result = Cascade::default().extract("  \n ").await;
        assert!(matches!(result, Err(ExtractError::EmptyDocument)));
    }

    #[test]
    fn test_deterministic_runs_are_identical() {
        let text = sgml_filing(&[
            ["APPLE INC", "COM", "037833100", "1,250", "10,000", "SH", "", "SOLE", "", "10,000", "0", "0"],
            ["MICROSOFT CORP", "COM", "594918104", "980", "4,500", "SH", "", "SOLE", "", "4,500", "0", "0"],
        ]);
        let first = Cascade::run_deterministic(&text);
        let second = Cascade::run_deterministic(&text);
        assert!(first.is_some());
        assert_eq!(first, second);

        let cascade = Cascade::default();
        let a = tokio_test::block_on(cascade.extract(&text)).unwrap();
        let b = tokio_test::block_on(cascade.extract(&text)).unwrap();
        assert_eq!(a.rows, b.rows);
        assert_eq!(a.attempt, b.attempt);
    }

    #[test]
    fn test_all_numeric_fields_non_negative() {
        let text = sgml_filing(&[[
            "ODD ROW CO", "COM", "123456789", "-5", "abc", "SH", "", "SOLE", "", "7", "", "x",
        ]]);
        let extraction = tokio_test::block_on(Cascade::default().extract(&text)).unwrap();
        assert_eq!(extraction.rows.len(), 1);
        let row = &extraction.rows[0];
        for n in [
            row.value,
            row.shares_or_percent_amount,
            row.voting_authority_sole,
            row.voting_authority_shared,
            row.voting_authority_none,
        ] {
            assert!(n.is_finite() && n >= 0.0);
        }
        assert_eq!(row.voting_authority_sole, 7.0);
        assert_eq!(row.value, 0.0);
    }
}
