// src/main.rs
mod edgar;
mod extractors;
mod storage;
mod utils;

use clap::Parser;
use edgar::client::{self, EdgarConfig};
use edgar::models::FilingInfo;
use extractors::{Cascade, OpenAiFallback};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{FilingMetadata, StorageManager};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use utils::AppError;

/// Extracts holdings tables from SEC Form 13F filings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Local filing text to extract (skips EDGAR entirely)
    #[arg(short, long, conflicts_with = "cik")]
    input: Option<PathBuf>,

    /// CIK of the filing manager
    #[arg(short, long, required_unless_present = "input")]
    cik: Option<String>,

    /// Specific SEC accession number (optional, overrides year filters)
    #[arg(short, long, requires = "cik")]
    accession: Option<String>,

    /// Start year for the 13F filings (optional)
    #[arg(long)]
    start_year: Option<u32>,

    /// End year for the 13F filings (optional)
    #[arg(long)]
    end_year: Option<u32>,

    /// Output directory for extracted rows and metadata
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// Maximum number of filings processed at once (EDGAR requests share one rate limit)
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Hand tables no deterministic strategy could parse to the OpenAI model
    #[arg(long)]
    llm: bool,

    /// Debug mode - save raw filings and table boundary dumps
    #[arg(short, long)]
    debug: bool,
}

/// How a single filing ended.
enum Outcome {
    Extracted(usize),
    RetrievalFailed,
    Failed,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    // 3. Initialize storage and the extraction cascade
    let storage = Arc::new(StorageManager::new(&args.output_dir)?);
    let cascade = Arc::new(if args.llm {
        let fallback = OpenAiFallback::from_env()?;
        tracing::info!("Model fallback enabled ({})", fallback.model());
        Cascade::new(Box::new(fallback))
    } else {
        Cascade::default()
    });

    // 4. A local file needs neither EDGAR nor concurrency
    if let Some(path) = &args.input {
        return process_local_file(path, &cascade, &storage, args.debug).await;
    }

    let cik = args
        .cik
        .as_deref()
        .ok_or_else(|| AppError::Config("Either --input or --cik is required".to_string()))?;
    let config = Arc::new(EdgarConfig::from_env());

    // 5. Resolve the filings to process
    let filings = match &args.accession {
        Some(accession) => {
            tracing::info!("Processing specific filing: {}", accession);
            vec![FilingInfo::from_ids(cik, accession)]
        }
        None => {
            tracing::info!("Finding 13F filings for CIK: {}", cik);
            client::find_13f_filings(&config, cik, args.start_year, args.end_year).await?
        }
    };

    tracing::info!("Found {} 13F filings", filings.len());
    if filings.is_empty() {
        return Err(AppError::Config(format!(
            "No 13F filings found for CIK {} in the specified date range",
            cik
        )));
    }

    // 6. Process filings concurrently, at most `concurrency` at a time
    let permits = Arc::new(Semaphore::new(args.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for filing in filings {
        let permits = Arc::clone(&permits);
        let config = Arc::clone(&config);
        let cascade = Arc::clone(&cascade);
        let storage = Arc::clone(&storage);
        let debug = args.debug;

        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return Outcome::Failed;
            };
            process_filing(&filing, &config, &cascade, &storage, debug).await
        });
    }

    let mut extracted = 0;
    let mut retrieval_failures = 0;
    let mut other_failures = 0;
    let mut total_rows = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Outcome::Extracted(rows)) => {
                extracted += 1;
                total_rows += rows;
            }
            Ok(Outcome::RetrievalFailed) => retrieval_failures += 1,
            Ok(Outcome::Failed) => other_failures += 1,
            Err(e) => {
                tracing::error!("Filing task panicked or was cancelled: {}", e);
                other_failures += 1;
            }
        }
    }

    tracing::info!(
        "Processing finished. Extracted: {} ({} rows), retrieval failures: {}, other failures: {}",
        extracted,
        total_rows,
        retrieval_failures,
        other_failures
    );

    if extracted == 0 && other_failures == 0 && retrieval_failures > 0 {
        return Err(AppError::Processing(format!(
            "Failed to retrieve any of {} filings",
            retrieval_failures
        )));
    }

    Ok(())
}

/// Older SGML filings are often Latin-1; undecodable bytes become U+FFFD
/// instead of failing the whole file, as reqwest's `text()` does for downloads.
fn read_filing_text(path: &Path) -> Result<String, AppError> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn process_local_file(
    path: &Path,
    cascade: &Cascade,
    storage: &StorageManager,
    debug: bool,
) -> Result<(), AppError> {
    let text = read_filing_text(path)?;
    let accession = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "local".to_string());
    let filing = FilingInfo::local(&accession);

    if debug {
        let debug_dir = storage.debug_dir(&filing)?;
        utils::table_debug::save_table_debug(&text, &debug_dir.join(format!("{}_tables.txt", accession)))?;
    }

    let extraction = cascade.extract(&text).await?;
    tracing::info!(
        "{}: {} rows via {:?} (strategy {})",
        path.display(),
        extraction.attempt.row_count,
        extraction.attempt.strategy,
        extraction.attempt.strategy_index
    );

    let source = path.display().to_string();
    storage.save_info_table(&filing, &extraction.rows)?;
    storage.save_filing_metadata(
        &filing,
        &FilingMetadata {
            filing: &filing,
            attempt: &extraction.attempt,
            value_multiplier: client::detect_value_multiplier(&text),
            source_url: &source,
            info_table_url: None,
        },
    )?;
    Ok(())
}

/// Retrieves, extracts and saves one filing. Errors are logged here and
/// reported as an `Outcome` so one bad filing never stops the rest.
async fn process_filing(
    filing: &FilingInfo,
    config: &EdgarConfig,
    cascade: &Cascade,
    storage: &StorageManager,
    debug: bool,
) -> Outcome {
    tracing::info!("Processing filing {} ({})", filing.accession_number, filing.filing_date);

    // The index page tells us where the full text and the info table live;
    // when it's unavailable the conventional full-text path still works.
    let documents = match client::get_filing_index(config, filing).await {
        Ok(docs) => docs,
        Err(e) => {
            tracing::warn!("Filing index unavailable for {}: {}", filing.accession_number, e);
            Default::default()
        }
    };
    let text_url = documents
        .complete_text_url
        .clone()
        .unwrap_or_else(|| filing.full_text_url());

    let text = match client::download_filing_doc(config, &text_url).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to download filing {}: {}", filing.accession_number, e);
            if let Err(e) = storage.save_retrieval_failure(filing, &e.to_string()) {
                tracing::error!("Failed to record retrieval failure: {}", e);
            }
            return Outcome::RetrievalFailed;
        }
    };
    tracing::info!("Successfully downloaded document ({} bytes)", text.len());

    // The rendered info table carries the value heading more reliably than
    // the raw text does.
    let value_multiplier = match &documents.info_table_url {
        Some(url) => match client::download_filing_doc(config, url).await {
            Ok(html) => client::detect_value_multiplier(&html),
            Err(e) => {
                tracing::warn!("Could not fetch info table {}: {}", url, e);
                client::detect_value_multiplier(&text)
            }
        },
        None => client::detect_value_multiplier(&text),
    };

    if debug {
        if let Err(e) = save_debug_artifacts(filing, &text, storage) {
            tracing::warn!("Failed to write debug artifacts: {}", e);
        }
    }

    let extraction = match cascade.extract(&text).await {
        Ok(extraction) => extraction,
        Err(e) => {
            tracing::error!("Failed to extract {}: {}", filing.accession_number, e);
            return Outcome::Failed;
        }
    };
    tracing::info!(
        "Extracted {} rows from {} via {:?} (strategy {}, model invoked: {})",
        extraction.attempt.row_count,
        filing.accession_number,
        extraction.attempt.strategy,
        extraction.attempt.strategy_index,
        extraction.attempt.fallback_invoked
    );

    let meta = FilingMetadata {
        filing,
        attempt: &extraction.attempt,
        value_multiplier,
        source_url: &text_url,
        info_table_url: documents.info_table_url.as_deref(),
    };
    let saved = storage
        .save_info_table(filing, &extraction.rows)
        .and_then(|_| storage.save_filing_metadata(filing, &meta));
    match saved {
        Ok(_) => Outcome::Extracted(extraction.rows.len()),
        Err(e) => {
            tracing::error!("Failed to save results for {}: {}", filing.accession_number, e);
            Outcome::Failed
        }
    }
}

fn save_debug_artifacts(
    filing: &FilingInfo,
    text: &str,
    storage: &StorageManager,
) -> Result<(), AppError> {
    let debug_dir = storage.debug_dir(filing)?;

    let raw_filing_path = debug_dir.join(format!("{}_raw.txt", filing.accession_number));
    std::fs::write(&raw_filing_path, text)?;
    tracing::info!("Saved raw filing to: {}", raw_filing_path.display());

    let tables_path = debug_dir.join(format!("{}_tables.txt", filing.accession_number));
    utils::table_debug::save_table_debug(text, &tables_path)
}
