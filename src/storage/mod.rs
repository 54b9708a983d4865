// src/storage/mod.rs
use crate::edgar::models::FilingInfo;
use crate::extractors::{AttemptRecord, InfoTableRow};
use crate::utils::error::StorageError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything about one filing's run that isn't a row.
#[derive(Debug, Serialize)]
pub struct FilingMetadata<'a> {
    pub filing: &'a FilingInfo,
    pub attempt: &'a AttemptRecord,
    pub value_multiplier: u64,
    pub source_url: &'a str,
    pub info_table_url: Option<&'a str>,
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_dir: base_path })
    }

    /// `{base}/{cik}/`, created on demand.
    pub fn filing_dir(&self, filing: &FilingInfo) -> Result<PathBuf, StorageError> {
        let dir = self.base_dir.join(&filing.cik);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// `{base}/{cik}/debug/`, created on demand.
    pub fn debug_dir(&self, filing: &FilingInfo) -> Result<PathBuf, StorageError> {
        let dir = self.filing_dir(filing)?.join("debug");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Saves the normalized rows as a JSON array, in document order.
    pub fn save_info_table(
        &self,
        filing: &FilingInfo,
        rows: &[InfoTableRow],
    ) -> Result<PathBuf, StorageError> {
        let file_path = self
            .filing_dir(filing)?
            .join(format!("{}_info_table.json", filing.accession_number));
        write_json(&file_path, &rows)?;

        tracing::info!("Saved {} rows to {}", rows.len(), file_path.display());
        Ok(file_path)
    }

    /// Saves the attempt record and provenance of an extracted filing.
    pub fn save_filing_metadata(
        &self,
        filing: &FilingInfo,
        meta: &FilingMetadata,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.meta_path(filing)?;

        let mut metadata = serde_json::to_value(meta)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        metadata["status"] = serde_json::json!("extracted");
        metadata["extraction_timestamp"] = serde_json::json!(chrono::Utc::now().to_rfc3339());
        write_json(&file_path, &metadata)?;

        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }

    /// Marks a filing whose text could not be retrieved, so it is not
    /// mistaken for one that was extracted with zero rows.
    pub fn save_retrieval_failure(
        &self,
        filing: &FilingInfo,
        error: &str,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.meta_path(filing)?;
        let metadata = serde_json::json!({
            "filing": filing,
            "status": "retrieval_failed",
            "error": error,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });
        write_json(&file_path, &metadata)?;
        Ok(file_path)
    }

    fn meta_path(&self, filing: &FilingInfo) -> Result<PathBuf, StorageError> {
        Ok(self
            .filing_dir(filing)?
            .join(format!("{}_meta.json", filing.accession_number)))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::cascade::Strategy;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sec13f_storage_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_rows_and_metadata_round_trip_to_disk() {
        let dir = scratch_dir("rows");
        let storage = StorageManager::new(&dir).unwrap();
        let filing = FilingInfo::from_ids("1067983", "0000950123-24-002518");
        let row = InfoTableRow {
            name_of_issuer: "APPLE INC".into(),
            title_of_class: "COM".into(),
            cusip: "037833100".into(),
            figi: String::new(),
            value: 1250.0,
            shares_or_percent_amount: 10000.0,
            shares_or_percent_type: "SH".into(),
            put_call: String::new(),
            investment_discretion: "SOLE".into(),
            other_manager: String::new(),
            voting_authority_sole: 10000.0,
            voting_authority_shared: 0.0,
            voting_authority_none: 0.0,
        };

        let rows_path = storage.save_info_table(&filing, &[row.clone()]).unwrap();
        assert!(rows_path.ends_with("0001067983/0000950123-24-002518_info_table.json"));
        let saved: Vec<InfoTableRow> =
            serde_json::from_str(&fs::read_to_string(&rows_path).unwrap()).unwrap();
        assert_eq!(saved, vec![row]);

        let attempt = AttemptRecord {
            strategy: Strategy::StrictFixedWidth,
            strategy_index: 2,
            row_count: 1,
            fallback_invoked: false,
        };
        let meta = FilingMetadata {
            filing: &filing,
            attempt: &attempt,
            value_multiplier: 1000,
            source_url: "https://example.test/filing.txt",
            info_table_url: None,
        };
        let meta_path = storage.save_filing_metadata(&filing, &meta).unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&meta_path).unwrap()).unwrap();
        assert_eq!(saved["status"], "extracted");
        assert_eq!(saved["attempt"]["strategy"], "strict_fixed_width");
        assert_eq!(saved["attempt"]["strategy_index"], 2);
        assert_eq!(saved["value_multiplier"], 1000);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_retrieval_failure_is_distinct() {
        let dir = scratch_dir("failure");
        let storage = StorageManager::new(&dir).unwrap();
        let filing = FilingInfo::from_ids("42", "0000000042-99-000001");

        let path = storage.save_retrieval_failure(&filing, "HTTP error: 500").unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["status"], "retrieval_failed");
        assert!(saved.get("attempt").is_none());

        let _ = fs::remove_dir_all(&dir);
    }
}
