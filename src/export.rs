use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use crate::models::ResultRecord;

/// Download name for an export taken on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("search-digest-{}.json", date.format("%Y-%m-%d"))
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn export_json(records: &[ResultRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

/// Write `records` into `dir` (atomic write via temp file + rename).
/// Returns the path of the written file.
pub fn write_export(dir: &Path, records: &[ResultRecord], date: NaiveDate) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export dir {}", dir.display()))?;

    let data = export_json(records).context("Failed to serialize results")?;
    let path = dir.join(export_file_name(date));
    let tmp_path = path.with_extension("json.tmp");

    std::fs::write(&tmp_path, data)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &path)
        .with_context(|| format!("Failed to move export into {}", path.display()))?;

    tracing::info!("Exported {} results to {}", records.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Party, ProductRef, RecordType};

    fn record(id: &str) -> ResultRecord {
        ResultRecord {
            record_type: Some(RecordType::Conversation),
            id: id.to_string(),
            date: "2024-06-01".to_string(),
            advisor: Party::default(),
            client: Party {
                id: "k1".into(),
                name: "Kim".into(),
            },
            product: ProductRef::default(),
            summary: "Talked about savings".to_string(),
            topics: vec!["savings".into()],
            actions: vec![],
            raw_text: None,
        }
    }

    #[test]
    fn test_file_name_carries_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        assert_eq!(export_file_name(date), "search-digest-2024-02-09.json");
    }

    #[test]
    fn test_write_export_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let records = vec![record("c1"), record("c2")];

        let path = write_export(&dir.path().join("nested"), &records, date).unwrap();

        assert_eq!(path.file_name().unwrap(), "search-digest-2024-06-01.json");
        let data = std::fs::read_to_string(&path).unwrap();
        let back: Vec<ResultRecord> = serde_json::from_str(&data).unwrap();
        assert_eq!(back, records);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_export_empty_list() {
        assert_eq!(export_json(&[]).unwrap(), "[]");
    }
}
