//! Results storage.
//!
//! The pipeline only needs [`ResultsRepository::insert_results`]. The
//! file-backed repository also lists and loads records for the CLI and HTTP API.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{PersistenceError, PersistenceResult};
use crate::models::ElectionStatistics;

/// Directory where records are stored (relative to current dir).
pub const DEFAULT_DATA_DIR: &str = ".election-results";

/// Persistence for finalized results records.
#[async_trait]
pub trait ResultsRepository: Send + Sync {
    async fn insert_results(&self, record: ElectionStatistics) -> PersistenceResult<()>;
}

// =============================================================================
// In-memory
// =============================================================================

/// Repository keeping records in memory, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryResultsRepository {
    records: Mutex<Vec<ElectionStatistics>>,
}

impl InMemoryResultsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ElectionStatistics> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultsRepository for InMemoryResultsRepository {
    async fn insert_results(&self, record: ElectionStatistics) -> PersistenceResult<()> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| PersistenceError::InsertFailed("repository lock poisoned".to_string()))?;
        guard.push(record);
        Ok(())
    }
}

// =============================================================================
// File-backed
// =============================================================================

/// Repository storing one pretty-printed JSON file per record (`<id>.json`).
#[derive(Debug, Clone)]
pub struct FileResultsRepository {
    dir: PathBuf,
}

impl FileResultsRepository {
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_DATA_DIR)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// All stored records, newest sequence first.
    pub async fn list(&self) -> PersistenceResult<Vec<ElectionStatistics>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                let content = tokio::fs::read_to_string(&path).await?;
                records.push(serde_json::from_str::<ElectionStatistics>(&content)?);
            }
        }

        records.sort_by(|a, b| {
            b.sequence
                .cmp(&a.sequence)
                .then_with(|| b.processed_at.cmp(&a.processed_at))
        });
        Ok(records)
    }

    /// Load a record by id.
    pub async fn get(&self, id: &str) -> PersistenceResult<ElectionStatistics> {
        if id.is_empty() || id.contains(|c: char| matches!(c, '/' | '\\' | '.')) {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        let content = match tokio::fs::read_to_string(self.record_path(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }
}

impl Default for FileResultsRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultsRepository for FileResultsRepository {
    async fn insert_results(&self, record: ElectionStatistics) -> PersistenceResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.record_path(&record.id);
        if tokio::fs::try_exists(&path).await? {
            return Err(PersistenceError::InsertFailed(format!(
                "record {} already exists",
                record.id
            )));
        }

        // Readers must never observe a partial record.
        let tmp = self.dir.join(format!(".{}.tmp", record.id));
        let content = serde_json::to_string_pretty(&record)?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, sequence: u64) -> ElectionStatistics {
        ElectionStatistics {
            id: id.to_string(),
            results_type: "provisional".into(),
            location: "cluj".into(),
            sequence,
            file_name: format!("provisional_cluj_{}", sequence),
            processed_at: "2024-11-24T20:00:00+00:00".into(),
            statistics_json: "{}".into(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_insert() {
        let repo = InMemoryResultsRepository::new();
        assert!(repo.is_empty());
        repo.insert_results(record("a", 1)).await.unwrap();
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.records()[0].id, "a");
    }

    #[tokio::test]
    async fn test_file_roundtrip_and_order() {
        let dir = tempdir().unwrap();
        let repo = FileResultsRepository::with_dir(dir.path().join("records"));
        assert!(repo.list().await.unwrap().is_empty());

        repo.insert_results(record("old", 1)).await.unwrap();
        repo.insert_results(record("new", 2)).await.unwrap();

        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(repo.get("old").await.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_file_duplicate_id_rejected() {
        let dir = tempdir().unwrap();
        let repo = FileResultsRepository::with_dir(dir.path());
        repo.insert_results(record("same", 1)).await.unwrap();
        let err = repo.insert_results(record("same", 1)).await.unwrap_err();
        assert!(matches!(err, PersistenceError::InsertFailed(_)));
    }

    #[tokio::test]
    async fn test_file_get_missing_and_traversal() {
        let dir = tempdir().unwrap();
        let repo = FileResultsRepository::with_dir(dir.path());
        assert!(matches!(
            repo.get("nope").await,
            Err(PersistenceError::NotFound(_))
        ));
        assert!(matches!(
            repo.get("../etc/passwd").await,
            Err(PersistenceError::NotFound(_))
        ));
    }
}
