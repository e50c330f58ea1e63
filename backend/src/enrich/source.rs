//! Election configuration sources: where the candidate roster comes from.
//!
//! An empty roster is valid and means no candidates are configured yet.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{EnrichmentError, EnrichmentResult};
use crate::models::Candidate;

/// Supplies the canonical candidate roster. Must be safe for concurrent reads.
#[async_trait]
pub trait ElectionConfigurationSource: Send + Sync {
    async fn get_list_of_candidates(&self) -> EnrichmentResult<Vec<Candidate>>;
}

// =============================================================================
// In-memory
// =============================================================================

/// Roster held in memory; replaceable at runtime.
#[derive(Debug, Default)]
pub struct StaticConfigurationSource {
    candidates: RwLock<Vec<Candidate>>,
}

impl StaticConfigurationSource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: RwLock::new(candidates),
        }
    }

    pub fn replace(&self, candidates: Vec<Candidate>) {
        if let Ok(mut guard) = self.candidates.write() {
            *guard = candidates;
        }
    }
}

#[async_trait]
impl ElectionConfigurationSource for StaticConfigurationSource {
    async fn get_list_of_candidates(&self) -> EnrichmentResult<Vec<Candidate>> {
        self.candidates
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| EnrichmentError::SourceUnavailable("roster lock poisoned".to_string()))
    }
}

// =============================================================================
// JSON file
// =============================================================================

/// Roster read from a JSON array file on every request.
///
/// A missing file is an empty roster; an unreadable or invalid one is an error.
#[derive(Debug, Clone)]
pub struct FileConfigurationSource {
    path: PathBuf,
}

impl FileConfigurationSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ElectionConfigurationSource for FileConfigurationSource {
    async fn get_list_of_candidates(&self) -> EnrichmentResult<Vec<Candidate>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(EnrichmentError::SourceUnavailable(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            EnrichmentError::SourceUnavailable(format!(
                "invalid roster in {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// Roster fetched from an HTTP endpoint returning a JSON array.
#[derive(Clone)]
pub struct HttpConfigurationSource {
    client: reqwest::Client,
    url: String,
}

impl HttpConfigurationSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Use a preconfigured client (proxies, default headers, ...).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl ElectionConfigurationSource for HttpConfigurationSource {
    async fn get_list_of_candidates(&self) -> EnrichmentResult<Vec<Candidate>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| EnrichmentError::SourceUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::SourceUnavailable(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        response
            .json::<Vec<Candidate>>()
            .await
            .map_err(|e| EnrichmentError::SourceUnavailable(format!("invalid roster JSON: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_static_source_replace() {
        let source = StaticConfigurationSource::default();
        assert!(source.get_list_of_candidates().await.unwrap().is_empty());

        source.replace(vec![Candidate::new("c1", "Ana Pop")]);
        let roster = source.get_list_of_candidates().await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Ana Pop");
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let source = FileConfigurationSource::new(dir.path().join("candidates.json"));
        assert!(source.get_list_of_candidates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_source_reads_roster() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("candidates.json");
        std::fs::write(
            &path,
            r#"[{"id":"g1","name":"Ana Pop","party":"PA","imageUrl":"https://img/g1.png"},
                {"id":"g2","name":"Ion Ionescu"}]"#,
        )
        .unwrap();

        let roster = FileConfigurationSource::new(&path)
            .get_list_of_candidates()
            .await
            .unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].party.as_deref(), Some("PA"));
        assert_eq!(roster[1].votes, 0);
    }

    #[tokio::test]
    async fn test_file_source_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("candidates.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = FileConfigurationSource::new(&path)
            .get_list_of_candidates()
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichmentError::SourceUnavailable(_)));
    }
}
