//! File-based vector store: persistent JSON-lines storage.
//!
//! Each store is a directory holding `passages.jsonl`, one JSON-encoded
//! [`Passage`] per line. The whole file is loaded into memory on open;
//! writes only ever append.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zhifa_core::error::KnowledgeError;

use crate::vector::{mmr_search, similarity_search};

/// File name of the passage log inside a store directory.
pub const PASSAGES_FILE: &str = "passages.jsonl";

/// One embedded chunk of a statute or case document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    /// File the chunk came from (e.g. "刑法.txt", "train.json")
    pub source: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub passage: Passage,
    /// Cosine similarity to the query
    pub score: f32,
}

/// An in-memory view of one store directory.
#[derive(Debug)]
pub struct VectorStore {
    dir: PathBuf,
    passages: Vec<Passage>,
}

impl VectorStore {
    /// Open an existing store for querying.
    ///
    /// Fails with [`KnowledgeError::StoreUnavailable`] when the directory or
    /// its passage file is missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KnowledgeError> {
        let dir = dir.into();
        let path = dir.join(PASSAGES_FILE);
        if !path.is_file() {
            return Err(KnowledgeError::StoreUnavailable {
                path: dir.display().to_string(),
                reason: format!("{PASSAGES_FILE} not found"),
            });
        }

        let passages = Self::load_from_disk(&path)?;
        debug!(path = %dir.display(), count = passages.len(), "Vector store loaded");
        Ok(Self { dir, passages })
    }

    /// Open a store for indexing, starting empty if nothing exists yet.
    pub fn open_or_create(dir: impl Into<PathBuf>) -> Result<Self, KnowledgeError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            KnowledgeError::Storage(format!("Failed to create store directory {}: {e}", dir.display()))
        })?;

        let path = dir.join(PASSAGES_FILE);
        let passages = if path.is_file() {
            Self::load_from_disk(&path)?
        } else {
            Vec::new()
        };
        Ok(Self { dir, passages })
    }

    /// Build a store that lives only in memory (nothing is written).
    pub fn in_memory(passages: Vec<Passage>) -> Self {
        Self {
            dir: PathBuf::new(),
            passages,
        }
    }

    fn load_from_disk(path: &Path) -> Result<Vec<Passage>, KnowledgeError> {
        let content = std::fs::read_to_string(path).map_err(|e| KnowledgeError::StoreUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Passage>(line) {
                Ok(passage) => Some(passage),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted passage");
                    None
                }
            })
            .collect())
    }

    /// Append passages to the store file and to the in-memory view.
    pub fn append(&mut self, passages: Vec<Passage>) -> Result<(), KnowledgeError> {
        if passages.is_empty() {
            return Ok(());
        }
        if self.dir.as_os_str().is_empty() {
            self.passages.extend(passages);
            return Ok(());
        }

        let mut buf = String::new();
        for passage in &passages {
            let line = serde_json::to_string(passage)
                .map_err(|e| KnowledgeError::Storage(format!("Failed to serialize passage: {e}")))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let path = self.dir.join(PASSAGES_FILE);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| KnowledgeError::Storage(format!("Failed to open {}: {e}", path.display())))?;
        file.write_all(buf.as_bytes())
            .map_err(|e| KnowledgeError::Storage(format!("Failed to write {}: {e}", path.display())))?;

        self.passages.extend(passages);
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Top-`k` passages by cosine similarity.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<ScoredPassage> {
        similarity_search(&self.passages, query_embedding, k)
    }

    /// `k` passages picked by maximal marginal relevance from the `fetch_k` nearest.
    pub fn search_mmr(&self, query_embedding: &[f32], k: usize, fetch_k: usize, lambda: f32) -> Vec<ScoredPassage> {
        mmr_search(&self.passages, query_embedding, k, fetch_k, lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, embedding: Vec<f32>) -> Passage {
        Passage {
            id: id.into(),
            source: "民法典.txt".into(),
            content: format!("第{id}条"),
            embedding,
        }
    }

    #[test]
    fn open_missing_store_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorStore::open(dir.path().join("legal")).unwrap_err();
        assert!(matches!(err, KnowledgeError::StoreUnavailable { .. }));
    }

    #[test]
    fn append_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("legal");

        let mut store = VectorStore::open_or_create(&db).unwrap();
        assert!(store.is_empty());
        store.append(vec![passage("1", vec![1.0, 0.0])]).unwrap();
        store.append(vec![passage("2", vec![0.0, 1.0])]).unwrap();
        assert_eq!(store.len(), 2);

        let reopened = VectorStore::open(&db).unwrap();
        assert_eq!(reopened.passages(), store.passages());
    }

    #[test]
    fn corrupted_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let line = serde_json::to_string(&passage("1", vec![1.0])).unwrap();
        std::fs::write(dir.path().join(PASSAGES_FILE), format!("{line}\n{{not json\n\n")).unwrap();

        let store = VectorStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn search_returns_nearest() {
        let store = VectorStore::in_memory(vec![
            passage("far", vec![0.0, 1.0]),
            passage("near", vec![1.0, 0.1]),
        ]);
        let hits = store.search(&[1.0, 0.0], 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].passage.id, "near");
    }

    #[test]
    fn in_memory_append_does_not_touch_disk() {
        let mut store = VectorStore::in_memory(vec![]);
        store.append(vec![passage("1", vec![1.0])]).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.dir().as_os_str().is_empty());
    }
}
