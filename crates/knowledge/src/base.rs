//! The statute and case knowledge base shared by the retrieval tools.
//!
//! Each store is opened lazily on first use behind a `tokio::sync::OnceCell`:
//! concurrent first queries wait for a single load, and a failed load is not
//! cached, so a later query retries.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;
use zhifa_core::error::KnowledgeError;

use crate::embedder::Embedder;
use crate::store::{ScoredPassage, VectorStore};

/// Retrieval parameters shared by all searches.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub fetch_k: usize,
    pub mmr_lambda: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            fetch_k: 10,
            mmr_lambda: 0.5,
        }
    }
}

/// Which collection a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Statutes and regulations
    Legal,
    /// Judgment documents
    Case,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Legal => "legal",
            Collection::Case => "case",
        }
    }
}

pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    legal_dir: PathBuf,
    case_dir: PathBuf,
    legal: OnceCell<Arc<VectorStore>>,
    case: OnceCell<Arc<VectorStore>>,
    settings: RetrievalSettings,
}

impl KnowledgeBase {
    pub fn new(embedder: Arc<dyn Embedder>, legal_dir: impl Into<PathBuf>, case_dir: impl Into<PathBuf>) -> Self {
        Self {
            embedder,
            legal_dir: legal_dir.into(),
            case_dir: case_dir.into(),
            legal: OnceCell::new(),
            case: OnceCell::new(),
            settings: RetrievalSettings::default(),
        }
    }

    /// Build a knowledge base over stores that are already loaded.
    pub fn from_stores(embedder: Arc<dyn Embedder>, legal: VectorStore, case: VectorStore) -> Self {
        Self {
            embedder,
            legal_dir: legal.dir().to_path_buf(),
            case_dir: case.dir().to_path_buf(),
            legal: OnceCell::new_with(Some(Arc::new(legal))),
            case: OnceCell::new_with(Some(Arc::new(case))),
            settings: RetrievalSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RetrievalSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> RetrievalSettings {
        self.settings
    }

    /// The store for `collection`, loading it on first use.
    pub async fn store(&self, collection: Collection) -> Result<Arc<VectorStore>, KnowledgeError> {
        let (cell, dir) = match collection {
            Collection::Legal => (&self.legal, &self.legal_dir),
            Collection::Case => (&self.case, &self.case_dir),
        };

        cell.get_or_try_init(|| async {
            let store = VectorStore::open(dir.clone())?;
            info!(
                collection = collection.as_str(),
                path = %dir.display(),
                passages = store.len(),
                "Knowledge store ready"
            );
            Ok::<_, KnowledgeError>(Arc::new(store))
        })
        .await
        .cloned()
    }

    /// The `top_k` nearest passages.
    pub async fn search(&self, collection: Collection, query: &str, k: usize) -> Result<Vec<ScoredPassage>, KnowledgeError> {
        let store = self.store(collection).await?;
        if store.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed_query(query).await?;
        Ok(store.search(&embedding, k))
    }

    /// Passages chosen by maximal marginal relevance using the configured settings.
    pub async fn search_mmr(&self, collection: Collection, query: &str) -> Result<Vec<ScoredPassage>, KnowledgeError> {
        let store = self.store(collection).await?;
        if store.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed_query(query).await?;
        let s = self.settings;
        Ok(store.search_mmr(&embedding, s.top_k, s.fetch_k, s.mmr_lambda))
    }
}
