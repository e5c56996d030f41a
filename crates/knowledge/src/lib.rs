//! Knowledge base for Zhifa: statute and case vector stores.
//!
//! - [`store`]: JSONL-backed passage store
//! - [`vector`]: cosine similarity, top-k and MMR search
//! - [`embedder`]: the `Embedder` trait and its provider-backed implementation
//! - [`base`]: lazily loaded statute/case stores shared by the tools
//! - [`indexer`]: document loading, recursive splitting, incremental indexing

pub mod base;
pub mod embedder;
pub mod indexer;
pub mod store;
pub mod vector;

pub use base::{Collection, KnowledgeBase, RetrievalSettings};
pub use embedder::{Embedder, ProviderEmbedder};
pub use indexer::{Document, IndexReport, IndexSettings, Indexer};
pub use store::{Passage, ScoredPassage, VectorStore};
