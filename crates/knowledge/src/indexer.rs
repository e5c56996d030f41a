//! Building and updating vector stores from source documents.
//!
//! Statute stores are built from `.txt`/`.md` files; case stores from
//! CAIL-SCM style `.json`/`.jsonl` files where every line is an object whose
//! `A`, `B` and `C` fields are three separate judgment texts.
//!
//! Indexing is incremental: file names already listed in
//! `processed_files.log` inside the store directory are skipped, and the log
//! is only extended after a file's passages have been written.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zhifa_core::error::KnowledgeError;

use crate::base::Collection;
use crate::embedder::Embedder;
use crate::store::{Passage, VectorStore};

pub const PROCESSED_LOG: &str = "processed_files.log";

/// Separators tried in order by the recursive splitter. The empty string
/// means "split between characters".
pub const SEPARATORS: &[&str] = &["\n\n", "\n", "。", "！", "？", "，", "、", " ", ""];

/// A source document before splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexSettings {
    /// Maximum chunk length, in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            batch_size: 32,
        }
    }
}

/// Summary of one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub chunks_added: usize,
}

pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    settings: IndexSettings,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            settings: IndexSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: IndexSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Index every new supported file under `source_dir` into `db_dir`.
    pub async fn index_directory(
        &self,
        collection: Collection,
        source_dir: &Path,
        db_dir: &Path,
    ) -> Result<IndexReport, KnowledgeError> {
        if !source_dir.is_dir() {
            return Err(KnowledgeError::LoadFailed {
                path: source_dir.display().to_string(),
                reason: "source directory does not exist".into(),
            });
        }

        let mut store = VectorStore::open_or_create(db_dir)?;
        let log_path = db_dir.join(PROCESSED_LOG);
        let processed = read_processed_log(&log_path)?;

        let mut files = Vec::new();
        collect_files(source_dir, collection, &mut files)?;
        files.sort();

        let mut report = IndexReport::default();
        for file in files {
            let name = file_name(&file);
            if processed.contains(&name) {
                debug!(file = %name, "Already indexed, skipping");
                report.files_skipped += 1;
                continue;
            }

            let documents = match collection {
                Collection::Legal => load_statute_file(&file)?,
                Collection::Case => load_case_file(&file)?,
            };

            let added = self.index_documents(&mut store, &documents).await?;
            append_processed_log(&log_path, &name)?;

            info!(file = %name, documents = documents.len(), chunks = added, "Indexed file");
            report.files_indexed += 1;
            report.chunks_added += added;
        }

        info!(
            collection = collection.as_str(),
            indexed = report.files_indexed,
            skipped = report.files_skipped,
            chunks = report.chunks_added,
            total = store.len(),
            "Indexing finished"
        );
        Ok(report)
    }

    /// Split, embed and append documents; returns the number of chunks written.
    pub async fn index_documents(&self, store: &mut VectorStore, documents: &[Document]) -> Result<usize, KnowledgeError> {
        let mut chunks: Vec<(String, String)> = Vec::new();
        for doc in documents {
            for chunk in split_text(&doc.content, self.settings.chunk_size, self.settings.chunk_overlap) {
                chunks.push((doc.source.clone(), chunk));
            }
        }

        let batch_size = self.settings.batch_size.max(1);
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let embeddings = self.embedder.embed_documents(&texts).await?;
            let passages = batch
                .iter()
                .zip(embeddings)
                .map(|((source, content), embedding)| Passage {
                    id: uuid::Uuid::new_v4().to_string(),
                    source: source.clone(),
                    content: content.clone(),
                    embedding,
                })
                .collect();
            store.append(passages)?;
        }

        Ok(chunks.len())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn collect_files(dir: &Path, collection: Collection, out: &mut Vec<PathBuf>) -> Result<(), KnowledgeError> {
    let entries = std::fs::read_dir(dir).map_err(|e| KnowledgeError::LoadFailed {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, collection, out)?;
            continue;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let supported = match collection {
            Collection::Legal => matches!(ext.as_str(), "txt" | "md"),
            Collection::Case => matches!(ext.as_str(), "json" | "jsonl"),
        };
        if supported {
            out.push(path);
        }
    }
    Ok(())
}

fn read_processed_log(path: &Path) -> Result<HashSet<String>, KnowledgeError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(KnowledgeError::Storage(format!("Failed to read {}: {e}", path.display()))),
    }
}

fn append_processed_log(path: &Path, name: &str) -> Result<(), KnowledgeError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| KnowledgeError::Storage(format!("Failed to open {}: {e}", path.display())))?;
    writeln!(file, "{name}").map_err(|e| KnowledgeError::Storage(format!("Failed to write {}: {e}", path.display())))
}

/// Load a plain-text statute file as one document.
pub fn load_statute_file(path: &Path) -> Result<Vec<Document>, KnowledgeError> {
    let content = std::fs::read_to_string(path).map_err(|e| KnowledgeError::LoadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Document {
        source: file_name(path),
        content,
    }])
}

/// Load a CAIL-SCM case file: one JSON object per line, fields `A`/`B`/`C`.
///
/// Unparseable lines are logged and skipped.
pub fn load_case_file(path: &Path) -> Result<Vec<Document>, KnowledgeError> {
    let content = std::fs::read_to_string(path).map_err(|e| KnowledgeError::LoadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let source = file_name(path);

    let mut documents = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(file = %source, line = line_no + 1, error = %e, "Skipping malformed case line");
                continue;
            }
        };
        for key in ["A", "B", "C"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()).filter(|t| !t.trim().is_empty()) {
                documents.push(Document {
                    source: source.clone(),
                    content: text.to_string(),
                });
            }
        }
    }
    Ok(documents)
}

/// Recursively split `text` into chunks of at most `chunk_size` characters.
///
/// Tries [`SEPARATORS`] in order, recursing into pieces that are still too
/// long, then merges neighbouring pieces back up to `chunk_size` with up to
/// `chunk_overlap` characters carried over between chunks. Separators are
/// not kept; chunks are trimmed.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    split_recursive(text, SEPARATORS, chunk_size.max(1), chunk_overlap)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(text: &str, separators: &[&str], chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut separator = "";
    let mut remaining: &[&str] = &[];
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            separator = sep;
            break;
        }
        if text.contains(sep) {
            separator = sep;
            remaining = &separators[i + 1..];
            break;
        }
    }

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut short: Vec<String> = Vec::new();
    for piece in pieces {
        if char_len(&piece) < chunk_size {
            short.push(piece);
            continue;
        }
        if !short.is_empty() {
            chunks.extend(merge_pieces(&short, separator, chunk_size, overlap));
            short.clear();
        }
        if remaining.is_empty() {
            chunks.push(piece.trim().to_string());
        } else {
            chunks.extend(split_recursive(&piece, remaining, chunk_size, overlap));
        }
    }
    if !short.is_empty() {
        chunks.extend(merge_pieces(&short, separator, chunk_size, overlap));
    }
    chunks.retain(|c| !c.is_empty());
    chunks
}

fn merge_pieces(pieces: &[String], separator: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut docs = Vec::new();
    let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
    let mut total = 0usize;

    let join = |parts: &std::collections::VecDeque<&str>| {
        parts.iter().copied().collect::<Vec<_>>().join(separator).trim().to_string()
    };

    for piece in pieces {
        let len = char_len(piece);
        let extra = if current.is_empty() { 0 } else { sep_len };
        if total + len + extra > chunk_size && !current.is_empty() {
            let doc = join(&current);
            if !doc.is_empty() {
                docs.push(doc);
            }
            // Drop from the front until the carried-over tail fits the overlap.
            while total > overlap || (total > 0 && total + len + if current.is_empty() { 0 } else { sep_len } > chunk_size) {
                let Some(front) = current.pop_front() else { break };
                total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
            }
        }
        total += len + if current.is_empty() { 0 } else { sep_len };
        current.push_back(piece);
    }

    let doc = join(&current);
    if !doc.is_empty() {
        docs.push(doc);
    }
    docs
}
