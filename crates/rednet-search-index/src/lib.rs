//! Search Index (C10): an inverted index of document term frequencies,
//! with JSON persistence and merge.

pub mod error;
mod tokenize;

use std::collections::HashMap;
use std::path::Path;

use rednet_types::config::resolve_path;
use rednet_types::{now_ms, Timestamp};
use serde::{Deserialize, Serialize};

pub use error::SearchIndexError;
pub use tokenize::tokenize;

pub type DocId = u64;

/// Current on-disk format version (spec §6: the index file is "custom
/// serialized structure; versioned").
pub const INDEX_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: DocId,
    pub url: String,
    pub title: String,
    pub content: String,
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchIndex {
    documents: HashMap<u64, DocumentRecord>,
    postings: HashMap<String, HashMap<u64, u32>>,
    df: HashMap<String, usize>,
    next_doc_id: u64,
    total_terms: u64,
    version: String,
    last_update: Timestamp,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self {
            documents: HashMap::new(),
            postings: HashMap::new(),
            df: HashMap::new(),
            next_doc_id: 0,
            total_terms: 0,
            version: INDEX_FORMAT_VERSION.to_string(),
            last_update: 0,
        }
    }
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    /// Assigns a monotonically increasing id, tokenizes `title` + `content`
    /// and builds the per-term counts, and folds the result into the
    /// shared postings/df/total bookkeeping.
    pub fn add_document(&mut self, url: impl Into<String>, title: impl Into<String>, content: impl Into<String>, kind: impl Into<String>) -> u64 {
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;

        let record = DocumentRecord {
            doc_id,
            url: url.into(),
            title: title.into(),
            content: content.into(),
            kind: kind.into(),
        };
        self.index_terms(doc_id, &record.title, &record.content);
        self.documents.insert(doc_id, record);
        doc_id
    }

    /// Removes a document's postings and record. `df` entries that reach
    /// zero are dropped entirely rather than left as empty postings.
    pub fn remove_document(&mut self, doc_id: u64) -> Result<(), SearchIndexError> {
        let record = self.documents.remove(&doc_id).ok_or(SearchIndexError::UnknownDocument(doc_id))?;
        self.deindex_terms(doc_id, &record.title, &record.content);
        Ok(())
    }

    /// Remove then re-add under a new id; the spec allows the id to change.
    pub fn update_document(
        &mut self,
        doc_id: u64,
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        kind: impl Into<String>,
    ) -> Result<u64, SearchIndexError> {
        self.remove_document(doc_id)?;
        Ok(self.add_document(url, title, content, kind))
    }

    /// Re-tokenizes and rebuilds postings for an existing document without
    /// changing its id.
    pub fn index_content(&mut self, doc_id: u64, content: impl Into<String>) -> Result<(), SearchIndexError> {
        let record = self.documents.get(&doc_id).cloned().ok_or(SearchIndexError::UnknownDocument(doc_id))?;
        self.deindex_terms(doc_id, &record.title, &record.content);
        let content = content.into();
        self.index_terms(doc_id, &record.title, &content);
        if let Some(record) = self.documents.get_mut(&doc_id) {
            record.content = content;
        }
        Ok(())
    }

    pub fn document(&self, doc_id: u64) -> Option<&DocumentRecord> {
        self.documents.get(&doc_id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.documents.values()
    }

    pub fn postings(&self, term: &str) -> Option<&HashMap<u64, u32>> {
        self.postings.get(term)
    }

    pub fn df(&self, term: &str) -> usize {
        self.df.get(term).copied().unwrap_or(0)
    }

    pub fn tf(&self, term: &str, doc_id: u64) -> u32 {
        self.postings.get(term).and_then(|docs| docs.get(&doc_id)).copied().unwrap_or(0)
    }

    pub fn total_documents(&self) -> usize {
        self.documents.len()
    }

    pub fn total_terms(&self) -> u64 {
        self.total_terms
    }

    pub fn save(&self, path: &Path) -> Result<(), SearchIndexError> {
        let resolved = resolve_path(path).map_err(|e| SearchIndexError::Persistence(e.to_string()))?;
        let data = serde_json::to_string_pretty(self).map_err(|e| SearchIndexError::Persistence(e.to_string()))?;
        std::fs::write(resolved, data).map_err(|e| SearchIndexError::Persistence(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, SearchIndexError> {
        let data = std::fs::read_to_string(path).map_err(|e| SearchIndexError::Persistence(e.to_string()))?;
        serde_json::from_str(&data).map_err(|e| SearchIndexError::Persistence(e.to_string()))
    }

    /// Imports documents from `other_path` whose url isn't already present
    /// in this index. Conflicting urls are left untouched.
    pub fn merge(&mut self, other_path: &Path) -> Result<usize, SearchIndexError> {
        let other = Self::load(other_path)?;
        let existing_urls: std::collections::HashSet<&str> = self.documents.values().map(|doc| doc.url.as_str()).collect();

        let mut imported = 0;
        for doc in other.documents.values() {
            if existing_urls.contains(doc.url.as_str()) {
                continue;
            }
            self.add_document(doc.url.clone(), doc.title.clone(), doc.content.clone(), doc.kind.clone());
            imported += 1;
        }
        Ok(imported)
    }

    fn index_terms(&mut self, doc_id: u64, title: &str, content: &str) {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in tokenize(title).into_iter().chain(tokenize(content)) {
            *counts.entry(term).or_insert(0) += 1;
        }
        for (term, count) in counts {
            let docs = self.postings.entry(term.clone()).or_default();
            docs.insert(doc_id, count);
            *self.df.entry(term).or_insert(0) += 1;
            self.total_terms += u64::from(count);
        }
        self.last_update = now_ms();
    }

    fn deindex_terms(&mut self, doc_id: u64, title: &str, content: &str) {
        self.last_update = now_ms();
        let mut terms: std::collections::HashSet<String> = std::collections::HashSet::new();
        terms.extend(tokenize(title));
        terms.extend(tokenize(content));

        for term in terms {
            let Some(docs) = self.postings.get_mut(&term) else { continue };
            if let Some(count) = docs.remove(&doc_id) {
                self.total_terms = self.total_terms.saturating_sub(u64::from(count));
            }
            let became_empty = docs.is_empty();
            if became_empty {
                self.postings.remove(&term);
            }
            if let Some(df) = self.df.get_mut(&term) {
                *df = df.saturating_sub(1);
                if *df == 0 {
                    self.df.remove(&term);
                }
            }
        }
    }
}
