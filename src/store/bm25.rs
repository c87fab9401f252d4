//! BM25 scoring, lifted from the teacher's `search/bm25.rs` essentially unchanged and
//! wrapped behind the `BM25Store` contract so it can serve `BM25Indexer`/`BM25Searcher`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{BM25Store, Bm25Stats};

const K1: f64 = 1.2;
const B: f64 = 0.75;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Document {
    tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Bm25State {
    documents: HashMap<String, Document>,
    idf_doc_freq: HashMap<String, f64>,
    doc_lengths: HashMap<String, usize>,
    avg_doc_length: f64,
    doc_count: usize,
    closed: bool,
}

impl Bm25State {
    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| !s.is_empty() && s.len() > 1)
            .map(String::from)
            .collect()
    }

    fn add_document(&mut self, id: String, text: &str) {
        let tokens = Self::tokenize(text);
        let doc_length = tokens.len();

        if let Some(old) = self.documents.get(&id) {
            let unique: std::collections::HashSet<_> = old.tokens.iter().collect();
            for term in unique {
                if let Some(count) = self.idf_doc_freq.get_mut(term) {
                    *count -= 1.0;
                    if *count <= 0.0 {
                        self.idf_doc_freq.remove(term);
                    }
                }
            }
            self.doc_count -= 1;
        }

        let unique_terms: std::collections::HashSet<_> = tokens.iter().cloned().collect();
        for term in unique_terms {
            *self.idf_doc_freq.entry(term).or_insert(0.0) += 1.0;
        }

        self.doc_lengths.insert(id.clone(), doc_length);
        self.documents.insert(id, Document { tokens });
        self.doc_count += 1;
        self.recompute_avg_length();
    }

    fn remove_document(&mut self, id: &str) -> bool {
        if let Some(doc) = self.documents.remove(id) {
            self.doc_lengths.remove(id);
            self.doc_count -= 1;

            let unique: std::collections::HashSet<_> = doc.tokens.iter().collect();
            for term in unique {
                if let Some(count) = self.idf_doc_freq.get_mut(term) {
                    *count -= 1.0;
                    if *count <= 0.0 {
                        self.idf_doc_freq.remove(term);
                    }
                }
            }
            self.recompute_avg_length();
            true
        } else {
            false
        }
    }

    fn recompute_avg_length(&mut self) {
        if self.doc_count > 0 {
            let total: usize = self.doc_lengths.values().sum();
            self.avg_doc_length = total as f64 / self.doc_count as f64;
        } else {
            self.avg_doc_length = 0.0;
        }
    }

    fn calculate_idf(&self, term: &str) -> f64 {
        let doc_freq = self.idf_doc_freq.get(term).copied().unwrap_or(0.0);
        if doc_freq == 0.0 {
            return 0.0;
        }
        let n = self.doc_count as f64;
        ((n - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln()
    }

    fn score_document(&self, doc_id: &str, query_terms: &[String]) -> (f64, Vec<String>) {
        let doc = match self.documents.get(doc_id) {
            Some(d) => d,
            None => return (0.0, Vec::new()),
        };
        let doc_length = self.doc_lengths.get(doc_id).copied().unwrap_or(0) as f64;

        let mut term_freqs: HashMap<&str, usize> = HashMap::new();
        for token in &doc.tokens {
            *term_freqs.entry(token.as_str()).or_insert(0) += 1;
        }

        let mut score = 0.0;
        let mut matched = Vec::new();
        for term in query_terms {
            let tf = term_freqs.get(term.as_str()).copied().unwrap_or(0) as f64;
            if tf > 0.0 {
                let idf = self.calculate_idf(term);
                let numerator = tf * (K1 + 1.0);
                let denominator = tf + K1 * (1.0 - B + B * (doc_length / self.avg_doc_length));
                score += idf * (numerator / denominator);
                matched.push(term.clone());
            }
        }
        (score, matched)
    }

    fn search(&self, query: &str, limit: usize) -> Vec<(String, f64, Vec<String>)> {
        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f64, Vec<String>)> = self
            .documents
            .keys()
            .map(|id| {
                let (score, matched) = self.score_document(id, &query_terms);
                (id.clone(), score, matched)
            })
            .filter(|(_, score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

/// Reference `BM25Store` implementation. All state lives behind a single `RwLock`, the
/// same coarse-lock shape the teacher uses for its `Arc<RwLock<BM25Index>>`.
pub struct Bm25Store {
    state: RwLock<Bm25State>,
}

impl Bm25Store {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Bm25State::default()),
        }
    }
}

impl Default for Bm25Store {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BM25Store for Bm25Store {
    async fn index(&self, docs: &[(String, String)]) -> anyhow::Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().unwrap();
        if state.closed {
            anyhow::bail!("bm25 store is closed");
        }
        for (id, text) in docs {
            state.add_document(id.clone(), text);
        }
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<(String, f64, Vec<String>)>> {
        let state = self.state.read().unwrap();
        Ok(state.search(query, limit))
    }

    async fn delete(&self, ids: &[String]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().unwrap();
        for id in ids {
            state.remove_document(id);
        }
        Ok(())
    }

    async fn all_ids(&self) -> anyhow::Result<Vec<String>> {
        let state = self.state.read().unwrap();
        Ok(state.documents.keys().cloned().collect())
    }

    async fn stats(&self) -> anyhow::Result<Bm25Stats> {
        let state = self.state.read().unwrap();
        Ok(Bm25Stats {
            document_count: state.doc_count,
            term_count: state.idf_doc_freq.len(),
            avg_doc_length: state.avg_doc_length,
        })
    }

    async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let state = self.state.read().unwrap();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*state)?;
        fs::write(path, json)?;
        Ok(())
    }

    async fn load(&self, path: &Path) -> anyhow::Result<()> {
        let json = fs::read_to_string(path)?;
        let loaded: Bm25State = serde_json::from_str(&json)?;
        let mut state = self.state.write().unwrap();
        *state = loaded;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        let mut state = self.state.write().unwrap();
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_search() {
        let store = Bm25Store::new();
        store
            .index(&[
                ("1".into(), "the quick brown fox".into()),
                ("2".into(), "the lazy dog".into()),
                ("3".into(), "the quick rabbit".into()),
            ])
            .await
            .unwrap();

        let results = store.search("quick fox", 10).await.unwrap();
        assert_eq!(results[0].0, "1");
    }

    #[tokio::test]
    async fn matched_terms_are_reported() {
        let store = Bm25Store::new();
        store
            .index(&[("1".into(), "rust async programming".into())])
            .await
            .unwrap();
        let results = store.search("rust async", 10).await.unwrap();
        assert_eq!(results[0].2.len(), 2);
    }

    #[tokio::test]
    async fn empty_index_and_delete_are_noops() {
        let store = Bm25Store::new();
        store.index(&[]).await.unwrap();
        store.delete(&[]).await.unwrap();
        assert_eq!(store.all_ids().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn delete_removes_from_search() {
        let store = Bm25Store::new();
        store
            .index(&[("1".into(), "unique term here".into())])
            .await
            .unwrap();
        assert!(!store.search("unique", 10).await.unwrap().is_empty());
        store.delete(&["1".to_string()]).await.unwrap();
        assert!(store.search("unique", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_store_rejects_index() {
        let store = Bm25Store::new();
        store.close().await.unwrap();
        let result = store.index(&[("1".into(), "text".into())]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25").join("index.json");

        let store = Bm25Store::new();
        store
            .index(&[("1".into(), "hello rust world".into())])
            .await
            .unwrap();
        store.save(&path).await.unwrap();

        let loaded = Bm25Store::new();
        loaded.load(&path).await.unwrap();
        assert_eq!(loaded.all_ids().await.unwrap().len(), 1);
    }
}
