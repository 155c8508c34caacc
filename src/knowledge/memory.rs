use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::KnowledgeStore;
use super::error::{KnowledgeError, KnowledgeResult};
use super::types::{Passage, StoreHit};
use crate::dispatch::Dispatcher;
use crate::text::{content_terms, is_stop_word, tokenize};
use crate::vector::{cosine_similarity, is_well_formed};

/// BM25 term-frequency saturation.
pub const BM25_K1: f32 = 1.2;
/// BM25 length normalization.
pub const BM25_B: f32 = 0.75;

struct Indexed {
    passage: Passage,
    term_freqs: HashMap<String, u32>,
    len: usize,
}

#[derive(Default)]
struct Index {
    docs: Vec<Indexed>,
    ids: HashSet<String>,
    doc_freqs: HashMap<String, usize>,
    total_len: usize,
}

impl Index {
    fn avg_len(&self) -> f32 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_len as f32 / self.docs.len() as f32
        }
    }

    /// Okapi BM25 with the non-negative `ln(1 + ...)` idf.
    fn bm25(&self, doc: &Indexed, query_terms: &[String]) -> f32 {
        let n = self.docs.len() as f32;
        let avg_len = self.avg_len().max(1e-3);
        let mut score = 0.0;
        for term in query_terms {
            let Some(&tf) = doc.term_freqs.get(term) else {
                continue;
            };
            let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            let tf = tf as f32;
            let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * (doc.len as f32 / avg_len));
            score += idf * (tf * (BM25_K1 + 1.0)) / denom.max(1e-6);
        }
        score
    }
}

/// Vector + BM25 store held entirely in memory.
pub struct InMemoryKnowledgeStore {
    index: RwLock<Index>,
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Index::default()),
        }
    }

    pub fn from_passages(passages: Vec<Passage>) -> KnowledgeResult<Self> {
        let store = Self::new();
        for passage in passages {
            store.insert(passage)?;
        }
        Ok(store)
    }

    pub fn insert(&self, passage: Passage) -> KnowledgeResult<()> {
        validate_passage(&passage)?;

        let terms: Vec<String> = tokenize(&passage.content)
            .into_iter()
            .filter(|t| !is_stop_word(t))
            .collect();
        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        for term in &terms {
            *term_freqs.entry(term.clone()).or_insert(0) += 1;
        }

        let mut index = self.index.write();
        if !index.ids.insert(passage.id.clone()) {
            return Err(KnowledgeError::DuplicatePassage { id: passage.id });
        }
        for term in term_freqs.keys() {
            *index.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }
        index.total_len += terms.len();
        index.docs.push(Indexed {
            passage,
            term_freqs,
            len: terms.len(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().docs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Passage> {
        self.index
            .read()
            .docs
            .iter()
            .find(|d| d.passage.id == id)
            .map(|d| d.passage.clone())
    }

    /// Reads passages from a JSON Lines file. Blank lines and `#` comments are skipped.
    pub fn load_jsonl(path: impl AsRef<Path>) -> KnowledgeResult<Vec<Passage>> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| KnowledgeError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut passages = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let passage: Passage =
                serde_json::from_str(line).map_err(|e| KnowledgeError::Parse {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            passages.push(passage);
        }
        info!(path = %path.display(), passages = passages.len(), "loaded knowledge file");
        Ok(passages)
    }

    /// Fills in missing or malformed embeddings through the dispatcher.
    #[instrument(skip_all, fields(passages = passages.len()))]
    pub async fn embed_missing(
        passages: &mut [Passage],
        dispatcher: &Dispatcher,
    ) -> KnowledgeResult<usize> {
        let mut embedded = 0;
        for passage in passages.iter_mut() {
            if passage.embedding.as_deref().is_some_and(is_well_formed) {
                continue;
            }
            let request_id = format!("kb-load-{}", passage.id);
            let result = dispatcher
                .embed(&request_id, &passage.content)
                .await
                .map_err(|e| KnowledgeError::Embedding {
                    id: passage.id.clone(),
                    reason: e.to_string(),
                })?;
            passage.embedding = Some(result.output);
            embedded += 1;
        }
        debug!(embedded, "embedded passages without vectors");
        Ok(embedded)
    }

    /// Loads a JSONL file, embeds what is missing, and builds the store.
    pub async fn load(path: impl AsRef<Path>, dispatcher: &Dispatcher) -> KnowledgeResult<Self> {
        let mut passages = Self::load_jsonl(path)?;
        Self::embed_missing(&mut passages, dispatcher).await?;
        Self::from_passages(passages)
    }
}

fn validate_passage(passage: &Passage) -> KnowledgeResult<()> {
    if passage.id.trim().is_empty() {
        return Err(KnowledgeError::InvalidPassage {
            id: passage.id.clone(),
            reason: "id must not be empty".to_string(),
        });
    }
    if passage.content.trim().is_empty() {
        return Err(KnowledgeError::InvalidPassage {
            id: passage.id.clone(),
            reason: "content must not be empty".to_string(),
        });
    }
    Ok(())
}

fn rank_hits(mut hits: Vec<StoreHit>, k: usize) -> Vec<StoreHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.passage_id.cmp(&b.passage_id))
    });
    hits.truncate(k);
    hits
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn vector_search(&self, embedding: &[f32], k: usize) -> KnowledgeResult<Vec<StoreHit>> {
        if !is_well_formed(embedding) {
            return Err(KnowledgeError::Search {
                side: "vector",
                reason: "query embedding is empty or non-finite".to_string(),
            });
        }
        let index = self.index.read();
        let mut skipped = 0usize;
        let hits: Vec<StoreHit> = index
            .docs
            .iter()
            .filter_map(|doc| {
                let vector = doc.passage.embedding.as_deref()?;
                if vector.len() != embedding.len() || !is_well_formed(vector) {
                    skipped += 1;
                    return None;
                }
                Some(StoreHit::from_passage(
                    &doc.passage,
                    cosine_similarity(embedding, vector),
                ))
            })
            .collect();
        if skipped > 0 {
            warn!(skipped, "passages without a usable vector were skipped");
        }
        Ok(rank_hits(hits, k))
    }

    async fn lexical_search(&self, text: &str, k: usize) -> KnowledgeResult<Vec<StoreHit>> {
        let query_terms = content_terms(text);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.index.read();
        let hits: Vec<StoreHit> = index
            .docs
            .iter()
            .filter_map(|doc| {
                let score = index.bm25(doc, &query_terms);
                (score > 0.0).then(|| StoreHit::from_passage(&doc.passage, score))
            })
            .collect();
        Ok(rank_hits(hits, k))
    }

    fn len(&self) -> usize {
        InMemoryKnowledgeStore::len(self)
    }
}

impl std::fmt::Debug for InMemoryKnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.read();
        f.debug_struct("InMemoryKnowledgeStore")
            .field("passages", &index.docs.len())
            .field("vocabulary", &index.doc_freqs.len())
            .finish()
    }
}
