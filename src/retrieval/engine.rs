use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::config::RetrievalConfig;
use super::error::{RetrievalError, RetrievalResult};
use super::fusion::{FusionWeights, fuse};
use super::types::RetrievalOutcome;
use crate::knowledge::{KnowledgeResult, KnowledgeStore, StoreHit};

/// Runs vector and lexical search side by side and fuses the results.
pub struct HybridRetriever {
    store: Arc<dyn KnowledgeStore>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn KnowledgeStore>, config: RetrievalConfig) -> RetrievalResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Retrieves and fuses candidates for `query`.
    ///
    /// With `embedding == None` only lexical search runs. A failing side is logged and
    /// treated as empty; the call errors only when no side produced a result.
    #[instrument(skip(self, query, embedding), fields(has_embedding = embedding.is_some()))]
    pub async fn retrieve(
        &self,
        query: &str,
        embedding: Option<&[f32]>,
    ) -> RetrievalResult<RetrievalOutcome> {
        let k = self.config.top_n;
        let deadline = self.config.search_timeout;

        let vector_side = async {
            match embedding {
                Some(e) => Some(bounded("vector", deadline, self.store.vector_search(e, k)).await),
                None => None,
            }
        };
        let lexical_side = bounded("lexical", deadline, self.store.lexical_search(query, k));
        let (vector, lexical) = tokio::join!(vector_side, lexical_side);

        let (vector_hits, vector_error) = split(vector.unwrap_or_else(|| {
            Err("no query embedding available".to_string())
        }));
        let (lexical_hits, lexical_error) = split(lexical);

        if let (Some(v), Some(l)) = (&vector_error, &lexical_error) {
            return Err(RetrievalError::SearchFailed {
                vector: v.clone(),
                lexical: l.clone(),
            });
        }

        let (candidates, mode) = fuse(
            &vector_hits,
            &lexical_hits,
            FusionWeights {
                vector: self.config.vector_weight,
                lexical: self.config.lexical_weight,
                min_vector_similarity: self.config.min_vector_similarity,
            },
        );

        debug!(
            vector_hits = vector_hits.len(),
            lexical_hits = lexical_hits.len(),
            fused = candidates.len(),
            mode = mode.as_str(),
            "retrieval complete"
        );

        Ok(RetrievalOutcome {
            candidates,
            mode,
            vector_hits: vector_hits.len(),
            lexical_hits: lexical_hits.len(),
            vector_error,
            lexical_error,
        })
    }
}

async fn bounded<F>(side: &'static str, deadline: Duration, search: F) -> Result<Vec<StoreHit>, String>
where
    F: Future<Output = KnowledgeResult<Vec<StoreHit>>>,
{
    match timeout(deadline, search).await {
        Ok(Ok(hits)) => Ok(hits),
        Ok(Err(e)) => {
            warn!(side, error = %e, "search side failed");
            Err(e.to_string())
        }
        Err(_) => {
            warn!(side, timeout_ms = deadline.as_millis() as u64, "search side timed out");
            Err(format!("{side} search timed out after {}ms", deadline.as_millis()))
        }
    }
}

fn split(result: Result<Vec<StoreHit>, String>) -> (Vec<StoreHit>, Option<String>) {
    match result {
        Ok(hits) => (hits, None),
        Err(e) => (Vec::new(), Some(e)),
    }
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish()
    }
}
