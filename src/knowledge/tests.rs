use super::*;
use crate::backend::{MOCK_EMBEDDING_DIM, bag_of_words_embedding};
use crate::testing::MockCluster;
use std::io::Write;

fn embedded(id: &str, content: &str) -> Passage {
    Passage::new(id, content).with_embedding(bag_of_words_embedding(content, MOCK_EMBEDDING_DIM))
}

fn store() -> InMemoryKnowledgeStore {
    InMemoryKnowledgeStore::from_passages(vec![
        embedded("warranty", "The warranty period is 12 months."),
        embedded("returns", "Returns are accepted within 30 days of purchase."),
        embedded("shipping", "Standard shipping takes 5 business days."),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_lexical_search_ranks_matching_passage() {
    let store = store();
    let hits = store
        .lexical_search("What is the warranty period?", 10)
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].passage_id, "warranty");
    assert!(hits[0].score > 0.0);
}

#[tokio::test]
async fn test_lexical_search_ignores_stop_word_queries() {
    let store = store();
    assert!(store.lexical_search("what is the", 10).await.unwrap().is_empty());
    assert!(store.lexical_search("?!", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lexical_rarer_terms_score_higher() {
    let store = InMemoryKnowledgeStore::from_passages(vec![
        Passage::new("a", "rust memory safety"),
        Passage::new("b", "rust compiler"),
        Passage::new("c", "rust borrow checker"),
    ])
    .unwrap();
    let hits = store.lexical_search("rust memory", 10).await.unwrap();
    assert_eq!(hits[0].passage_id, "a");
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn test_vector_search_orders_by_cosine() {
    let store = store();
    let query = bag_of_words_embedding("warranty period", MOCK_EMBEDDING_DIM);
    let hits = store.vector_search(&query, 2).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].passage_id, "warranty");
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn test_vector_search_skips_passages_without_usable_vectors() {
    let store = InMemoryKnowledgeStore::from_passages(vec![
        Passage::new("plain", "no vector here"),
        Passage::new("short", "wrong dimension").with_embedding(vec![1.0, 0.0]),
        Passage::new("ok", "usable").with_embedding(vec![1.0, 0.0, 0.0]),
    ])
    .unwrap();
    let hits = store.vector_search(&[1.0, 0.0, 0.0], 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].passage_id, "ok");
}

#[tokio::test]
async fn test_vector_search_rejects_malformed_query() {
    let store = store();
    let err = store.vector_search(&[f32::NAN], 5).await.unwrap_err();
    assert!(matches!(err, KnowledgeError::Search { side: "vector", .. }));
}

#[test]
fn test_insert_validation() {
    let store = InMemoryKnowledgeStore::new();
    assert!(matches!(
        store.insert(Passage::new("", "content")),
        Err(KnowledgeError::InvalidPassage { .. })
    ));
    assert!(matches!(
        store.insert(Passage::new("id", "   ")),
        Err(KnowledgeError::InvalidPassage { .. })
    ));
    store.insert(Passage::new("id", "content")).unwrap();
    assert!(matches!(
        store.insert(Passage::new("id", "again")),
        Err(KnowledgeError::DuplicatePassage { .. })
    ));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_load_jsonl() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# knowledge base").unwrap();
    writeln!(
        file,
        r#"{{"id":"p1","content":"The warranty period is 12 months.","source_document":"warranty.pdf","updated_at":"2025-01-01T00:00:00Z"}}"#
    )
    .unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"id":"p2","content":"Returns within 30 days.","embedding":[0.1,0.2]}}"#).unwrap();

    let passages = InMemoryKnowledgeStore::load_jsonl(file.path()).unwrap();
    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].source_document, "warranty.pdf");
    assert!(passages[0].updated_at.is_some());
    assert_eq!(passages[1].embedding.as_deref(), Some(&[0.1f32, 0.2][..]));
}

#[test]
fn test_load_jsonl_reports_line_number() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"id":"p1","content":"ok"}}"#).unwrap();
    writeln!(file, "not json").unwrap();

    let err = InMemoryKnowledgeStore::load_jsonl(file.path()).unwrap_err();
    assert!(matches!(err, KnowledgeError::Parse { line: 2, .. }));
}

#[test]
fn test_load_jsonl_missing_file() {
    let err = InMemoryKnowledgeStore::load_jsonl("/definitely/not/here.jsonl").unwrap_err();
    assert!(matches!(err, KnowledgeError::Io { .. }));
}

#[tokio::test]
async fn test_load_embeds_missing_vectors() {
    let cluster = MockCluster::new(&["a"]);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"id":"p1","content":"The warranty period is 12 months."}}"#).unwrap();
    writeln!(file, r#"{{"id":"p2","content":"Returns","embedding":[1.0,0.0]}}"#).unwrap();

    let store = InMemoryKnowledgeStore::load(file.path(), &cluster.dispatcher)
        .await
        .unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(
        store.get("p1").unwrap().embedding.unwrap().len(),
        MOCK_EMBEDDING_DIM
    );
    assert_eq!(store.get("p2").unwrap().embedding.unwrap(), vec![1.0, 0.0]);
    assert_eq!(cluster.mock("a").embed_calls(), 1);
}

#[tokio::test]
async fn test_embed_missing_propagates_exhaustion() {
    let cluster = MockCluster::new(&["a"]);
    cluster.take_all_down();
    let mut passages = vec![Passage::new("p1", "content")];

    let err = InMemoryKnowledgeStore::embed_missing(&mut passages, &cluster.dispatcher)
        .await
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::Embedding { .. }));
}
