//! Knowledge-base and web fixtures.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use sluice::backend::{MOCK_EMBEDDING_DIM, bag_of_words_embedding};
use sluice::knowledge::{InMemoryKnowledgeStore, Passage};
use sluice::web::WebResult;
use tempfile::TempDir;

pub const WARRANTY_QUERY: &str = "What is the warranty period?";
pub const JAVASCRIPT_QUERY: &str = "What are the latest JavaScript frameworks?";
pub const WARRANTY_PASSAGE: &str = "The warranty period is 12 months.";

/// A small support knowledge base. Nothing in it mentions JavaScript.
pub fn support_passages() -> Vec<Passage> {
    vec![
        Passage::new("warranty", WARRANTY_PASSAGE).with_source("policies/warranty.md"),
        Passage::new("returns", "Returns are accepted within 30 days of purchase.")
            .with_source("policies/returns.md"),
        Passage::new("shipping", "Standard shipping takes 5 business days.")
            .with_source("policies/shipping.md"),
        Passage::new(
            "tracking",
            "Orders can be tracked from the account dashboard using the order number.",
        )
        .with_source("help/tracking.md"),
    ]
}

pub fn embedded(passages: Vec<Passage>) -> Vec<Passage> {
    passages
        .into_iter()
        .map(|p| {
            let embedding = bag_of_words_embedding(&p.content, MOCK_EMBEDDING_DIM);
            p.with_embedding(embedding)
        })
        .collect()
}

pub fn support_store() -> Arc<InMemoryKnowledgeStore> {
    Arc::new(InMemoryKnowledgeStore::from_passages(embedded(support_passages())).unwrap())
}

pub fn warranty_only_store() -> Arc<InMemoryKnowledgeStore> {
    Arc::new(
        InMemoryKnowledgeStore::from_passages(embedded(vec![
            Passage::new("warranty", WARRANTY_PASSAGE).with_source("policies/warranty.md"),
        ]))
        .unwrap(),
    )
}

/// Writes passages without embeddings to a JSON Lines file.
pub fn write_jsonl(passages: &[Passage]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kb.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "# support knowledge base").unwrap();
    for passage in passages {
        writeln!(file, "{}", serde_json::to_string(passage).unwrap()).unwrap();
    }
    (dir, path)
}

pub fn framework_results() -> Vec<WebResult> {
    vec![
        WebResult::new(
            "React",
            "React remains the most used JavaScript framework.",
            "https://example.com/react",
        ),
        WebResult::new(
            "Svelte",
            "Svelte compiles components ahead of time.",
            "https://example.com/svelte",
        ),
    ]
}
