use super::*;
use crate::backend::GenerateParams;
use crate::retrieval::CandidatePassage;
use crate::routing::Route;
use crate::testing::MockCluster;
use crate::web::WebResult;
use futures_util::StreamExt;

fn passage(id: &str, content: &str) -> CandidatePassage {
    CandidatePassage {
        id: id.to_string(),
        content: content.to_string(),
        source_document: format!("{id}.md"),
        updated_at: None,
        vector_score: Some(0.9),
        lexical_score: Some(1.0),
        fused_score: 0.93,
        rerank_score: None,
    }
}

fn web(n: usize) -> Vec<WebResult> {
    (1..=n)
        .map(|i| WebResult::new(format!("Result {i}"), format!("web snippet {i}"), format!("https://w{i}.example")))
        .collect()
}

fn assembler(cluster: &MockCluster, config: AnswerConfig) -> AnswerAssembler {
    AnswerAssembler::new(cluster.dispatcher.clone(), config).unwrap()
}

#[test]
fn test_rag_only_uses_kb_sources() {
    let cluster = MockCluster::new(&["a"]);
    let asm = assembler(&cluster, AnswerConfig::default());
    let ctx = asm.build_context(
        Route::RagOnly,
        &[passage("warranty", "The warranty period is 12 months.")],
        &web(2),
    );

    assert_eq!(ctx.citations.len(), 1);
    let c = &ctx.citations[0];
    assert_eq!((c.index, c.kind, c.reference.as_str()), (1, CitationKind::Kb, "warranty"));
    assert!(ctx.text.contains("[1] (kb) warranty.md"));
    assert!(!ctx.text.contains("web snippet"));
}

#[test]
fn test_blend_orders_kb_before_web() {
    let cluster = MockCluster::new(&["a"]);
    let asm = assembler(&cluster, AnswerConfig::default());
    let ctx = asm.build_context(
        Route::RagWebBlend,
        &[passage("p1", "first passage"), passage("p2", "second passage")],
        &web(2),
    );

    let kinds: Vec<_> = ctx.citations.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![CitationKind::Kb, CitationKind::Kb, CitationKind::Web, CitationKind::Web]
    );
    let indices: Vec<_> = ctx.citations.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4]);
    assert_eq!(ctx.citations[2].reference, "https://w1.example");
}

#[test]
fn test_web_only_ignores_kb() {
    let cluster = MockCluster::new(&["a"]);
    let asm = assembler(&cluster, AnswerConfig::default());
    let ctx = asm.build_context(Route::WebOnly, &[passage("p1", "kb text")], &web(3));
    assert!(ctx.citations.iter().all(|c| c.kind == CitationKind::Web));
    assert_eq!(ctx.citations.len(), 3);
}

#[test]
fn test_source_limits() {
    let cluster = MockCluster::new(&["a"]);
    let asm = assembler(&cluster, AnswerConfig::default().max_kb_sources(1).max_web_sources(2));
    let ctx = asm.build_context(
        Route::RagWebBlend,
        &[passage("p1", "one"), passage("p2", "two")],
        &web(5),
    );
    assert_eq!(ctx.citations.len(), 3);
}

#[test]
fn test_citations_align_with_context_under_tight_budget() {
    let cluster = MockCluster::new(&["a"]);
    let asm = assembler(
        &cluster,
        AnswerConfig::default().max_context_chars(100).min_block_chars(20),
    );
    let long = "x".repeat(70);
    let ctx = asm.build_context(
        Route::RagOnly,
        &[
            passage("p1", &long),
            passage("p2", &"y".repeat(70)),
            passage("p3", "never included"),
        ],
        &[],
    );

    // p1 fits (70), p2 is shortened to the remaining 30, p3 has no room.
    assert!(ctx.truncated);
    assert_eq!(ctx.citations.len(), 2);
    assert_eq!(ctx.citations[1].reference, "p2");
    assert!(ctx.text.contains(&"y".repeat(30)));
    assert!(!ctx.text.contains(&"y".repeat(31)));
    assert!(!ctx.text.contains("never included"));
    for c in &ctx.citations {
        assert!(ctx.text.contains(&format!("[{}] (kb) {}", c.index, c.title)));
        assert!(ctx.text.contains(&c.snippet));
    }
}

#[test]
fn test_prompt_contains_sources_question_and_note() {
    let cluster = MockCluster::new(&["a"]);
    let asm = assembler(&cluster, AnswerConfig::default());
    let ctx = asm.build_context(Route::RagOnly, &[passage("p1", "The warranty period is 12 months.")], &[]);

    let prompt = asm.build_prompt("What is the warranty period?", &ctx, false);
    assert!(prompt.contains("[1] (kb) p1.md"));
    assert!(prompt.ends_with("Question: What is the warranty period?\nAnswer:"));
    assert!(!prompt.contains("may not fully cover"));

    let flagged = asm.build_prompt("What is the warranty period?", &ctx, true);
    assert!(flagged.contains("may not fully cover"));
}

#[tokio::test]
async fn test_generate_dispatches_with_prompt() {
    let cluster = MockCluster::new(&["a"]);
    let asm = assembler(&cluster, AnswerConfig::default());
    let ctx = asm.build_context(Route::RagOnly, &[passage("p1", "The warranty period is 12 months.")], &[]);

    let answer = asm
        .generate("r1", "What is the warranty period?", ctx, false, &GenerateParams::default())
        .await
        .unwrap();

    assert_eq!(answer.text, "answer from a");
    assert_eq!(answer.instance_id.as_deref(), Some("a"));
    assert_eq!(answer.citations.len(), 1);
    assert!(cluster.mock("a").last_prompt().unwrap().contains("12 months"));
}

#[tokio::test]
async fn test_empty_context_acknowledges_without_dispatch() {
    let cluster = MockCluster::new(&["a"]);
    let asm = assembler(&cluster, AnswerConfig::default());
    let ctx = asm.build_context(Route::RagOnly, &[], &[]);

    let answer = asm
        .generate("r1", "Latest JavaScript frameworks", ctx, true, &GenerateParams::default())
        .await
        .unwrap();

    assert!(answer.insufficient_knowledge);
    assert_eq!(answer.text, insufficient_knowledge_reply("Latest JavaScript frameworks"));
    assert!(answer.citations.is_empty());
    assert_eq!(cluster.total_generate_calls(), 0);
}

#[tokio::test]
async fn test_generate_surfaces_exhaustion() {
    let cluster = MockCluster::new(&["a", "b"]);
    cluster.take_all_down();
    let asm = assembler(&cluster, AnswerConfig::default());
    let ctx = asm.build_context(Route::RagOnly, &[passage("p1", "text")], &[]);

    let err = asm
        .generate("r1", "q", ctx, false, &GenerateParams::default())
        .await
        .unwrap_err();
    let AnswerError::Dispatch(e) = err else {
        panic!("expected dispatch error");
    };
    assert!(e.is_exhaustion());
}

#[tokio::test]
async fn test_stream_collects_full_answer() {
    let cluster = MockCluster::new(&["a"]);
    let asm = assembler(&cluster, AnswerConfig::default());
    let ctx = asm.build_context(Route::RagOnly, &[passage("p1", "text")], &[]);

    let streamed = asm
        .generate_stream("r1", "q", ctx, false, &GenerateParams::default())
        .await
        .unwrap();
    assert_eq!(streamed.citations.len(), 1);
    let text: String = streamed
        .tokens
        .map(|t| t.unwrap())
        .collect::<Vec<_>>()
        .await
        .concat();
    assert_eq!(text, "answer from a");
}

#[test]
fn test_config_validation() {
    assert!(AnswerConfig::default().validate().is_ok());
    assert!(AnswerConfig::default().max_context_chars(0).validate().is_err());
    assert!(
        AnswerConfig::default()
            .max_context_chars(10)
            .min_block_chars(20)
            .validate()
            .is_err()
    );
}
