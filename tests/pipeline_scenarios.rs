//! End-to-end scenarios through the answer engine with mock instances.

mod common;

use std::sync::Arc;

use sluice::answer::CitationKind;
use sluice::backend::GenerateParams;
use sluice::cache::CacheStatus;
use sluice::dispatch::DispatchError;
use sluice::engine::{AnswerEngine, AnswerMethod, AnswerOptions, DegradationKind};
use sluice::knowledge::{InMemoryKnowledgeStore, KnowledgeStore};
use sluice::routing::{Route, RouteReason, RoutingThresholds};
use sluice::testing::MockCluster;
use sluice::web::{MockWebSearch, WebSearch};

use common::fixtures::{
    JAVASCRIPT_QUERY, WARRANTY_QUERY, framework_results, support_passages, support_store,
    warranty_only_store, write_jsonl,
};

fn engine(
    cluster: &MockCluster,
    store: Arc<dyn KnowledgeStore>,
    web: Option<Arc<MockWebSearch>>,
) -> AnswerEngine {
    let mut builder = AnswerEngine::builder(Arc::clone(&cluster.dispatcher), store);
    if let Some(web) = web {
        builder = builder.web(web as Arc<dyn WebSearch>);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn test_warranty_question_answered_from_knowledge_base() {
    let cluster = MockCluster::new(&["gpu0", "gpu1"]);
    let web = Arc::new(MockWebSearch::new(framework_results()));
    let engine = engine(&cluster, warranty_only_store(), Some(Arc::clone(&web)));

    let answer = engine.answer(WARRANTY_QUERY, &AnswerOptions::default()).await;

    assert!(answer.confidence.value >= 0.5, "confidence = {}", answer.confidence.value);
    assert_eq!(answer.route.route, Route::RagOnly);
    assert_eq!(answer.method, AnswerMethod::Generated);
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].reference, "warranty");
    assert_eq!(answer.citations[0].kind, CitationKind::Kb);
    assert_eq!(answer.confidence.components.hedging_penalty, 0.0);
    assert_eq!(web.calls(), 0);
}

#[tokio::test]
async fn test_unrelated_question_routes_to_web() {
    let cluster = MockCluster::new(&["gpu0", "gpu1"]);
    let web = Arc::new(MockWebSearch::new(framework_results()));
    let engine = engine(&cluster, support_store(), Some(Arc::clone(&web)));

    let answer = engine.answer(JAVASCRIPT_QUERY, &AnswerOptions::default()).await;

    assert_eq!(answer.route.candidate_count, 0);
    assert_eq!(answer.confidence.value, 0.0);
    assert_eq!(answer.route.route, Route::WebOnly);
    assert_eq!(answer.method, AnswerMethod::Generated);
    assert!(answer.citations.iter().all(|c| c.kind == CitationKind::Web));
    assert_eq!(web.calls(), 1);
}

#[tokio::test]
async fn test_unrelated_question_without_web_is_flagged_low_confidence() {
    let cluster = MockCluster::new(&["gpu0", "gpu1"]);
    let engine = engine(&cluster, support_store(), None);

    let answer = engine.answer(JAVASCRIPT_QUERY, &AnswerOptions::default()).await;

    assert_eq!(answer.route.route, Route::RagOnly);
    assert_eq!(answer.route.reason, RouteReason::WebUnavailable);
    assert!(answer.low_confidence);
    assert!(!answer.route.web_available);
    assert_eq!(answer.method, AnswerMethod::InsufficientKnowledge);
}

#[tokio::test]
async fn test_four_instances_down_yields_degraded_answer() {
    let cluster = MockCluster::new(&["gpu0", "gpu1", "gpu2", "gpu3"]);
    cluster.take_all_down();

    let err = cluster
        .dispatcher
        .generate("req-direct", "hello", &GenerateParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AllInstancesExhausted { .. }), "{err}");

    let engine = engine(&cluster, support_store(), None);
    let answer = engine.answer(WARRANTY_QUERY, &AnswerOptions::default()).await;

    assert!(answer.is_degraded());
    assert_eq!(answer.method, AnswerMethod::Degraded);
    assert_eq!(
        answer.error.as_ref().map(|e| e.kind),
        Some(DegradationKind::AllInstancesExhausted)
    );
    assert!(!answer.answer.is_empty());
    assert!(answer.status_header().ends_with("; degraded"));
}

#[tokio::test]
async fn test_four_instances_marked_unhealthy_still_answer_through_primary() {
    const NAMES: [&str; 4] = ["gpu0", "gpu1", "gpu2", "gpu3"];
    let cluster = MockCluster::new(&NAMES);
    let mark_all_unhealthy = || {
        for id in NAMES {
            cluster.registry.set_health(id, false).unwrap();
        }
    };
    mark_all_unhealthy();

    let result = cluster
        .dispatcher
        .generate("req-direct", "hello", &GenerateParams::default())
        .await
        .unwrap();
    assert!(result.via_fallback);
    assert_eq!(result.instance_id, "gpu0");

    // A successful fallback call restores the primary's health.
    mark_all_unhealthy();
    let engine = engine(&cluster, support_store(), None);
    let answer = engine.answer(WARRANTY_QUERY, &AnswerOptions::default()).await;

    assert_eq!(answer.method, AnswerMethod::Generated);
    assert!(answer.registry_degraded);
    assert_eq!(answer.instance_id.as_deref(), Some("gpu0"));
    assert_eq!(cluster.mock("gpu1").generate_calls(), 0);
}

#[tokio::test]
async fn test_cached_answer_is_identical_and_counts_hits() {
    let cluster = MockCluster::new(&["gpu0", "gpu1"]);
    let engine = engine(&cluster, support_store(), None);
    let options = AnswerOptions::default();

    let first = engine.answer(WARRANTY_QUERY, &options).await;
    let second = engine.answer(WARRANTY_QUERY, &options).await;
    let third = engine.answer(WARRANTY_QUERY, &options).await;

    assert_eq!(first.cache.status, CacheStatus::Miss);
    assert_eq!(second.cache.status, CacheStatus::HitSemantic);
    assert_eq!(second.method, AnswerMethod::Cached);
    assert_eq!(
        serde_json::to_vec(&second.answer).unwrap(),
        serde_json::to_vec(&first.answer).unwrap()
    );
    assert_eq!(second.citations, first.citations);
    assert_eq!(second.cache.hit_count, Some(1));
    assert_eq!(third.cache.hit_count, Some(2));
    assert_eq!(cluster.total_generate_calls(), 1);
}

#[tokio::test]
async fn test_failover_serves_from_a_different_instance() {
    let cluster = MockCluster::new(&["gpu0", "gpu1"]);
    cluster.registry.set_health("gpu1", false).unwrap();
    let engine = engine(&cluster, support_store(), None);

    let answer = engine.answer(WARRANTY_QUERY, &AnswerOptions::default()).await;
    assert_eq!(answer.instance_id.as_deref(), Some("gpu0"));
    assert_eq!(cluster.mock("gpu1").generate_calls(), 0);

    cluster.registry.set_health("gpu1", true).unwrap();
    cluster.mock("gpu0").fail_next(1);
    let answer = engine
        .answer(WARRANTY_QUERY, &AnswerOptions::default().max_tokens(32))
        .await;
    assert_eq!(answer.method, AnswerMethod::Generated);
    assert!(answer.instance_id.is_some());
    assert!(answer.error.is_none());
}

#[tokio::test]
async fn test_threshold_boundaries_are_configuration() {
    for (low, high) in [(0.05, 0.2), (0.15, 0.5), (0.3, 0.3), (0.3, 0.9)] {
        let cluster = MockCluster::new(&["gpu0"]);
        let web = Arc::new(MockWebSearch::new(framework_results()));
        let thresholds = RoutingThresholds::new(low, high).unwrap();
        let engine = AnswerEngine::builder(Arc::clone(&cluster.dispatcher), support_store())
            .thresholds(thresholds)
            .web(Arc::clone(&web) as Arc<dyn WebSearch>)
            .build()
            .unwrap();

        let answer = engine.answer(WARRANTY_QUERY, &AnswerOptions::default()).await;
        let value = answer.confidence.value;
        let expected = if value >= high {
            Route::RagOnly
        } else if value >= low {
            Route::RagWebBlend
        } else {
            Route::WebOnly
        };
        assert_eq!(answer.route.route, expected, "low={low} high={high} value={value}");
        assert_eq!(answer.route.thresholds, thresholds);
    }
}

#[tokio::test]
async fn test_knowledge_base_loaded_from_jsonl() {
    let cluster = MockCluster::new(&["gpu0", "gpu1"]);
    let (_dir, path) = write_jsonl(&support_passages());
    let store = InMemoryKnowledgeStore::load(&path, &cluster.dispatcher)
        .await
        .unwrap();
    assert_eq!(store.len(), support_passages().len());

    let engine = engine(&cluster, Arc::new(store), None);
    let answer = engine.answer(WARRANTY_QUERY, &AnswerOptions::default()).await;

    assert_eq!(answer.route.route, Route::RagOnly);
    assert_eq!(answer.citations[0].reference, "warranty");
}
