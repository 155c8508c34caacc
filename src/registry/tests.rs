use super::*;
use crate::backend::{InstanceKind, MockModelBackend, ModelBackend, Operation};
use std::sync::Arc;
use std::time::Duration;

fn members(names: &[&str]) -> (Vec<(InstanceSpec, Arc<dyn ModelBackend>)>, Vec<Arc<MockModelBackend>>) {
    let mocks: Vec<Arc<MockModelBackend>> = names
        .iter()
        .map(|n| Arc::new(MockModelBackend::new(*n)))
        .collect();
    let members = names
        .iter()
        .zip(&mocks)
        .map(|(n, m)| {
            (
                InstanceSpec::new(*n, format!("http://{n}"), InstanceKind::Both),
                Arc::clone(m) as Arc<dyn ModelBackend>,
            )
        })
        .collect();
    (members, mocks)
}

fn registry(names: &[&str]) -> (InstanceRegistry, Vec<Arc<MockModelBackend>>) {
    let (members, mocks) = members(names);
    let registry = InstanceRegistry::new(RegistryConfig::default(), members, None).unwrap();
    (registry, mocks)
}

fn candidate_ids(registry: &InstanceRegistry, op: Operation) -> Vec<String> {
    registry.candidates(op).into_iter().map(|c| c.id).collect()
}

#[test]
fn test_new_rejects_empty() {
    let result = InstanceRegistry::new(RegistryConfig::default(), Vec::new(), None);
    assert!(matches!(result, Err(RegistryError::Empty)));
}

#[test]
fn test_new_rejects_duplicate_ids() {
    let (members, _) = members(&["a", "a"]);
    let result = InstanceRegistry::new(RegistryConfig::default(), members, None);
    assert!(matches!(result, Err(RegistryError::DuplicateInstance { .. })));
}

#[test]
fn test_new_rejects_unknown_primary() {
    let (members, _) = members(&["a", "b"]);
    let result = InstanceRegistry::new(RegistryConfig::default(), members, Some("z".into()));
    assert!(matches!(result, Err(RegistryError::UnknownPrimary { .. })));
}

#[test]
fn test_primary_defaults_to_first_member() {
    let (registry, _) = registry(&["a", "b"]);
    assert_eq!(registry.primary(), Some("a"));
}

#[test]
fn test_config_validate_rejects_zero_threshold() {
    let config = RegistryConfig::default().failure_threshold(0);
    assert!(config.validate().is_err());
}

#[test]
fn test_unhealthy_instance_excluded_from_candidates() {
    let (registry, _) = registry(&["a", "b", "c"]);
    registry.set_health("b", false).unwrap();

    let ids = candidate_ids(&registry, Operation::Generate);
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&"b".to_string()));
    assert_eq!(registry.score("b"), Some(0.0));
}

#[test]
fn test_candidates_ranked_by_latency() {
    let (registry, _) = registry(&["slow", "fast"]);
    registry.record_success("slow", Duration::from_millis(900)).unwrap();
    registry.record_success("fast", Duration::from_millis(20)).unwrap();

    assert_eq!(candidate_ids(&registry, Operation::Embed), vec!["fast", "slow"]);
    assert!(registry.score("fast").unwrap() > registry.score("slow").unwrap());
}

#[test]
fn test_equal_scores_prefer_least_recently_selected() {
    let (registry, _) = registry(&["a", "b"]);
    assert_eq!(candidate_ids(&registry, Operation::Embed)[0], "a");

    registry.mark_selected("a");
    assert_eq!(candidate_ids(&registry, Operation::Embed)[0], "b");

    registry.mark_selected("b");
    assert_eq!(candidate_ids(&registry, Operation::Embed)[0], "a");
}

#[test]
fn test_kind_filter() {
    let embed_only = Arc::new(MockModelBackend::new("e"));
    let gen_only = Arc::new(MockModelBackend::new("g"));
    let registry = InstanceRegistry::new(
        RegistryConfig::default(),
        vec![
            (
                InstanceSpec::new("e", "http://e", InstanceKind::Embedding),
                embed_only as Arc<dyn ModelBackend>,
            ),
            (
                InstanceSpec::new("g", "http://g", InstanceKind::Generation),
                gen_only as Arc<dyn ModelBackend>,
            ),
        ],
        None,
    )
    .unwrap();

    assert_eq!(candidate_ids(&registry, Operation::Embed), vec!["e"]);
    assert_eq!(candidate_ids(&registry, Operation::Generate), vec!["g"]);
    assert!(registry.supports("e", Operation::Embed));
    assert!(!registry.supports("e", Operation::Generate));
}

#[test]
fn test_failure_threshold_marks_unhealthy() {
    let (registry, _) = registry(&["a"]);

    assert!(!registry.record_failure("a", "boom").unwrap());
    assert!(!registry.record_failure("a", "boom").unwrap());
    assert!(registry.instance("a").unwrap().healthy);

    assert!(registry.record_failure("a", "boom").unwrap());
    let instance = registry.instance("a").unwrap();
    assert!(!instance.healthy);
    assert_eq!(instance.consecutive_failures, 3);
    assert_eq!(instance.last_error.as_deref(), Some("boom"));
}

#[test]
fn test_failures_lower_score_before_threshold() {
    let (registry, _) = registry(&["a", "b"]);
    registry.record_failure("a", "flaky").unwrap();

    assert!(registry.score("a").unwrap() < registry.score("b").unwrap());
    assert_eq!(candidate_ids(&registry, Operation::Embed), vec!["b", "a"]);
}

#[test]
fn test_min_health_score_excludes_rather_than_downweights() {
    let (members, _) = members(&["a", "b"]);
    let config = RegistryConfig::default().min_health_score(0.95);
    let registry = InstanceRegistry::new(config, members, None).unwrap();
    registry.record_failure("a", "flaky").unwrap();

    assert_eq!(candidate_ids(&registry, Operation::Embed), vec!["b"]);
}

#[test]
fn test_record_success_recovers_and_resets() {
    let (registry, _) = registry(&["a"]);
    registry.set_health("a", false).unwrap();
    registry.record_failure("a", "x").unwrap();

    registry.record_success("a", Duration::from_millis(10)).unwrap();
    let instance = registry.instance("a").unwrap();
    assert!(instance.healthy);
    assert_eq!(instance.consecutive_failures, 0);
    assert!(instance.last_error.is_none());
}

#[test]
fn test_latency_moving_average() {
    let (registry, _) = registry(&["a"]);
    registry.record_success("a", Duration::from_millis(100)).unwrap();
    registry.record_success("a", Duration::from_millis(200)).unwrap();

    let avg = registry.instance("a").unwrap().avg_latency_ms;
    assert!((avg - 130.0).abs() < 1.0, "expected EWMA ~130ms, got {avg}");
}

#[test]
fn test_unknown_instance_errors() {
    let (registry, _) = registry(&["a"]);
    assert!(matches!(
        registry.set_health("zz", true),
        Err(RegistryError::UnknownInstance { .. })
    ));
    assert!(registry.score("zz").is_none());
}

#[test]
fn test_health_aggregate() {
    let (registry, _) = registry(&["a", "b"]);
    assert_eq!(registry.health(), RegistryHealth::Healthy { total: 2 });

    registry.set_health("a", false).unwrap();
    assert_eq!(
        registry.health(),
        RegistryHealth::Degraded { healthy: 1, total: 2 }
    );

    registry.set_health("b", false).unwrap();
    assert_eq!(registry.health(), RegistryHealth::AllUnhealthy { total: 2 });
    assert!(registry.candidates(Operation::Generate).is_empty());
}

#[test]
fn test_snapshot_scores_are_fresh() {
    let (registry, _) = registry(&["a", "b"]);
    registry.set_health("b", false).unwrap();

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot[0].score > 0.0);
    assert_eq!(snapshot[1].score, 0.0);
}

#[tokio::test]
async fn test_probe_success_records_latency() {
    let (registry, mocks) = registry(&["a"]);
    let result = registry.probe("a").await.unwrap();

    assert!(result.is_healthy());
    assert_eq!(mocks[0].health_calls(), 1);
    let instance = registry.instance("a").unwrap();
    assert!(instance.last_checked_at.is_some());
    assert_eq!(instance.total_successes, 1);
}

#[tokio::test]
async fn test_probe_failures_reach_threshold() {
    let (registry, mocks) = registry(&["a"]);
    mocks[0].set_down(true);

    for expected_failures in 1..=2 {
        match registry.probe("a").await.unwrap() {
            HealthResult::Unhealthy {
                consecutive_failures,
                still_healthy,
                ..
            } => {
                assert_eq!(consecutive_failures, expected_failures);
                assert!(still_healthy);
            }
            other => panic!("expected unhealthy probe, got {other:?}"),
        }
    }

    match registry.probe("a").await.unwrap() {
        HealthResult::Unhealthy { still_healthy, .. } => assert!(!still_healthy),
        other => panic!("expected unhealthy probe, got {other:?}"),
    }
    assert!(!registry.instance("a").unwrap().healthy);

    mocks[0].set_down(false);
    assert!(registry.probe("a").await.unwrap().is_healthy());
    assert!(registry.instance("a").unwrap().healthy);
}

#[tokio::test]
async fn test_probe_timeout_counts_as_failure() {
    let backend = Arc::new(MockModelBackend::new("slow").with_latency(Duration::from_millis(300)));
    let registry = InstanceRegistry::new(
        RegistryConfig::default().probe_timeout(Duration::from_millis(20)),
        vec![(
            InstanceSpec::new("slow", "http://slow", InstanceKind::Both),
            backend as Arc<dyn ModelBackend>,
        )],
        None,
    )
    .unwrap();

    match registry.probe("slow").await.unwrap() {
        HealthResult::Unhealthy { reason, .. } => assert!(reason.contains("timed out")),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_probe_unknown_instance() {
    let (registry, _) = registry(&["a"]);
    assert!(registry.probe("nope").await.is_err());
}

#[tokio::test]
async fn test_probe_all_covers_every_instance() {
    let (registry, mocks) = registry(&["a", "b", "c"]);
    mocks[1].set_down(true);

    let results = registry.probe_all().await;
    assert_eq!(results.len(), 3);
    let healthy: Vec<_> = results
        .iter()
        .filter(|(_, r)| r.is_healthy())
        .map(|(id, _)| id.as_str())
        .collect();
    assert_eq!(healthy, vec!["a", "c"]);
}

#[tokio::test]
async fn test_health_monitor_marks_down_instance_unhealthy() {
    let (members, mocks) = members(&["a", "b"]);
    let config = RegistryConfig::default().check_interval(Duration::from_millis(10));
    let registry = Arc::new(InstanceRegistry::new(config, members, None).unwrap());
    mocks[0].set_down(true);

    let monitor = HealthMonitor::new(Arc::clone(&registry));
    let handle = monitor.start();
    assert!(monitor.is_running());

    let mut marked = false;
    for _ in 0..100 {
        if !registry.instance("a").unwrap().healthy {
            marked = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(marked, "monitor should mark the down instance unhealthy");
    assert!(registry.instance("b").unwrap().healthy);

    monitor.stop();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("monitor should stop")
        .unwrap();
    assert!(!monitor.is_running());
}

#[tokio::test]
async fn test_health_monitor_start_is_idempotent() {
    let (registry, _) = registry(&["a"]);
    let monitor = HealthMonitor::new(Arc::new(registry));
    let first = monitor.start();
    let second = monitor.start();

    second.await.unwrap();
    assert!(monitor.is_running());

    monitor.stop();
    first.await.unwrap();
}
