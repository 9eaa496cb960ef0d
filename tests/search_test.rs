//! End-to-end tests for the search orchestrator

mod common;

use common::{no_cache, orchestrator, orchestrator_with_cache, TestBucket, NA12878_KEYS};
use genomics_file_search::backends::memory::{Fault, InMemoryObjectStore, StoredObject};
use genomics_file_search::backends::BackendError;
use genomics_file_search::cache::CacheConfig;
use genomics_file_search::search::{SearchConfig, SearchConfigBuilder};
use genomics_file_search::{AssociationKind, BackendStatus, EngineError, FileType, Query};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

fn statuses(pairs: &[(&str, BackendStatus)]) -> BTreeMap<String, BackendStatus> {
    pairs.iter().map(|(id, s)| (id.to_string(), *s)).collect()
}

#[tokio::test]
async fn test_na12878_end_to_end() {
    let bucket = TestBucket::new("s3-a", NA12878_KEYS);
    let orchestrator = orchestrator([bucket.connector.clone()], SearchConfig::default());

    let response = orchestrator
        .search(Query::new(["NA12878"]).with_file_type(FileType::Bam))
        .await
        .unwrap();

    assert!(!response.from_cache);
    assert_eq!(response.total_groups, 3);
    assert_eq!(response.manifest.status("s3-a"), Some(BackendStatus::Ok));

    let top = &response.results[0];
    assert_eq!(top.group.primary.path, "project/NA12878.bam");
    assert_eq!(top.group.companions.len(), 1);
    assert_eq!(top.group.companions[0].association_kind, AssociationKind::Index);
    assert_eq!(top.group.companions[0].record.path, "project/NA12878.bam.bai");
    assert_eq!(top.group.primary.access_uri, "mem://s3-a-bucket/project/NA12878.bam");

    let fastq = response
        .results
        .iter()
        .find(|g| g.group.primary.file_type == FileType::Fastq)
        .unwrap();
    assert_eq!(fastq.group.primary.path, "project/NA12878_R1.fastq.gz");
    assert_eq!(
        fastq.group.companions_of_kind(AssociationKind::MatePair).count(),
        1
    );

    assert!(response
        .results
        .iter()
        .flat_map(|g| g.group.records())
        .all(|r| !r.path.contains("HG002")));

    for pair in response.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_scores_are_explained() {
    let bucket = TestBucket::new("s3-a", NA12878_KEYS);
    let orchestrator = orchestrator([bucket.connector.clone()], SearchConfig::default());

    let response = orchestrator
        .search(Query::new(["NA12878"]).with_file_type(FileType::Bam))
        .await
        .unwrap();

    for scored in &response.results {
        assert!((0.0..=1.0).contains(&scored.score));
        assert!((scored.score_breakdown.total() - scored.score).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_max_results_truncates_after_ranking() {
    let bucket = TestBucket::new("s3-a", NA12878_KEYS);
    let orchestrator = orchestrator([bucket.connector.clone()], SearchConfig::default());

    let response = orchestrator
        .search(
            Query::new(["NA12878"])
                .with_file_type(FileType::Bam)
                .with_max_results(1),
        )
        .await
        .unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.total_groups, 3);
    assert_eq!(response.results[0].group.primary.path, "project/NA12878.bam");
}

#[tokio::test]
async fn test_no_tag_calls_when_tag_search_disabled() {
    let bucket = TestBucket::new("s3-a", NA12878_KEYS);
    let config = SearchConfigBuilder::new().tag_search_enabled(false).build();
    let orchestrator = orchestrator([bucket.connector.clone()], config);

    let response = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    assert_eq!(response.total_groups, 3);
    assert_eq!(bucket.store.tag_calls(), 0);
}

#[tokio::test]
async fn test_no_tag_calls_when_every_path_is_confident() {
    let bucket = TestBucket::new(
        "s3-a",
        &["runs/NA12878.bam", "runs/NA12878.bam.bai", "runs/NA12878.cram"],
    );
    let orchestrator = orchestrator([bucket.connector.clone()], SearchConfig::default());

    let response = orchestrator.search(Query::new(["na12878"])).await.unwrap();

    assert_eq!(response.total_groups, 2);
    assert_eq!(bucket.store.tag_calls(), 0);
}

#[tokio::test]
async fn test_tags_find_records_with_opaque_paths() {
    let bucket = TestBucket::with_objects(
        "s3-a",
        [
            StoredObject::new("runs/run42.bam", 10)
                .with_tag("sample", "NA12878")
                .with_tag("assay", "wgs"),
            StoredObject::new("runs/run43.bam", 10).with_tag("sample", "HG002"),
        ],
    );
    let orchestrator = orchestrator([bucket.connector.clone()], SearchConfig::default());

    let response = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    assert_eq!(response.total_groups, 1);
    let primary = &response.results[0].group.primary;
    assert_eq!(primary.path, "runs/run42.bam");
    assert_eq!(
        primary.tags.as_ref().and_then(|t| t.get("sample")).map(String::as_str),
        Some("NA12878")
    );
    assert_eq!(bucket.store.tag_calls(), 1);
}

#[tokio::test]
async fn test_tag_batches_respect_the_cap() {
    let keys: Vec<String> = (0..10).map(|i| format!("misc/sample{i}.bam")).collect();
    let store = InMemoryObjectStore::new("s3-a-bucket").with_max_tag_batch(3);
    let bucket = TestBucket::from_store(
        "s3-a",
        store,
        keys.iter().map(|k| StoredObject::new(k.clone(), 1)),
    );
    let config = SearchConfigBuilder::new().max_tag_batch_size(3).build();
    let orchestrator = orchestrator([bucket.connector.clone()], config);

    let response = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    assert_eq!(response.manifest.status("s3-a"), Some(BackendStatus::Ok));
    assert_eq!(response.total_groups, 0);
    assert_eq!(bucket.store.tag_calls(), 4);
    assert!(bucket.store.faults().largest_tag_batch() <= 3);
}

#[tokio::test]
async fn test_tag_failure_keeps_path_matches() {
    let bucket = TestBucket::new("s3-a", &["runs/NA12878.bam", "runs/other.bam"]);
    let orchestrator = orchestrator([bucket.connector.clone()], SearchConfig::default());

    // Listing succeeds; only the tag call for runs/other.bam fails
    bucket
        .store
        .set_fault(Fault::FailTags(BackendError::unavailable("s3-a", "throttled")));
    let response = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    let report = response.manifest.get("s3-a").unwrap();
    assert_eq!(report.status, BackendStatus::Partial);
    assert_eq!(report.records_listed, 2);
    assert_eq!(response.total_groups, 1);
    assert_eq!(bucket.store.tag_calls(), 1);
}

#[tokio::test]
async fn test_one_failing_backend_degrades_the_response() {
    let a = TestBucket::new("a", &["x/NA12878.bam", "x/NA12878.bam.bai"]);
    let b = TestBucket::new("b", &["y/NA12878.bam"]);
    let c = TestBucket::new("c", &["z/NA12878.cram", "z/NA12878.cram.crai"]);
    b.store
        .set_fault(Fault::Fail(BackendError::unavailable("b", "connection refused")));

    let orchestrator = orchestrator(
        [a.connector.clone(), b.connector.clone(), c.connector.clone()],
        SearchConfig::default(),
    );
    let response = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    assert_eq!(
        response.manifest.statuses(),
        statuses(&[
            ("a", BackendStatus::Ok),
            ("b", BackendStatus::Error),
            ("c", BackendStatus::Ok),
        ])
    );
    assert!(response.manifest.is_degraded());
    assert!(response.manifest.get("b").unwrap().error.is_some());
    assert_eq!(response.total_groups, 2);
    assert!(response
        .results
        .iter()
        .all(|g| g.group.backend_id() != "b"));
}

#[tokio::test]
async fn test_same_path_in_two_backends_stays_separate() {
    let a = TestBucket::new("a", &["shared/NA12878.bam"]);
    let b = TestBucket::new("b", &["shared/NA12878.bam"]);
    let orchestrator = orchestrator(
        [a.connector.clone(), b.connector.clone()],
        SearchConfig::default(),
    );

    let response = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    assert_eq!(response.total_groups, 2);
    let mut backends: Vec<&str> = response.results.iter().map(|g| g.group.backend_id()).collect();
    backends.sort();
    assert_eq!(backends, vec!["a", "b"]);
}

#[tokio::test]
async fn test_blocking_backend_times_out_within_the_bound() {
    let a = TestBucket::new("a", &["x/NA12878.bam"]);
    let b = TestBucket::new("b", &["y/NA12878.bam"]);
    b.store.set_fault(Fault::Block);

    let orchestrator = orchestrator(
        [a.connector.clone(), b.connector.clone()],
        SearchConfig::default(),
    );
    let started = Instant::now();
    let response = orchestrator
        .search(Query::new(["NA12878"]).with_timeout(Duration::from_millis(300)))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(
        response.manifest.statuses(),
        statuses(&[("a", BackendStatus::Ok), ("b", BackendStatus::TimedOut)])
    );
    assert_eq!(response.total_groups, 1);
}

#[tokio::test]
async fn test_empty_ok_backend_keeps_search_alive_past_the_deadline() {
    let a = TestBucket::new("a", &[]);
    let b = TestBucket::new("b", &["y/NA12878.bam"]);
    b.store.set_fault(Fault::Block);

    let orchestrator = orchestrator(
        [a.connector.clone(), b.connector.clone()],
        SearchConfig::default(),
    );
    let response = orchestrator
        .search(Query::new(["NA12878"]).with_timeout(Duration::from_millis(300)))
        .await
        .unwrap();

    assert_eq!(
        response.manifest.statuses(),
        statuses(&[("a", BackendStatus::Ok), ("b", BackendStatus::TimedOut)])
    );
    assert_eq!(response.manifest.get("a").unwrap().records_listed, 0);
    assert_eq!(response.total_groups, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_backend_budget_is_enforced_per_backend() {
    let a = TestBucket::new("a", &["x/NA12878.bam"]);
    let b = TestBucket::new("b", &["y/NA12878.bam"]);
    b.store.set_fault(Fault::Delay(Duration::from_secs(30)));

    let config = SearchConfigBuilder::new()
        .backend_timeout(Duration::from_millis(200))
        .build();
    let orchestrator = orchestrator([a.connector.clone(), b.connector.clone()], config);

    let started = Instant::now();
    let response = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(response.manifest.status("b"), Some(BackendStatus::TimedOut));
    assert_eq!(response.manifest.status("a"), Some(BackendStatus::Ok));
}

#[tokio::test]
async fn test_timed_out_backend_keeps_records_listed_before_the_deadline() {
    let keys: Vec<String> = (0..4).map(|i| format!("runs/NA12878_{i}.cram")).collect();
    let bucket = TestBucket::with_objects("a", keys.iter().map(|k| StoredObject::new(k.clone(), 1)));
    bucket.store.set_fault(Fault::BlockAfterPages(2));

    let config = SearchConfigBuilder::new()
        .page_size(1)
        .backend_timeout(Duration::from_millis(300))
        .build();
    let orchestrator = orchestrator([bucket.connector.clone()], config);

    let response = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    let report = response.manifest.get("a").unwrap();
    assert_eq!(report.status, BackendStatus::TimedOut);
    assert_eq!(report.records_listed, 2);
    assert_eq!(response.total_groups, 2);
}

#[tokio::test]
async fn test_listing_failure_midway_is_partial() {
    let bucket = TestBucket::new(
        "a",
        &["runs/NA12878.bam", "runs/NA12878.cram", "runs/NA12878.vcf.gz"],
    );
    bucket.store.set_fault(Fault::FailAfterPages(1));

    let config = SearchConfigBuilder::new().page_size(1).build();
    let orchestrator = orchestrator([bucket.connector.clone()], config);

    let response = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    let report = response.manifest.get("a").unwrap();
    assert_eq!(report.status, BackendStatus::Partial);
    assert_eq!(report.records_listed, 1);
    assert!(report.error.is_some());
    assert_eq!(response.total_groups, 1);
}

#[tokio::test]
async fn test_all_backends_failing_is_an_error() {
    let a = TestBucket::new("a", &["x/NA12878.bam"]);
    let b = TestBucket::new("b", &["y/NA12878.bam"]);
    a.store
        .set_fault(Fault::Fail(BackendError::unavailable("a", "throttled")));
    b.store
        .set_fault(Fault::Fail(BackendError::unavailable("b", "throttled")));

    let orchestrator = orchestrator(
        [a.connector.clone(), b.connector.clone()],
        SearchConfig::default(),
    );
    let err = orchestrator
        .search(Query::new(["NA12878"]))
        .await
        .unwrap_err();

    match err {
        EngineError::NoBackendsAvailable { diagnostics } => {
            assert_eq!(
                diagnostics.statuses(),
                statuses(&[("a", BackendStatus::Error), ("b", BackendStatus::Error)])
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unknown_backend_selection_is_an_error() {
    let a = TestBucket::new("a", &["x/NA12878.bam"]);
    let orchestrator = orchestrator([a.connector.clone()], SearchConfig::default());

    let err = orchestrator
        .search(Query::new(["NA12878"]).with_backends(["missing"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::NoBackendsAvailable { ref diagnostics } if diagnostics.is_empty()
    ));
    assert_eq!(a.store.list_calls(), 0);
}

#[tokio::test]
async fn test_backend_allow_list() {
    let a = TestBucket::new("a", &["x/NA12878.bam"]);
    let b = TestBucket::new("b", &["y/NA12878.bam"]);
    let orchestrator = orchestrator(
        [a.connector.clone(), b.connector.clone()],
        SearchConfig::default(),
    );

    let response = orchestrator
        .search(Query::new(["NA12878"]).with_backends(["b"]))
        .await
        .unwrap();

    assert_eq!(response.manifest.len(), 1);
    assert_eq!(a.store.list_calls(), 0);
    assert_eq!(b.store.list_calls(), 1);
}

#[tokio::test]
async fn test_invalid_query_is_rejected_before_fan_out() {
    let a = TestBucket::new("a", &["x/NA12878.bam"]);
    let orchestrator = orchestrator([a.connector.clone()], SearchConfig::default());

    let err = orchestrator
        .search(Query::new(["NA12878"]).with_max_results(0))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(a.store.list_calls(), 0);
}

#[tokio::test]
async fn test_result_cache_hit_skips_backends_until_ttl() {
    let bucket = TestBucket::new("a", NA12878_KEYS);
    let cache = CacheConfig {
        result_cache_ttl_ms: 200,
        ..Default::default()
    };
    let orchestrator =
        orchestrator_with_cache([bucket.connector.clone()], SearchConfig::default(), cache);

    let first = orchestrator.search(Query::new(["NA12878"])).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(bucket.store.list_calls(), 1);

    // Same signature: case and term order do not matter
    let second = orchestrator.search(Query::new([" na12878 "])).await.unwrap();
    assert!(second.from_cache);
    assert_ne!(second.search_id, first.search_id);
    assert_eq!(second.results, first.results);
    assert_eq!(bucket.store.list_calls(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let third = orchestrator.search(Query::new(["NA12878"])).await.unwrap();
    assert!(!third.from_cache);
    assert_eq!(bucket.store.list_calls(), 2);
}

#[tokio::test]
async fn test_degraded_response_is_not_cached() {
    let a = TestBucket::new("a", &["x/NA12878.bam"]);
    let b = TestBucket::new("b", &["y/NA12878.bam"]);
    b.store
        .set_fault(Fault::Fail(BackendError::unavailable("b", "connection refused")));

    let orchestrator = orchestrator([a.connector.clone(), b.connector.clone()], SearchConfig::default());

    let first = orchestrator.search(Query::new(["NA12878"])).await.unwrap();
    assert_eq!(first.manifest.status("b"), Some(BackendStatus::Error));

    b.store.set_fault(Fault::None);
    let second = orchestrator.search(Query::new(["NA12878"])).await.unwrap();
    assert!(!second.from_cache);
    assert_eq!(second.manifest.status("b"), Some(BackendStatus::Ok));
    assert_eq!(second.total_groups, 2);
    assert_eq!(a.store.list_calls(), 2);

    let third = orchestrator.search(Query::new(["NA12878"])).await.unwrap();
    assert!(third.from_cache);
    assert_eq!(a.store.list_calls(), 2);
}

#[tokio::test]
async fn test_tag_cache_avoids_repeat_tag_calls() {
    let bucket = TestBucket::with_objects(
        "a",
        [StoredObject::new("runs/run42.bam", 10).with_tag("sample", "NA12878")],
    );
    let cache = CacheConfig {
        result_cache_ttl_ms: 0,
        ..Default::default()
    };
    let orchestrator =
        orchestrator_with_cache([bucket.connector.clone()], SearchConfig::default(), cache);

    orchestrator.search(Query::new(["NA12878"])).await.unwrap();
    orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    assert_eq!(bucket.store.list_calls(), 2);
    assert_eq!(bucket.store.tag_calls(), 1);
}

#[tokio::test]
async fn test_disabled_caches_always_reach_backends() {
    let bucket = TestBucket::new("a", NA12878_KEYS);
    let orchestrator =
        orchestrator_with_cache([bucket.connector.clone()], SearchConfig::default(), no_cache());

    orchestrator.search(Query::new(["NA12878"])).await.unwrap();
    let second = orchestrator.search(Query::new(["NA12878"])).await.unwrap();

    assert!(!second.from_cache);
    assert_eq!(bucket.store.list_calls(), 2);
}

#[tokio::test]
async fn test_empty_query_lists_everything() {
    let bucket = TestBucket::new("a", NA12878_KEYS);
    let orchestrator = orchestrator([bucket.connector.clone()], SearchConfig::default());

    let response = orchestrator.search(Query::new(Vec::<String>::new())).await.unwrap();

    // bam+bai, fastq pair, vcf+tbi, HG002 bam+bai
    assert_eq!(response.total_groups, 4);
    assert_eq!(bucket.store.tag_calls(), 0);
}

#[tokio::test]
async fn test_fastq_mates_rank_first_for_fastq_hint() {
    let bucket = TestBucket::new(
        "s3-a",
        &[
            "runs/NA12878_R1.fastq.gz",
            "runs/NA12878_R2.fastq.gz",
            "runs/HG002_R1.fastq.gz",
            "runs/HG002_R2.fastq.gz",
            "aln/NA12878.bam",
        ],
    );
    let orchestrator = orchestrator([bucket.connector.clone()], SearchConfig::default());

    let query = Query::new(["NA12878"]).with_file_type_hint("fastq").unwrap();
    let response = orchestrator.search(query).await.unwrap();

    let top = &response.results[0];
    assert_eq!(top.group.primary.path, "runs/NA12878_R1.fastq.gz");
    assert_eq!(top.group.companions.len(), 1);
    assert_eq!(top.group.companions[0].record.path, "runs/NA12878_R2.fastq.gz");
    assert_eq!(top.group.companions[0].association_kind, AssociationKind::MatePair);
    assert_eq!(top.score_breakdown.type_relevance.raw, 1.0);
    assert_eq!(top.score_breakdown.match_quality.raw, 1.0);

    assert_eq!(response.total_groups, 2);
    assert_eq!(response.results[1].group.primary.path, "aln/NA12878.bam");
    assert!(top.score > response.results[1].score);
}
