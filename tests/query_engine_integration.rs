//! End-to-end tests for the query engine
//!
//! Exercises the full call contract over a small synthetic namespace:
//! 1. Filtering (identity, soundness, relative time, dates)
//! 2. Scalar aggregation
//! 3. Ranged and discrete-key histograms in sum and find mode
//! 4. Conditional pruning, scalar and vector
//! 5. Path export
//! 6. Snapshots (duplicate ids, concurrent refresh)
//! 7. Error taxonomy

use namespace_query::aggregation::{Histogram, NO_MAPPING, SPACE_SIZE};
use namespace_query::engine::{FixedClock, QueryEngine, Transforms};
use namespace_query::types::{DirAttrs, FileAttrs, Record};
use namespace_query::{QueryError, Subset};

const NOW: i64 = 1_700_000_000_000;
const MINUTE: i64 = 60 * 1000;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

// ============================================================================
// Fixtures
// ============================================================================

fn engine_with(records: Vec<Record>) -> QueryEngine {
    QueryEngine::builder()
        .with_clock(FixedClock(NOW))
        .with_records(records)
        .build()
        .expect("engine should build")
}

/// Two users' home trees plus a shared warehouse
fn namespace() -> Vec<Record> {
    let mut quota = DirAttrs::default();
    quota.has_quota = true;

    vec![
        Record::directory(1, "/user", DirAttrs::default()).with_owner("hdfs", "supergroup"),
        Record::directory(2, "/user/alice", quota.clone()).with_owner("alice", "staff"),
        Record::directory(3, "/user/bob", DirAttrs::default()).with_owner("bob", "staff"),
        Record::directory(4, "/warehouse", quota).with_owner("hive", "hadoop"),
        Record::file(10, "/user/alice/notes.txt", FileAttrs::new(10, 3, 128 * 1024 * 1024))
            .with_owner("alice", "staff")
            .with_times(NOW - 30 * MINUTE, NOW - 30 * MINUTE),
        Record::file(11, "/user/alice/events.json", FileAttrs::new(2_000_000, 3, 128 * 1024 * 1024))
            .with_owner("alice", "staff")
            .with_times(NOW - 2 * HOUR, NOW - 2 * HOUR),
        Record::file(12, "/user/bob/core.dump", FileAttrs::new(5_000_000_000, 2, 128 * 1024 * 1024))
            .with_owner("bob", "staff")
            .with_times(NOW - 40 * DAY, NOW - 40 * DAY)
            .with_storage_policy(2),
        Record::file(13, "/warehouse/t1/part-0.parquet", FileAttrs::new(700, 3, 128 * 1024 * 1024))
            .with_owner("hive", "hadoop")
            .with_times(NOW - 3 * DAY, NOW - 3 * DAY)
            .with_storage_policy(7),
        Record::file(14, "/warehouse/t1/part-1.parquet", FileAttrs::new(900, 1, 128 * 1024 * 1024))
            .with_owner("hive", "hadoop")
            .with_times(NOW - 3 * DAY, NOW - 3 * DAY)
            .with_storage_policy(7),
    ]
}

fn ids(subset: &Subset) -> Vec<i64> {
    subset.ids()
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn test_empty_filter_is_identity() {
    let engine = engine_with(namespace());
    let all = engine.set("all").unwrap();
    let none: [&str; 0] = [];
    let filtered = engine.combined_filter(&all, &none, &none).unwrap();
    assert_eq!(ids(&filtered), ids(&all));
}

#[test]
fn test_single_filter_is_sound_and_complete() {
    let engine = engine_with(namespace());
    let all = engine.set("all").unwrap();
    let filtered = engine.combined_filter(&all, &["fileSize"], &["gte:1000"]).unwrap();

    for record in all.iter() {
        assert_eq!(
            filtered.contains(record.id),
            record.file_size() >= 1000,
            "record {} misclassified",
            record.path
        );
    }
    assert_eq!(ids(&filtered), vec![11, 12]);
}

#[test]
fn test_conjunction_of_mixed_kinds() {
    let engine = engine_with(namespace());
    let files = engine.set("files").unwrap();
    let filtered = engine
        .combined_filter(
            &files,
            &["user", "path", "isUnderConstruction"],
            &["eq:alice", "endsWith:.json", "eq:false"],
        )
        .unwrap();
    assert_eq!(ids(&filtered), vec![11]);
}

#[test]
fn test_relative_time_filter() {
    let engine = engine_with(namespace());
    let files = engine.set("files").unwrap();

    let recent = engine.combined_filter(&files, &["modTime"], &["hoursAgo:1"]).unwrap();
    assert!(recent.contains(10));
    assert!(!recent.contains(11));

    let stale = engine.combined_filter(&files, &["modTime"], &["olderThanDays:30"]).unwrap();
    assert_eq!(ids(&stale), vec![12]);
}

#[test]
fn test_date_filter() {
    let engine = engine_with(namespace());
    let files = engine.set("files").unwrap();
    // NOW is 11/14/2023 22:13 UTC; 40 days earlier is 10/05/2023
    let old = engine
        .combined_filter(&files, &["modDate"], &["dateLt:11/01/2023"])
        .unwrap();
    assert_eq!(ids(&old), vec![12]);
}

#[test]
fn test_find_filter_returns_single_record() {
    let engine = engine_with(namespace());
    let files = engine.set("files").unwrap();
    let largest = engine.find_filter(&files, "max:diskspaceConsumed").unwrap();
    assert_eq!(ids(&largest), vec![12]);
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn test_count_matches_cardinality() {
    let engine = engine_with(namespace());
    for set in engine.valid_sets() {
        let subset = engine.set(set).unwrap();
        assert_eq!(engine.sum(&subset, "count").unwrap(), subset.len() as i64);
    }
    assert_eq!(engine.sum(&Subset::empty(), "count").unwrap(), 0);
}

#[test]
fn test_file_size_ignores_directories() {
    let engine = engine_with(namespace());
    let all = engine.set("all").unwrap();
    let expected: i64 = 10 + 2_000_000 + 5_000_000_000 + 700 + 900;
    assert_eq!(engine.sum(&all, "fileSize").unwrap(), expected);

    let dirs = engine.set("dirs").unwrap();
    assert_eq!(engine.sum(&dirs, "fileSize").unwrap(), 0);
    assert_eq!(engine.sum(&dirs, "memoryConsumed").unwrap(), 4 * 100);
}

// ============================================================================
// Histograms
// ============================================================================

#[test]
fn test_histogram_totals_match_sum() {
    let engine = engine_with(namespace());
    let all = engine.set("all").unwrap();

    for aggregation in ["count", "fileSize", "diskspaceConsumed", "numBlocks", "memoryConsumed"] {
        let expected = engine.sum(&all, aggregation).unwrap();
        let by_size = engine.file_size_histogram(&all, aggregation, None).unwrap();
        let by_memory = engine.memory_histogram(&all, aggregation, None).unwrap();
        let by_age = engine.mod_time_histogram(&all, aggregation, None, "years").unwrap();
        let by_user = engine.owner_histogram(&all, aggregation, None).unwrap();
        for h in [by_size, by_memory, by_age, by_user] {
            assert_eq!(h.total(), expected, "{aggregation}");
        }
    }
}

#[test]
fn test_file_size_scenario() {
    let engine = engine_with(vec![
        Record::file(1, "/a", FileAttrs::new(10, 1, 128)),
        Record::file(2, "/b", FileAttrs::new(2_000_000, 1, 128)),
        Record::file(3, "/c", FileAttrs::new(5_000_000_000, 1, 128)),
    ]);
    let files = engine.set("files").unwrap();
    let h = engine.file_size_histogram(&files, "fileSize", None).unwrap();

    assert_eq!(h.labels(), SPACE_SIZE.labels());
    let populated: Vec<(&str, &i64)> = h.iter().filter(|(_, v)| **v != 0).collect();
    assert_eq!(populated, vec![("1KB", &10), ("32MB", &2_000_000), ("10GB", &5_000_000_000)]);
    assert_eq!(h.total(), 5_002_000_010);
}

#[test]
fn test_by_user_scenario() {
    let users = ["ann", "ben", "cat", "dan", "eve"];
    let records = (0..10)
        .map(|i| Record::file(i, format!("/f{i}"), FileAttrs::new(1, 1, 1)).with_owner(users[i as usize % 5], "g"))
        .collect();
    let engine = engine_with(records);
    let all = engine.set("all").unwrap();

    let h = engine.owner_histogram(&all, "count", None).unwrap();
    assert_eq!(h.len(), 5);
    assert!(!h.contains_key(NO_MAPPING));
    assert_eq!(h.total(), 10);
}

#[test]
fn test_avg_find_mode_floors() {
    let engine = engine_with(namespace());
    let files = engine.set("files").unwrap();
    let h = engine.owner_histogram(&files, "count", Some("avg:fileSize")).unwrap();
    // alice: (10 + 2_000_000) / 2, hive: (700 + 900) / 2
    assert_eq!(h.get("alice"), Some(&1_000_005));
    assert_eq!(h.get("hive"), Some(&800));

    let ranged = engine.file_size_histogram(&files, "count", Some("avg:fileSize")).unwrap();
    assert_eq!(ranged.get("1TB"), Some(&0));
}

#[test]
fn test_discrete_dimensions() {
    let engine = engine_with(namespace());
    let all = engine.set("all").unwrap();

    let parents = engine.parent_dir_histogram(&all, 1, "count", None).unwrap();
    assert_eq!(parents.labels(), vec!["/user", "/warehouse"]);

    // Depth 0 is the root itself; a negative depth resolves nothing, in both modes
    let root = engine.parent_dir_histogram(&all, 0, "count", None).unwrap();
    assert_eq!(root.into_entries(), vec![("/".to_string(), 9)]);
    let root_max = engine.parent_dir_histogram(&all, 0, "count", Some("max:fileSize")).unwrap();
    assert_eq!(root_max.into_entries(), vec![("/".to_string(), 5_000_000_000)]);
    assert!(engine.parent_dir_histogram(&all, -3, "count", None).unwrap().is_empty());
    assert!(engine
        .parent_dir_histogram(&all, -3, "count", Some("max:fileSize"))
        .unwrap()
        .is_empty());

    let storage = engine.storage_type_histogram(&all, "fileSize", None).unwrap();
    assert_eq!(storage.labels(), vec!["UNSPECIFIED", "COLD", "HOT"]);
    assert_eq!(storage.get("HOT"), Some(&1_600));

    let replication = engine.replication_histogram(&all, "count", None, &Transforms::new()).unwrap();
    assert_eq!(replication.labels(), vec!["0", "1", "2", "3"]);

    let types = engine.file_type_histogram(&all, "count", None).unwrap();
    assert_eq!(types.labels(), vec!["PARQUET", "JSON", "TEXT", "OTHER"]);

    let dirs = engine.set("dirs").unwrap();
    let with_quota = engine.combined_filter(&dirs, &["hasQuota"], &["eq:true"]).unwrap();
    let quota = engine.dir_quota_histogram(&with_quota, "count", None).unwrap();
    assert_eq!(quota.labels(), vec!["/user/alice", "/warehouse"]);
}

// ============================================================================
// Pruning
// ============================================================================

#[test]
fn test_prune_keeps_satisfying_buckets() {
    let engine = engine_with(Vec::new());
    let h = Histogram::from_entries([("a", 500), ("b", 1500)]);
    let pruned = engine.remove_keys_on_conditional(h, "gte:1000").unwrap();
    assert_eq!(pruned, Histogram::from_entries([("b", 1500)]));
}

#[test]
fn test_prune_vector_histogram() {
    let engine = engine_with(namespace());
    let files = engine.set("files").unwrap();
    let counts = engine.owner_histogram(&files, "count", None).unwrap();
    let sizes = engine.owner_histogram(&files, "fileSize", None).unwrap();
    let combined = Histogram::zip_columns(&[counts, sizes]);

    let pruned = engine
        .remove_keys_on_conditional_vec(combined, "0:gte:2,1:lt:1000000")
        .unwrap();
    assert_eq!(pruned.labels(), vec!["hive"]);
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_dump_paths_sorted_and_limited() {
    let engine = engine_with(namespace());
    let files = engine.set("files").unwrap();

    let mut out = Vec::new();
    let written = engine.dump_paths(&files, None, &mut out).unwrap();
    assert_eq!(written, 5);
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);

    let mut out = Vec::new();
    assert_eq!(engine.dump_paths(&files, Some(2), &mut out).unwrap(), 2);
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_duplicate_ids_keep_named_sets_disjoint() {
    let mut records = namespace();
    // Same ids as existing records, opposite kinds
    records.push(Record::file(3, "/user/bob/shadow.txt", FileAttrs::new(99, 1, 128)));
    records.push(Record::directory(12, "/user/bob/core.dump", DirAttrs::default()));
    records.push(Record::file(10, "/user/alice/notes.txt", FileAttrs::new(10, 3, 128)));
    let engine = engine_with(records);

    let all = engine.set("all").unwrap();
    let files = engine.set("files").unwrap();
    let dirs = engine.set("dirs").unwrap();

    assert_eq!(all.len(), 9);
    assert_eq!(files.len() + dirs.len(), all.len());
    assert!(files.ids().iter().all(|id| !dirs.contains(*id)));
    assert!(dirs.contains(3));
    assert!(files.contains(12));
    assert_eq!(engine.sum(&all, "count").unwrap(), 9);
    assert_eq!(engine.stats().records, 9);
}

#[test]
fn test_concurrent_refresh_serves_latest_generation() {
    let engine = engine_with(namespace());

    std::thread::scope(|scope| {
        for t in 0..4 {
            let engine = &engine;
            scope.spawn(move || {
                for i in 0..20 {
                    let mut records = namespace();
                    records.truncate(1 + (t + i) % records.len());
                    engine.refresh(records);

                    // Every pinned snapshot stays internally consistent
                    let snapshot = engine.snapshot();
                    let files = snapshot.set("files").unwrap();
                    let dirs = snapshot.set("dirs").unwrap();
                    assert_eq!(files.len() + dirs.len(), snapshot.len());
                }
            });
        }
    });

    assert_eq!(engine.stats().generation, 80);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_error_taxonomy() {
    let engine = engine_with(namespace());
    let all = engine.set("all").unwrap();

    assert!(matches!(engine.set("links").unwrap_err(), QueryError::UnknownSet { .. }));
    assert!(matches!(
        engine.combined_filter(&all, &["colour"], &["eq:red"]).unwrap_err(),
        QueryError::UnresolvedFilter { .. }
    ));
    assert!(matches!(
        engine.combined_filter(&all, &["user"], &["gt:5"]).unwrap_err(),
        QueryError::UnsupportedOperator { .. }
    ));
    assert!(matches!(
        engine.combined_filter(&all, &["modDate"], &["dateEq:yesterday"]).unwrap_err(),
        QueryError::MalformedOperand { .. }
    ));
    assert!(matches!(
        engine.sum(&all, "median").unwrap_err(),
        QueryError::UnknownAggregation { .. }
    ));
    assert!(matches!(
        engine.owner_histogram(&all, "count", Some("mode:fileSize")).unwrap_err(),
        QueryError::UnknownFindMode { .. }
    ));

    let err = engine.combined_filter(&all, &["colour"], &["eq:red"]).unwrap_err();
    assert!(err.is_input_error());
    assert!(err.to_string().contains("colour"));
    assert!(err.to_string().contains("fileSize"));
}
