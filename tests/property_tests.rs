//! Property Tests for Filtering, Aggregation and Histograms
//!
//! Uses property-based testing (proptest) to check the engine's algebraic
//! guarantees over arbitrary namespaces: filters are sound and complete,
//! histogram buckets partition their input, parallel and sequential
//! execution agree, pruning keeps exactly the satisfying buckets, and
//! named sets stay disjoint even when record ids collide.

use namespace_query::aggregation::{Histogram, HistogramEngine, Reduction, SPACE_SIZE};
use namespace_query::config::{EngineConfig, ParallelConfig};
use namespace_query::engine::{FixedClock, QueryEngine};
use namespace_query::types::{DirAttrs, FileAttrs, Record};
use namespace_query::{Aggregation, Subset};
use proptest::prelude::*;

const NOW: i64 = 1_700_000_000_000;

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Strategy for file sizes spread across every size bucket
fn file_size() -> impl Strategy<Value = i64> {
    prop_oneof![
        Just(0i64),
        0i64..2048,
        0i64..(64 << 20),
        0i64..(2i64 << 40),
    ]
}

/// Strategy for a namespace of files and directories with unique ids
fn namespace(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(
        (
            any::<bool>(),
            file_size(),
            1u16..4,
            0usize..4,
            0i64..(400 * 24 * 60 * 60 * 1000),
        ),
        0..max,
    )
    .prop_map(|entries| {
        let users = ["alice", "bob", "carol", "dave"];
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (is_dir, size, replication, user, age))| {
                let path = format!("/d{}/n{}", i % 7, i);
                let record = if is_dir {
                    Record::directory(i as i64, path, DirAttrs::default())
                } else {
                    Record::file(i as i64, path, FileAttrs::new(size, replication, 128 << 20))
                };
                record
                    .with_owner(users[user], "staff")
                    .with_times(NOW - age, NOW - age)
            })
            .collect()
    })
}

fn engine(records: Vec<Record>, parallel: ParallelConfig) -> QueryEngine {
    let mut config = EngineConfig::default();
    config.parallel = parallel;
    config.monitoring.metrics_enabled = false;
    QueryEngine::builder()
        .with_clock(FixedClock(NOW))
        .with_records(records)
        .with_config(config)
        .build()
        .expect("engine should build")
}

fn forced_parallel() -> ParallelConfig {
    ParallelConfig::default().with_threshold(0).with_morsel_size(64)
}

// =============================================================================
// Filtering
// =============================================================================

mod filtering {
    use super::*;

    proptest! {
        /// A long comparison keeps exactly the records satisfying it
        #[test]
        fn long_filter_is_sound_and_complete(
            records in namespace(200),
            threshold in 0i64..(1i64 << 30),
        ) {
            let engine = engine(records, ParallelConfig::default());
            let all = engine.set("all").unwrap();
            let spec = format!("gt:{threshold}");
            let filtered = engine.combined_filter(&all, &["fileSize"], &[spec.as_str()]).unwrap();

            for record in all.iter() {
                prop_assert_eq!(filtered.contains(record.id), record.file_size() > threshold);
            }
        }

        /// Parallel retrieval returns the same records in the same order
        #[test]
        fn parallel_filter_matches_sequential(
            records in namespace(400),
            days in 1i64..400,
        ) {
            let spec = format!("daysAgo:{days}");
            let sequential = engine(records.clone(), ParallelConfig::sequential());
            let parallel = engine(records, forced_parallel());

            let a = sequential
                .combined_filter(&sequential.set("all").unwrap(), &["accessTime"], &[spec.as_str()])
                .unwrap();
            let b = parallel
                .combined_filter(&parallel.set("all").unwrap(), &["accessTime"], &[spec.as_str()])
                .unwrap();
            prop_assert_eq!(a.ids(), b.ids());
        }
    }
}

// =============================================================================
// Aggregation and Histograms
// =============================================================================

mod histograms {
    use super::*;

    proptest! {
        /// Sum-mode buckets partition the input: totals match the scalar sum
        #[test]
        fn histogram_total_matches_sum(records in namespace(300)) {
            let engine = engine(records, ParallelConfig::default());
            let all = engine.set("all").unwrap();

            for aggregation in ["count", "fileSize", "numReplicas", "memoryConsumed"] {
                let expected = engine.sum(&all, aggregation).unwrap();
                let ranged = engine.file_size_histogram(&all, aggregation, None).unwrap();
                let by_age = engine.access_time_histogram(&all, aggregation, None, "months").unwrap();
                let by_user = engine.owner_histogram(&all, aggregation, None).unwrap();
                prop_assert_eq!(ranged.total(), expected);
                prop_assert_eq!(by_age.total(), expected);
                prop_assert_eq!(by_user.total(), expected);
            }
        }

        /// Every find mode gives the same buckets with or without fan-out
        #[test]
        fn find_modes_are_order_independent(records in namespace(400)) {
            let sequential = engine(records.clone(), ParallelConfig::sequential());
            let parallel = engine(records, forced_parallel());
            let a_all = sequential.set("all").unwrap();
            let b_all = parallel.set("all").unwrap();

            for find in ["min:fileSize", "max:modTime", "avg:fileSize"] {
                let a = sequential.file_size_histogram(&a_all, "count", Some(find)).unwrap();
                let b = parallel.file_size_histogram(&b_all, "count", Some(find)).unwrap();
                prop_assert_eq!(a, b);

                let a = sequential.owner_histogram(&a_all, "count", Some(find)).unwrap();
                let b = parallel.owner_histogram(&b_all, "count", Some(find)).unwrap();
                prop_assert_eq!(a, b);
            }
        }

        /// Avg buckets store the floor of the mean
        #[test]
        fn avg_bucket_is_floor_of_mean(records in namespace(200)) {
            let engine = engine(records, ParallelConfig::default());
            let all = engine.set("all").unwrap();
            let h = engine.owner_histogram(&all, "count", Some("avg:fileSize")).unwrap();

            for (user, avg) in h.iter() {
                let sizes: Vec<i128> = all
                    .iter()
                    .filter(|r| r.user == user)
                    .map(|r| r.file_size() as i128)
                    .collect();
                let expected = sizes.iter().sum::<i128>().div_euclid(sizes.len() as i128);
                prop_assert_eq!(*avg as i128, expected);
            }
        }

        /// Discrete keys never include the sentinel and cover every resolvable record
        #[test]
        fn discrete_keys_cover_resolved_records(records in namespace(200), depth in 0i64..3) {
            let engine = engine(records, ParallelConfig::default());
            let all = engine.set("all").unwrap();
            let h = engine.parent_dir_histogram(&all, depth, "count", None).unwrap();

            let resolvable = all
                .iter()
                .filter(|r| r.ancestor_at_depth(depth as usize).is_some())
                .count() as i64;
            prop_assert_eq!(h.total(), resolvable);
            prop_assert!(!h.contains_key("NO_MAPPING"));
        }

        /// Ranged bucketing of a single value lands in exactly one bin
        #[test]
        fn ranged_value_lands_in_one_bin(size in file_size()) {
            let subset = Subset::from_records(vec![
                Record::file(1, "/x", FileAttrs::new(size, 1, 128)),
            ]);
            let h = HistogramEngine::default()
                .ranged(&subset, Record::file_size, &Reduction::sum(Aggregation::Count), &SPACE_SIZE)
                .unwrap();
            prop_assert_eq!(h.len(), SPACE_SIZE.len());
            prop_assert_eq!(h.iter().filter(|(_, v)| **v == 1).count(), 1);
        }
    }
}

// =============================================================================
// Snapshots
// =============================================================================

mod snapshots {
    use super::*;

    proptest! {
        /// Colliding ids resolve to their first occurrence in every named set
        #[test]
        fn named_sets_disjoint_with_colliding_ids(
            entries in prop::collection::vec((0i64..20, any::<bool>()), 0..100),
        ) {
            let records: Vec<Record> = entries
                .iter()
                .enumerate()
                .map(|(i, (id, is_dir))| {
                    let path = format!("/p/{i}");
                    if *is_dir {
                        Record::directory(*id, path, DirAttrs::default())
                    } else {
                        Record::file(*id, path, FileAttrs::new(1, 1, 128))
                    }
                })
                .collect();
            let engine = engine(records, ParallelConfig::default());
            let all = engine.set("all").unwrap();
            let files = engine.set("files").unwrap();
            let dirs = engine.set("dirs").unwrap();

            let mut first: Vec<(i64, bool)> = Vec::new();
            for (id, is_dir) in &entries {
                if !first.iter().any(|(seen, _)| seen == id) {
                    first.push((*id, *is_dir));
                }
            }

            prop_assert_eq!(all.ids(), first.iter().map(|(id, _)| *id).collect::<Vec<_>>());
            prop_assert_eq!(files.len() + dirs.len(), all.len());
            for (id, is_dir) in first {
                prop_assert_eq!(dirs.contains(id), is_dir);
                prop_assert_eq!(files.contains(id), !is_dir);
            }
        }
    }
}

// =============================================================================
// Pruning
// =============================================================================

mod pruning {
    use super::*;

    proptest! {
        /// Pruning keeps exactly the buckets satisfying the conjunction, in order
        #[test]
        fn prune_keeps_satisfying_buckets(
            values in prop::collection::vec(-5_000i64..5_000, 0..50),
            low in -5_000i64..5_000,
            high in -5_000i64..5_000,
        ) {
            let engine = engine(Vec::new(), ParallelConfig::default());
            let histogram: Histogram = values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("k{i}"), *v))
                .collect();

            let spec = format!("gte:{low};lt:{high}");
            let pruned = engine.remove_keys_on_conditional(histogram.clone(), &spec).unwrap();

            let expected: Vec<(String, i64)> = histogram
                .into_entries()
                .into_iter()
                .filter(|(_, v)| *v >= low && *v < high)
                .collect();
            prop_assert_eq!(pruned.into_entries(), expected);
        }
    }
}
