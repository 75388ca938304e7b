//! Integration tests for interest reconciliation against an in-memory transport.

mod common;

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;

use common::{bsm_body, key, manager_with, next_event, MockFactory};
use live_core::{IntersectionId, MessageKind, SubscriptionKey, ViewBounds};
use live_stream::StreamError;
use live_transport::{sample_directory, TransportError};

fn ids(values: &[i32]) -> Vec<IntersectionId> {
    values.iter().copied().map(IntersectionId).collect()
}

/// Viewport moves from 8801 to 8802: three opens, then three closes and three opens.
#[tokio::test]
async fn test_viewport_switch_8801_to_8802() {
    let factory = MockFactory::new();
    let manager = manager_with(&factory, sample_directory()).await;
    let mut events = manager.subscribe_events();

    let around_8801 = ViewBounds::from_edges(-104.887, 39.594, -104.885, 39.596);
    let around_8802 = ViewBounds::from_edges(-104.884, 39.594, -104.882, 39.596);

    let report = manager.view_bounds_changed(around_8801).await.unwrap();
    assert_eq!(report.added, ids(&[8801]));
    assert_eq!(report.opened, 3);
    assert_eq!(report.closed, 0);
    assert_eq!(
        manager.registry().keys().await,
        SubscriptionKey::all_for(IntersectionId(8801)).to_vec()
    );

    // Something from 8801 lands in the store first
    assert!(factory.push(key(8801, MessageKind::Bsm), bsm_body("v1", 3.0, Utc::now())).await);
    next_event(&mut events).await;
    assert!(manager.snapshot().await.contains_intersection(IntersectionId(8801)));

    let report = manager.view_bounds_changed(around_8802).await.unwrap();
    assert_eq!(report.removed, ids(&[8801]));
    assert_eq!(report.added, ids(&[8802]));
    assert_eq!(report.closed, 3);
    assert_eq!(report.opened, 3);

    let snapshot = manager.snapshot().await;
    assert!(!snapshot.contains_intersection(IntersectionId(8801)));
    for kind in MessageKind::ALL {
        assert_eq!(manager.registry().len_by_kind(kind).await, 1);
        assert!(manager.registry().contains(key(8802, kind)).await);
    }

    manager.shutdown().await;
}

#[tokio::test]
async fn test_reconcile_same_set_twice_is_noop() {
    let factory = MockFactory::new();
    let manager = manager_with(&factory, sample_directory()).await;

    let first = manager.set_interest(&ids(&[8801, 8802])).await.unwrap();
    assert_eq!(first.opened, 6);
    assert_eq!(factory.total_connects(), 6);

    let second = manager.set_interest(&ids(&[8802, 8801])).await.unwrap();
    assert!(second.is_noop());
    assert!(second.added.is_empty());
    assert!(second.removed.is_empty());
    assert_eq!(factory.total_connects(), 6);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_partial_open_failure_leaves_intersection_absent() {
    let factory = MockFactory::new();
    factory.fail(key(8803, MessageKind::Bsm));
    let manager = manager_with(&factory, sample_directory()).await;

    let report = manager.set_interest(&ids(&[8801, 8803])).await.unwrap();

    assert_eq!(report.failed_intersections(), ids(&[8803]));
    assert!(matches!(
        &report.failures[0],
        StreamError::Reconcile {
            intersection_id: IntersectionId(8803),
            source: TransportError::Connection(_),
        }
    ));
    // map + spat opened for 8803, then closed again
    assert_eq!(report.opened, 5);
    assert_eq!(report.closed, 2);
    for k in SubscriptionKey::all_for(IntersectionId(8803)) {
        assert!(!manager.registry().contains(k).await);
    }
    for k in SubscriptionKey::all_for(IntersectionId(8801)) {
        assert!(manager.registry().contains(k).await);
    }
    assert_eq!(
        manager.active_intersections().await,
        BTreeSet::from([IntersectionId(8801), IntersectionId(8803)])
    );

    // Still interesting on the next pass, so it is attempted again
    factory.heal(key(8803, MessageKind::Bsm));
    let retry = manager.set_interest(&ids(&[8801, 8803])).await.unwrap();
    assert_eq!(retry.retried, ids(&[8803]));
    assert_eq!(retry.opened, 3);
    assert!(!retry.has_failures());
    assert_eq!(manager.registry().len().await, 6);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_intersection_costs_one_connect_timeout() {
    let factory = MockFactory::new();
    for k in SubscriptionKey::all_for(IntersectionId(8804)) {
        factory.stall(k);
    }
    let manager = manager_with(&factory, sample_directory()).await;

    let started = tokio::time::Instant::now();
    let report = manager.set_interest(&ids(&[8801, 8804])).await.unwrap();
    let elapsed = started.elapsed();

    // Map/Spat/Bsm connects of 8804 time out together, not one after another
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(2), "pass took {:?}", elapsed);
    assert_eq!(report.failed_intersections(), ids(&[8804]));
    assert!(matches!(
        &report.failures[0],
        StreamError::Reconcile {
            source: TransportError::Timeout(1000),
            ..
        }
    ));
    assert_eq!(report.opened, 3);
    assert_eq!(manager.registry().len().await, 3);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_unknown_intersection_reported() {
    let factory = MockFactory::new();
    let manager = manager_with(&factory, sample_directory()).await;

    let report = manager.set_interest(&ids(&[8801, 9999])).await.unwrap();

    assert_eq!(report.opened, 3);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0],
        StreamError::UnknownIntersection(IntersectionId(9999))
    ));
    assert_eq!(
        manager.active_intersections().await,
        BTreeSet::from([IntersectionId(8801)])
    );

    manager.shutdown().await;
}

#[tokio::test]
async fn test_directory_update_applies_on_next_pass() {
    let factory = MockFactory::new();
    let manager = manager_with(&factory, Vec::new()).await;

    let report = manager.reconcile_with(|_| true).await.unwrap();
    assert!(report.is_noop());

    manager.update_directory(sample_directory()).await;
    let report = manager.reconcile_with(|_| true).await.unwrap();
    assert_eq!(report.added.len(), 6);
    assert_eq!(manager.registry().len().await, 18);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let factory = MockFactory::new();
    let manager = manager_with(&factory, sample_directory()).await;
    manager.set_interest(&ids(&[8801, 8802])).await.unwrap();
    manager.start_publisher().await.unwrap();

    manager.shutdown().await;

    assert!(manager.registry().is_empty().await);
    assert!(!manager.is_publishing().await);
    assert!(manager.active_intersections().await.is_empty());
    assert!(matches!(
        manager.set_interest(&ids(&[8801])).await,
        Err(StreamError::Shutdown)
    ));
    assert!(matches!(
        manager.start_publisher().await,
        Err(StreamError::Shutdown)
    ));

    // Second call is harmless
    manager.shutdown().await;
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// After any churn sequence, open subscriptions per kind equal the active set size.
    #[test]
    fn churn_keeps_one_subscription_per_kind(
        passes in proptest::collection::vec(
            proptest::collection::btree_set(8801..=8806i32, 0..=6),
            1..8,
        )
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let observed = runtime.block_on(async {
            let factory = MockFactory::new();
            let manager = manager_with(&factory, sample_directory()).await;
            let mut observed = Vec::new();

            for pass in &passes {
                let wanted: Vec<IntersectionId> = pass.iter().copied().map(IntersectionId).collect();
                manager.set_interest(&wanted).await.unwrap();

                let mut per_kind = Vec::new();
                for kind in MessageKind::ALL {
                    per_kind.push(manager.registry().len_by_kind(kind).await);
                }
                let active = manager.active_intersections().await;
                observed.push((pass.len(), per_kind, active.len()));
            }

            manager.shutdown().await;
            observed
        });

        for (expected, per_kind, active) in observed {
            prop_assert_eq!(active, expected);
            for count in per_kind {
                prop_assert_eq!(count, expected);
            }
        }
    }
}
