#![allow(missing_docs)]
//! Sample-driven UI updates through the limiter

use assert_matches::assert_matches;
use friendify_app::AppError;
use friendify_core::{DistanceDirectionState, LimiterPolicy};
use friendify_ranging::RangingCapability;
use friendify_testkit::{fixtures, Harness};
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(100);

fn coalescing(policy: LimiterPolicy) -> Harness {
    let config = fixtures::config(4).with_update_policy(policy, INTERVAL);
    let mut harness = Harness::with_config(config, RangingCapability::Supported);
    harness.connect();
    harness.peer_connected(1);
    harness.receive_credential(1);
    harness
}

#[tokio::test(start_paused = true)]
async fn test_debounced_samples_publish_the_last_one() {
    let mut harness = coalescing(LimiterPolicy::Debounce);

    for distance in [3.0, 2.0, 1.0] {
        harness.sample(1, fixtures::far_ahead(distance));
        tokio::time::sleep(INTERVAL / 4).await;
    }
    // The table is current even while the view waits
    assert_eq!(harness.session(1).unwrap().last_distance, Some(1.0));
    assert_eq!(harness.view().peers()[0].distance, None);

    tokio::time::sleep(INTERVAL * 2).await;
    assert_eq!(harness.view().peers()[0].distance, Some(1.0));
    assert_eq!(
        harness.view().distance_direction_state(),
        DistanceDirectionState::NotCloseUpInView
    );
}

#[tokio::test(start_paused = true)]
async fn test_throttled_samples_publish_the_first_one() {
    let mut harness = coalescing(LimiterPolicy::Throttle);

    harness.sample(1, fixtures::far_ahead(3.0));
    harness.sample(1, fixtures::far_ahead(2.0));
    tokio::time::sleep(INTERVAL / 2).await;
    assert_eq!(harness.view().peers()[0].distance, Some(3.0));

    tokio::time::sleep(INTERVAL).await;
    harness.sample(1, fixtures::far_ahead(1.0));
    tokio::time::sleep(INTERVAL / 2).await;
    assert_eq!(harness.view().peers()[0].distance, Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_publish_cancels_pending_sample() {
    let mut harness = coalescing(LimiterPolicy::Debounce);

    harness.sample(1, fixtures::close_left());
    harness.peer_disconnected(1);
    tokio::time::sleep(INTERVAL * 2).await;

    assert!(harness.view().peers().is_empty());
    assert_eq!(
        harness.view().distance_direction_state(),
        DistanceDirectionState::Unknown
    );
}

#[test]
fn test_update_policy_without_runtime_is_rejected() {
    let config = fixtures::config(4).with_update_policy(LimiterPolicy::Throttle, INTERVAL);
    assert_matches!(
        Harness::try_with_config(config, RangingCapability::Supported),
        Err(AppError::RuntimeRequired {
            policy: LimiterPolicy::Throttle
        })
    );
}

#[test]
fn test_samples_can_be_driven_from_outside_the_runtime() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let mut harness = {
        let _entered = runtime.enter();
        coalescing(LimiterPolicy::Throttle)
    };

    // This thread is no longer inside the runtime
    harness.sample(1, fixtures::far_ahead(2.0));
    runtime.block_on(async { tokio::time::sleep(INTERVAL / 10).await });
    assert_eq!(harness.view().peers()[0].distance, Some(2.0));
}
