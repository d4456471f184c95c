//! Integration tests for the bounded-concurrency range scanner.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use mev_data::provider::ProviderError;
use mev_sim::{EngineConfig, EngineError};
use tokio_util::sync::CancellationToken;

/// A successful scan covers exactly the requested blocks, in any order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scan_covers_requested_range() {
    let provider = Arc::new(
        MockProvider::new(2_000)
            .with_block(mev_block(1_003))
            .with_block(mev_block(1_017))
            .with_delay(Duration::from_millis(2)),
    );
    let tracker = tracker(provider.clone());

    let result = tracker
        .scan_range(5, Some(1_000), Some(1_030), &CancellationToken::new())
        .await
        .expect("scan should succeed");

    let numbers: BTreeSet<u64> = result.blocks.iter().map(|b| b.block_number).collect();
    assert_eq!(numbers, (1_000..=1_030).collect());
    assert_eq!(result.blocks.len(), 31);
    assert_eq!(result.total_blocks, 31);
    assert_eq!(result.validator_index, 5);
    assert_eq!(result.from_block, 1_000);
    assert_eq!(result.to_block, 1_030);
    assert_eq!(result.mev_blocks, 2);
    assert!(approx_eq(result.total_reward, 0.02));
    assert_eq!(provider.block_calls(), 31);
    assert_eq!(provider.latest_calls(), 0);
}

/// A single-block range is valid.
#[tokio::test]
async fn single_block_range() {
    let provider = Arc::new(MockProvider::new(10).with_block(mev_block(7)));
    let result = tracker(provider)
        .scan_range(1, Some(7), Some(7), &CancellationToken::new())
        .await
        .expect("scan should succeed");

    assert_eq!(result.total_blocks, 1);
    assert_eq!(result.mev_blocks, 1);
    assert!(approx_eq(result.total_reward, 0.01));
}

/// Spans above 1000 are refused before the provider is touched.
#[tokio::test]
async fn oversized_range_makes_no_provider_calls() {
    let provider = Arc::new(MockProvider::new(5_000));
    let err = tracker(provider.clone())
        .scan_range(1, Some(0), Some(1_001), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::RangeTooLarge { span: 1_001, max: 1_000 });
    assert_eq!(provider.total_calls(), 0);
}

/// Inverted bounds are invalid input, also with zero provider calls.
#[tokio::test]
async fn inverted_range_is_invalid_input() {
    let provider = Arc::new(MockProvider::new(5_000));
    let err = tracker(provider.clone())
        .scan_range(1, Some(200), Some(100), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert_eq!(provider.total_calls(), 0);
}

/// Validator 5, blocks 100..=102, block 101 times out: the whole scan fails
/// and names block 101 instead of returning blocks 100 and 102.
#[tokio::test]
async fn one_failing_block_fails_the_scan() {
    let provider = Arc::new(
        MockProvider::new(200)
            .with_block(mev_block(100))
            .with_block(mev_block(102))
            .failing(101, ProviderError::Timeout),
    );

    let err = tracker(provider)
        .scan_range(5, Some(100), Some(102), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::ProviderUnavailable {
            block: Some(101),
            source: ProviderError::Timeout,
        }
    );
}

/// A provider that answers with an error is a data error, not unavailability.
#[tokio::test]
async fn missing_block_is_a_data_error() {
    let provider = Arc::new(MockProvider::new(200).failing(150, ProviderError::NotFound(150)));

    let err = tracker(provider)
        .scan_range(1, Some(140), Some(160), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ProviderData { block: Some(150), .. }));
}

/// No more than 10 blocks are ever in flight, whatever the range size.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrency_is_capped_at_ten() {
    let provider = Arc::new(MockProvider::new(1_000).with_delay(Duration::from_millis(10)));

    let result = tracker(provider.clone())
        .scan_range(1, Some(0), Some(99), &CancellationToken::new())
        .await
        .expect("scan should succeed");

    assert_eq!(result.total_blocks, 100);
    assert!(provider.peak_in_flight() <= 10, "peak {}", provider.peak_in_flight());
    assert!(provider.peak_in_flight() > 1, "scan never ran in parallel");
}

/// A lower configured cap is honored too.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn configured_concurrency_is_honored() {
    let provider = Arc::new(MockProvider::new(1_000).with_delay(Duration::from_millis(5)));
    let config = EngineConfig {
        max_concurrency: 3,
        ..EngineConfig::default()
    };

    tracker_with(provider.clone(), config)
        .scan_range(1, Some(0), Some(29), &CancellationToken::new())
        .await
        .expect("scan should succeed");

    assert!(provider.peak_in_flight() <= 3);
}

/// Cancelling mid-scan returns promptly, even with a unit that never finishes,
/// and no fetch is issued afterwards.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancellation_stops_the_scan() {
    let provider = Arc::new(
        MockProvider::new(1_000)
            .hanging(3)
            .with_delay(Duration::from_millis(20)),
    );
    let tracker = tracker(provider.clone());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        tracker.scan_range(1, Some(0), Some(500), &cancel),
    )
    .await
    .expect("scan must observe cancellation promptly");

    assert_eq!(outcome.unwrap_err(), EngineError::Cancelled);
    let calls_at_cancel = provider.block_calls();
    assert!(calls_at_cancel >= 1);
    assert!(
        calls_at_cancel < 501,
        "dispatch continued after cancel: {calls_at_cancel} fetches"
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(provider.block_calls(), calls_at_cancel);
}

/// Cancellation wins over a unit failure detected at the same time.
#[tokio::test]
async fn cancellation_takes_precedence() {
    let provider = Arc::new(MockProvider::new(1_000).failing(10, ProviderError::Timeout));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = tracker(provider)
        .scan_range(1, Some(10), Some(20), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::Cancelled);
}

/// Without bounds the scan covers latest-100 ..= latest.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn missing_bounds_default_to_recent_blocks() {
    let provider = Arc::new(MockProvider::new(500));

    let result = tracker(provider.clone())
        .scan_range(3, None, None, &CancellationToken::new())
        .await
        .expect("scan should succeed");

    assert_eq!(result.from_block, 400);
    assert_eq!(result.to_block, 500);
    assert_eq!(result.total_blocks, 101);
    assert_eq!(provider.latest_calls(), 1);
    assert_eq!(provider.block_calls(), 101);
}

/// Only the missing bound is defaulted.
#[tokio::test]
async fn explicit_lower_bound_with_default_upper() {
    let provider = Arc::new(MockProvider::new(60));

    let result = tracker(provider)
        .scan_range(3, Some(50), None, &CancellationToken::new())
        .await
        .expect("scan should succeed");

    assert_eq!((result.from_block, result.to_block), (50, 60));
}

/// Near genesis the default lower bound saturates at zero.
#[tokio::test]
async fn default_lower_bound_saturates() {
    let provider = Arc::new(MockProvider::new(20));

    let result = tracker(provider)
        .scan_range(3, None, None, &CancellationToken::new())
        .await
        .expect("scan should succeed");

    assert_eq!(result.from_block, 0);
    assert_eq!(result.total_blocks, 21);
}

/// When the tip is needed and cannot be read, the scan fails without
/// fetching any block.
#[tokio::test]
async fn latest_block_failure_fails_defaulted_scan() {
    let provider = Arc::new(
        MockProvider::new(0).latest_failing(ProviderError::Transport("connection refused".into())),
    );

    let err = tracker(provider.clone())
        .scan_range(3, None, Some(10), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ProviderUnavailable { block: None, .. }));
    assert_eq!(provider.block_calls(), 0);
}

/// The single-block path reports opportunities and reward for one block.
#[tokio::test]
async fn detect_and_estimate_single_block() {
    let provider = Arc::new(MockProvider::new(100).with_block(mev_block(100)));

    let result = tracker(provider)
        .detect_and_estimate(100, &CancellationToken::new())
        .await
        .expect("analysis should succeed");

    assert_eq!(result.block_number, 100);
    assert_eq!(result.opportunities.len(), 1);
    assert!(approx_eq(result.validator_reward, 0.01));
}

#[tokio::test]
async fn detect_and_estimate_surfaces_provider_error() {
    let provider = Arc::new(MockProvider::new(100).failing(99, ProviderError::Rpc("bad".into())));

    let err = tracker(provider)
        .detect_and_estimate(99, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ProviderData { block: Some(99), .. }));
}
