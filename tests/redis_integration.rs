//! Integration tests against a live Redis instance.
//!
//! Ignored by default; run with a Redis at `REDIS_URL` (defaults to
//! `redis://127.0.0.1/`):
//!
//! ```text
//! cargo test -- --ignored
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tidegate::{
	BlockingRateLimiter, EventHooks, FailStrategy, RateLimiter, RateLimiterConfig,
};

fn redis_url() -> String {
	std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string())
}

/// Unique namespace per test run so reruns never see stale buckets.
fn namespace(test: &str) -> String {
	let nanos = std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap()
		.as_nanos();
	format!("tidegate-test-{test}-{nanos}")
}

fn config(rate: u32, per: u64, burst: u32, ns: &str) -> RateLimiterConfig {
	RateLimiterConfig::builder()
		.rate(rate)
		.per(per)
		.burst(burst)
		.namespace(ns)
		.build()
		.unwrap()
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn drains_and_denies_at_exhaustion() {
	let ns = namespace("drain");
	let limiter = RateLimiter::connect(&redis_url(), config(1, 3600, 5, &ns))
		.await
		.unwrap();

	for expected in [4, 3, 2, 1, 0] {
		let decision = limiter.allow("user:1").await.unwrap();
		assert!(decision.allowed());
		assert_eq!(decision.remaining().floor() as u64, expected);
	}

	let denied = limiter.allow("user:1").await.unwrap();
	assert!(!denied.allowed());
	let retry_after = denied.retry_after().unwrap();
	assert!(retry_after > 0.0 && retry_after.is_finite());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn concurrent_callers_never_double_spend() {
	let ns = namespace("concurrent");
	let limiter = Arc::new(
		RateLimiter::connect(&redis_url(), config(1, 3600, 10, &ns))
			.await
			.unwrap(),
	);

	let mut handles = Vec::new();
	for _ in 0..25 {
		let limiter = limiter.clone();
		handles.push(tokio::spawn(async move {
			limiter.allow("user:1").await.unwrap().allowed()
		}));
	}

	let mut admitted = 0;
	for handle in handles {
		if handle.await.unwrap() {
			admitted += 1;
		}
	}
	assert_eq!(admitted, 10);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn over_capacity_cost_is_denied_without_retry_after() {
	let ns = namespace("overcost");
	let limiter = RateLimiter::connect(&redis_url(), config(10, 1, 10, &ns))
		.await
		.unwrap();

	let decision = limiter.allow_with_cost("user:1", 11).await.unwrap();
	assert!(!decision.allowed());
	assert_eq!(decision.retry_after(), None);
	assert_eq!(decision.remaining(), 10.0);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn refill_uses_server_time() {
	let ns = namespace("refill");
	// 5 tokens/sec so a short sleep refills a measurable amount
	let limiter = RateLimiter::connect(&redis_url(), config(5, 1, 5, &ns))
		.await
		.unwrap();

	for _ in 0..5 {
		assert!(limiter.allow("user:1").await.unwrap().allowed());
	}
	assert!(!limiter.allow("user:1").await.unwrap().allowed());

	tokio::time::sleep(std::time::Duration::from_millis(600)).await;

	// ~3 tokens refilled while idle
	let decision = limiter.allow("user:1").await.unwrap();
	assert!(decision.allowed());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn health_check_reports_live_instance() {
	let ns = namespace("health");
	let limiter = RateLimiter::connect(&redis_url(), config(10, 1, 10, &ns))
		.await
		.unwrap();
	assert!(limiter.health_check().await);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn hooks_fire_on_live_decisions() {
	let ns = namespace("hooks");
	let allows = Arc::new(AtomicUsize::new(0));
	let blocks = Arc::new(AtomicUsize::new(0));
	let limiter = RateLimiter::connect(&redis_url(), config(1, 3600, 1, &ns))
		.await
		.unwrap()
		.with_hooks({
			let allows = allows.clone();
			let blocks = blocks.clone();
			EventHooks::new()
				.on_allow(move |_, _| {
					allows.fetch_add(1, Ordering::SeqCst);
				})
				.on_block(move |_, _| {
					blocks.fetch_add(1, Ordering::SeqCst);
				})
		});

	limiter.allow("user:1").await.unwrap();
	limiter.allow("user:1").await.unwrap();

	assert_eq!(allows.load(Ordering::SeqCst), 1);
	assert_eq!(blocks.load(Ordering::SeqCst), 1);
}

#[test]
#[ignore = "requires a running Redis"]
fn blocking_limiter_round_trip() {
	let ns = namespace("blocking");
	let limiter = BlockingRateLimiter::connect(&redis_url(), config(1, 3600, 2, &ns)).unwrap();

	assert!(limiter.allow("user:1").unwrap().allowed());
	assert!(limiter.allow("user:1").unwrap().allowed());
	let denied = limiter.allow("user:1").unwrap();
	assert!(!denied.allowed());
	assert!(limiter.health_check());
}

#[test]
fn connect_refuses_unreachable_redis() {
	// connect() pings eagerly, so a dead port fails at construction
	let config = RateLimiterConfig::builder()
		.rate(10)
		.per(1)
		.fail_strategy(FailStrategy::Closed)
		.build()
		.unwrap();
	let result = BlockingRateLimiter::connect("redis://127.0.0.1:1/", config);
	assert!(result.is_err());
}
