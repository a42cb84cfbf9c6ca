//! Rate limiter facades
//!
//! [`RateLimiter`] (async) and [`BlockingRateLimiter`] (sync) are thin
//! entry points over one shared core: derive the bucket key, run the atomic
//! backend update in a single round trip, then settle the outcome —
//! building the [`Decision`], applying the fail strategy on backend errors,
//! and firing the observability hooks. The two variants differ only in how
//! the round trip is awaited.
//!
//! Calls are independent and stateless in-process: all serialization needed
//! for correctness happens inside the backend's atomic operation.

use crate::backend::{BlockingLimiterBackend, BlockingRedisBackend, LimiterBackend, RedisBackend};
use crate::clock::{SystemTimeSource, TimeSource};
use crate::config::{FailStrategy, RateLimiterConfig};
use crate::decision::Decision;
use crate::hooks::EventHooks;
use crate::key::derive_key;
use crate::token_bucket::{ALGORITHM, BucketArgs, BucketReply};
use crate::{LimiterError, LimiterResult};
use std::sync::Arc;

/// Shared decision pipeline: key derivation, cost validation, fail-strategy
/// settlement, and hook dispatch. Owns no backend; both facades delegate
/// here so the token bucket semantics exist exactly once.
struct LimiterCore {
	config: RateLimiterConfig,
	capacity: u32,
	refill_rate: f64,
	idle_ttl: f64,
	hooks: EventHooks,
	clock: Arc<dyn TimeSource>,
}

impl LimiterCore {
	fn new(config: RateLimiterConfig) -> Self {
		let capacity = config.capacity();
		let refill_rate = config.refill_rate();
		let idle_ttl = config.idle_ttl();
		Self {
			config,
			capacity,
			refill_rate,
			idle_ttl,
			hooks: EventHooks::default(),
			clock: Arc::new(SystemTimeSource::new()),
		}
	}

	/// Validates the request and derives the bucket key. Programming errors
	/// surface here, before any backend round trip.
	fn prepare(&self, identity: &str, cost: u32) -> LimiterResult<(String, BucketArgs)> {
		if cost == 0 {
			return Err(LimiterError::InvalidConfig(
				"cost must be >= 1".to_string(),
			));
		}
		let key = derive_key(self.config.namespace(), ALGORITHM, identity)?;
		Ok((
			key,
			BucketArgs {
				capacity: self.capacity,
				refill_rate: self.refill_rate,
				cost,
				idle_ttl: self.idle_ttl,
			},
		))
	}

	/// Turns the round trip outcome into the caller-facing [`Decision`].
	/// Backend errors never escape: the configured fail strategy substitutes
	/// a decision and `on_error` is notified exactly once.
	fn settle(&self, identity: &str, outcome: LimiterResult<BucketReply>, cost: u32) -> Decision {
		match outcome {
			Ok(reply) => {
				let decision = reply.into_decision(self.capacity, cost);
				tracing::debug!(
					allowed = decision.allowed(),
					remaining = decision.remaining(),
					cost,
					"rate limit decision"
				);
				self.hooks.dispatch_decision(identity, &decision);
				decision
			}
			Err(err) => {
				tracing::warn!(
					error = %err,
					strategy = ?self.config.fail_strategy(),
					"rate limit backend error, applying fail strategy"
				);
				// Failure path notifies on_error only; the substitute
				// decision is non-authoritative accounting.
				self.hooks.dispatch_error(&err);
				let now = self.clock.now();
				match self.config.fail_strategy() {
					FailStrategy::Open => Decision::new(
						true,
						self.capacity,
						self.capacity as f64,
						now,
						None,
						cost,
					),
					FailStrategy::Closed => {
						let per = self.config.per() as f64;
						Decision::new(false, self.capacity, 0.0, now + per, Some(per), cost)
					}
				}
			}
		}
	}
}

/// Async distributed rate limiter.
///
/// # Examples
///
/// ```no_run
/// use tidegate::{RateLimiter, RateLimiterConfig};
///
/// # async fn example() -> Result<(), tidegate::LimiterError> {
/// let config = RateLimiterConfig::builder().rate(100).per(60).build()?;
/// let limiter = RateLimiter::connect("redis://127.0.0.1/", config).await?;
///
/// let decision = limiter.allow("user:42").await?;
/// assert!(decision.allowed() || decision.retry_after().is_some());
/// # Ok(())
/// # }
/// ```
pub struct RateLimiter<B: LimiterBackend = RedisBackend> {
	core: LimiterCore,
	backend: B,
}

impl RateLimiter<RedisBackend> {
	/// Connects to Redis and builds the limiter.
	///
	/// # Errors
	///
	/// Returns [`LimiterError::BackendUnavailable`] when Redis is not
	/// reachable at construction time.
	pub async fn connect(redis_url: &str, config: RateLimiterConfig) -> LimiterResult<Self> {
		let backend = RedisBackend::connect(redis_url).await?;
		Ok(Self::with_backend(backend, config))
	}
}

impl<B: LimiterBackend> RateLimiter<B> {
	/// Builds the limiter over a caller-supplied backend.
	pub fn with_backend(backend: B, config: RateLimiterConfig) -> Self {
		Self {
			core: LimiterCore::new(config),
			backend,
		}
	}

	/// Installs observability hooks.
	pub fn with_hooks(mut self, hooks: EventHooks) -> Self {
		self.core.hooks = hooks;
		self
	}

	/// Overrides the clock used for fail-path timestamps (tests).
	pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
		self.core.clock = clock;
		self
	}

	/// Decides whether `identity` may spend one token.
	pub async fn allow(&self, identity: &str) -> LimiterResult<Decision> {
		self.allow_with_cost(identity, 1).await
	}

	/// Decides whether `identity` may spend `cost` tokens.
	///
	/// Exactly one backend round trip, no retries. Backend failures are
	/// absorbed into the returned [`Decision`] per the configured
	/// [`FailStrategy`].
	///
	/// # Errors
	///
	/// Returns [`LimiterError::InvalidConfig`] when `cost` is zero and
	/// [`LimiterError::InvalidIdentity`] for blank or oversized identities;
	/// both are raised before any backend call.
	pub async fn allow_with_cost(&self, identity: &str, cost: u32) -> LimiterResult<Decision> {
		let (key, args) = self.core.prepare(identity, cost)?;
		let outcome = self.backend.update_bucket(&key, args).await;
		Ok(self.core.settle(identity, outcome, cost))
	}

	/// Whether the backend is currently reachable.
	pub async fn health_check(&self) -> bool {
		self.backend.check_health().await
	}

	/// The limiter's configuration.
	pub fn config(&self) -> &RateLimiterConfig {
		&self.core.config
	}
}

/// Blocking distributed rate limiter for callers without an async runtime.
///
/// Identical semantics to [`RateLimiter`]: same key derivation, same atomic
/// operation, same decision shape. The calling thread blocks for the
/// duration of one backend round trip.
///
/// # Examples
///
/// ```no_run
/// use tidegate::{BlockingRateLimiter, RateLimiterConfig};
///
/// # fn example() -> Result<(), tidegate::LimiterError> {
/// let config = RateLimiterConfig::builder().rate(100).per(60).build()?;
/// let limiter = BlockingRateLimiter::connect("redis://127.0.0.1/", config)?;
///
/// let decision = limiter.allow("user:42")?;
/// # Ok(())
/// # }
/// ```
pub struct BlockingRateLimiter<B: BlockingLimiterBackend = BlockingRedisBackend> {
	core: LimiterCore,
	backend: B,
}

impl BlockingRateLimiter<BlockingRedisBackend> {
	/// Connects to Redis and builds the limiter.
	///
	/// # Errors
	///
	/// Returns [`LimiterError::BackendUnavailable`] when Redis is not
	/// reachable at construction time.
	pub fn connect(redis_url: &str, config: RateLimiterConfig) -> LimiterResult<Self> {
		let backend = BlockingRedisBackend::connect(redis_url)?;
		Ok(Self::with_backend(backend, config))
	}
}

impl<B: BlockingLimiterBackend> BlockingRateLimiter<B> {
	/// Builds the limiter over a caller-supplied backend.
	pub fn with_backend(backend: B, config: RateLimiterConfig) -> Self {
		Self {
			core: LimiterCore::new(config),
			backend,
		}
	}

	/// Installs observability hooks.
	pub fn with_hooks(mut self, hooks: EventHooks) -> Self {
		self.core.hooks = hooks;
		self
	}

	/// Overrides the clock used for fail-path timestamps (tests).
	pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
		self.core.clock = clock;
		self
	}

	/// Decides whether `identity` may spend one token.
	pub fn allow(&self, identity: &str) -> LimiterResult<Decision> {
		self.allow_with_cost(identity, 1)
	}

	/// Decides whether `identity` may spend `cost` tokens.
	///
	/// # Errors
	///
	/// Same contract as [`RateLimiter::allow_with_cost`].
	pub fn allow_with_cost(&self, identity: &str, cost: u32) -> LimiterResult<Decision> {
		let (key, args) = self.core.prepare(identity, cost)?;
		let outcome = self.backend.update_bucket(&key, args);
		Ok(self.core.settle(identity, outcome, cost))
	}

	/// Whether the backend is currently reachable.
	pub fn health_check(&self) -> bool {
		self.backend.check_health()
	}

	/// The limiter's configuration.
	pub fn config(&self) -> &RateLimiterConfig {
		&self.core.config
	}
}
