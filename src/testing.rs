//! Test backend
//!
//! [`MemoryBackend`] mirrors the atomic-operation contract in process so
//! the facade and the token bucket properties can be exercised without a
//! Redis instance: the same refill-then-consume arithmetic as the Lua
//! script, serialized under a mutex, driven by an injectable [`TimeSource`],
//! with idle expiry emulated per key.
//!
//! This is a test double, not a storage option — authoritative bucket state
//! lives only in the shared backing store (the Lua script is normative).

use crate::backend::{BlockingLimiterBackend, LimiterBackend};
use crate::clock::{SystemTimeSource, TimeSource};
use crate::token_bucket::{BucketArgs, BucketReply};
use crate::{LimiterError, LimiterResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

struct StoredBucket {
	tokens: f64,
	last_refill: f64,
	expires_at: f64,
}

/// In-memory stand-in for the Redis backend.
pub struct MemoryBackend {
	buckets: Mutex<HashMap<String, StoredBucket>>,
	clock: Arc<dyn TimeSource>,
	unavailable: AtomicBool,
	round_trips: AtomicU64,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::with_time_source(Arc::new(SystemTimeSource::new()))
	}

	/// Builds the backend over a caller-controlled clock.
	pub fn with_time_source(clock: Arc<dyn TimeSource>) -> Self {
		Self {
			buckets: Mutex::new(HashMap::new()),
			clock,
			unavailable: AtomicBool::new(false),
			round_trips: AtomicU64::new(0),
		}
	}

	/// Simulates an outage: every subsequent round trip fails with
	/// [`LimiterError::BackendUnavailable`] until cleared.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Number of round trips attempted, including failed ones.
	pub fn round_trips(&self) -> u64 {
		self.round_trips.load(Ordering::SeqCst)
	}

	fn update(&self, key: &str, args: BucketArgs) -> LimiterResult<BucketReply> {
		self.round_trips.fetch_add(1, Ordering::SeqCst);
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(LimiterError::BackendUnavailable(
				"backend marked unavailable".to_string(),
			));
		}

		let capacity = args.capacity as f64;
		let cost = args.cost as f64;
		let now = self.clock.now();
		let mut buckets = self.buckets.lock();

		// Expired state is indistinguishable from absent state.
		let (tokens, last_refill) = match buckets.get(key).filter(|s| s.expires_at > now) {
			Some(state) => (state.tokens, state.last_refill),
			None => (capacity, now),
		};

		let elapsed = (now - last_refill).max(0.0);
		let mut tokens = (tokens + elapsed * args.refill_rate).min(capacity);

		let mut allowed = false;
		let mut retry_after = None;
		if args.cost > args.capacity {
			// Never satisfiable, reported rather than capped.
		} else if tokens >= cost {
			allowed = true;
			tokens -= cost;
		} else {
			retry_after = Some((cost - tokens) / args.refill_rate);
		}
		tokens = tokens.max(0.0);

		buckets.insert(
			key.to_string(),
			StoredBucket {
				tokens,
				last_refill: now,
				expires_at: now + args.idle_ttl,
			},
		);

		Ok(BucketReply {
			allowed,
			remaining: tokens,
			reset: now + (capacity - tokens) / args.refill_rate,
			retry_after,
		})
	}
}

impl Default for MemoryBackend {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl LimiterBackend for MemoryBackend {
	async fn update_bucket(&self, key: &str, args: BucketArgs) -> LimiterResult<BucketReply> {
		self.update(key, args)
	}

	async fn check_health(&self) -> bool {
		!self.unavailable.load(Ordering::SeqCst)
	}
}

impl BlockingLimiterBackend for MemoryBackend {
	fn update_bucket(&self, key: &str, args: BucketArgs) -> LimiterResult<BucketReply> {
		self.update(key, args)
	}

	fn check_health(&self) -> bool {
		!self.unavailable.load(Ordering::SeqCst)
	}
}
