//! Distributed token bucket rate limiting backed by Redis
//!
//! `tidegate` answers one question — "may this identity spend `cost` tokens
//! right now?" — consistently across every process that shares a Redis
//! instance. The refill-and-consume step runs as a single Lua script inside
//! Redis, using the Redis server clock, so the decision is atomic and
//! identical no matter which replica asks.
//!
//! ## Design
//!
//! - **One round trip per decision.** The script reads the bucket, refills it
//!   from elapsed server time, consumes tokens (or not), persists the new
//!   state with an idle expiry, and returns the verdict — all atomically.
//! - **No local state.** Processes hold no bucket data; Redis linearizes all
//!   updates per key, so concurrent callers can never double-spend.
//! - **Explicit failure policy.** When Redis is unreachable the limiter
//!   fails open (admit) or closed (reject) per configuration, without
//!   retrying.
//!
//! ## Quick start
//!
//! ```no_run
//! use tidegate::{RateLimiter, RateLimiterConfig};
//!
//! # async fn example() -> Result<(), tidegate::LimiterError> {
//! // 100 requests per 60 seconds, bursting up to 150
//! let config = RateLimiterConfig::builder()
//!     .rate(100)
//!     .per(60)
//!     .burst(150)
//!     .build()?;
//! let limiter = RateLimiter::connect("redis://127.0.0.1/", config).await?;
//!
//! let decision = limiter.allow("user:42").await?;
//! if decision.allowed() {
//!     // serve the request
//! } else {
//!     // reject with 429, using decision.headers()
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A blocking variant with identical semantics is available as
//! [`BlockingRateLimiter`] for callers without an async runtime.

pub mod backend;
pub mod clock;
pub mod config;
pub mod decision;
pub mod hooks;
pub mod key;
pub mod limiter;
pub mod token_bucket;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{BlockingLimiterBackend, BlockingRedisBackend, LimiterBackend, RedisBackend};
pub use clock::{SystemTimeSource, TimeSource};
pub use config::{FailStrategy, RateLimiterConfig, RateLimiterConfigBuilder};
pub use decision::Decision;
pub use hooks::EventHooks;
pub use limiter::{BlockingRateLimiter, RateLimiter};

/// Rate limiter errors
///
/// `InvalidConfig` and `InvalidIdentity` indicate programming errors and are
/// returned to the caller of `allow`. `BackendUnavailable` and
/// `UnexpectedResponse` are absorbed into a [`Decision`] by the configured
/// [`FailStrategy`] and only surface through the `on_error` hook.
#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
	#[error("invalid identity: {0}")]
	InvalidIdentity(String),
	#[error("backend unavailable: {0}")]
	BackendUnavailable(String),
	#[error("unexpected backend response: {0}")]
	UnexpectedResponse(String),
}

impl LimiterError {
	/// Whether this error came from the backend round trip, meaning the
	/// fail strategy decides the outcome instead of the caller.
	pub fn is_backend_error(&self) -> bool {
		matches!(
			self,
			LimiterError::BackendUnavailable(_) | LimiterError::UnexpectedResponse(_)
		)
	}
}

impl From<redis::RedisError> for LimiterError {
	fn from(err: redis::RedisError) -> Self {
		LimiterError::BackendUnavailable(err.to_string())
	}
}

/// Result type for rate limiter operations
pub type LimiterResult<T> = Result<T, LimiterError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_backend_errors_are_classified() {
		// Arrange
		let unavailable = LimiterError::BackendUnavailable("refused".to_string());
		let unexpected = LimiterError::UnexpectedResponse("not a tuple".to_string());
		let config = LimiterError::InvalidConfig("rate must be > 0".to_string());
		let identity = LimiterError::InvalidIdentity("empty".to_string());

		// Assert
		assert!(unavailable.is_backend_error());
		assert!(unexpected.is_backend_error());
		assert!(!config.is_backend_error());
		assert!(!identity.is_backend_error());
	}

	#[rstest]
	fn test_error_messages_carry_context() {
		// Arrange
		let err = LimiterError::InvalidConfig("per must be > 0".to_string());

		// Assert
		assert_eq!(err.to_string(), "invalid configuration: per must be > 0");
	}
}
