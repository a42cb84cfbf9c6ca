//! Backend seam and Redis backends
//!
//! A backend executes the atomic bucket update: one round trip, one
//! indivisible refill-then-consume step, raw outputs returned unmodified.
//! The async and blocking traits carry identical contracts and differ only
//! in how the round trip is awaited.
//!
//! Connection pooling policy is a collaborator concern; the blocking backend
//! opens a connection per call and the async backend rides on
//! [`redis::aio::ConnectionManager`], which multiplexes and reconnects on
//! its own.

use crate::token_bucket::{BucketArgs, BucketReply, TOKEN_BUCKET_SCRIPT, parse_reply};
use crate::{LimiterError, LimiterResult};
use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Default socket timeout for the blocking backend's round trips.
const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(1);

/// Async backend contract: the atomic bucket update plus health probes.
///
/// Implementations MUST execute the update as a single indivisible step —
/// no other operation on the same key may interleave between the read of
/// current state and the write of new state — and perform exactly one
/// round trip per call.
#[async_trait]
pub trait LimiterBackend: Send + Sync {
	/// Executes the atomic refill-then-consume operation for `key`.
	async fn update_bucket(&self, key: &str, args: BucketArgs) -> LimiterResult<BucketReply>;

	/// Whether the backend is currently reachable.
	async fn check_health(&self) -> bool {
		true
	}
}

/// Blocking backend contract, semantically identical to [`LimiterBackend`].
pub trait BlockingLimiterBackend: Send + Sync {
	/// Executes the atomic refill-then-consume operation for `key`.
	fn update_bucket(&self, key: &str, args: BucketArgs) -> LimiterResult<BucketReply>;

	/// Whether the backend is currently reachable.
	fn check_health(&self) -> bool {
		true
	}
}

#[async_trait]
impl<B: LimiterBackend + ?Sized> LimiterBackend for std::sync::Arc<B> {
	async fn update_bucket(&self, key: &str, args: BucketArgs) -> LimiterResult<BucketReply> {
		(**self).update_bucket(key, args).await
	}

	async fn check_health(&self) -> bool {
		(**self).check_health().await
	}
}

impl<B: BlockingLimiterBackend + ?Sized> BlockingLimiterBackend for std::sync::Arc<B> {
	fn update_bucket(&self, key: &str, args: BucketArgs) -> LimiterResult<BucketReply> {
		(**self).update_bucket(key, args)
	}

	fn check_health(&self) -> bool {
		(**self).check_health()
	}
}

/// Async Redis backend.
///
/// Scripts run through [`redis::Script`], which handles `EVALSHA` caching
/// with automatic `NOSCRIPT` re-registration, so every decision is one
/// round trip on the happy path.
///
/// # Examples
///
/// ```no_run
/// use tidegate::RedisBackend;
///
/// # async fn example() -> Result<(), tidegate::LimiterError> {
/// let backend = RedisBackend::connect("redis://127.0.0.1/").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
	connection: ConnectionManager,
	script: std::sync::Arc<Script>,
}

impl RedisBackend {
	/// Connects to Redis and verifies connectivity with a `PING`.
	///
	/// # Errors
	///
	/// Returns [`LimiterError::BackendUnavailable`] when the URL is invalid
	/// or Redis does not answer.
	pub async fn connect(redis_url: &str) -> LimiterResult<Self> {
		let client = redis::Client::open(redis_url)?;
		Self::with_client(client).await
	}

	/// Builds the backend from a caller-supplied [`redis::Client`].
	pub async fn with_client(client: redis::Client) -> LimiterResult<Self> {
		let connection = ConnectionManager::new(client).await?;
		let backend = Self {
			connection,
			script: std::sync::Arc::new(Script::new(TOKEN_BUCKET_SCRIPT)),
		};
		// Eager connectivity check: surface a bad URL at construction
		// instead of on the first decision.
		let mut conn = backend.connection.clone();
		let _: String = redis::cmd("PING").query_async(&mut conn).await?;
		Ok(backend)
	}

	/// Current Redis server time in unix seconds.
	///
	/// Debugging aid only: the decision path reads `TIME` inside the atomic
	/// script, never through this method.
	pub async fn server_time(&self) -> LimiterResult<f64> {
		let mut conn = self.connection.clone();
		let (secs, micros): (u64, u64) = redis::cmd("TIME").query_async(&mut conn).await?;
		Ok(secs as f64 + micros as f64 / 1_000_000.0)
	}
}

#[async_trait]
impl LimiterBackend for RedisBackend {
	async fn update_bucket(&self, key: &str, args: BucketArgs) -> LimiterResult<BucketReply> {
		let mut conn = self.connection.clone();
		let value: redis::Value = self
			.script
			.key(key)
			.arg(args.capacity)
			.arg(args.refill_rate)
			.arg(args.cost)
			.arg(args.idle_ttl)
			.invoke_async(&mut conn)
			.await?;
		parse_reply(&value)
	}

	async fn check_health(&self) -> bool {
		let mut conn = self.connection.clone();
		let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
		pong.is_ok()
	}
}

impl std::fmt::Debug for RedisBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RedisBackend").finish_non_exhaustive()
	}
}

/// Blocking Redis backend for callers without an async runtime.
///
/// Each call opens a connection, runs the script, and closes it; read and
/// write timeouts bound the round trip so a wedged Redis turns into a
/// [`LimiterError::BackendUnavailable`] instead of a hung caller.
pub struct BlockingRedisBackend {
	client: redis::Client,
	script: Script,
	socket_timeout: Duration,
}

impl BlockingRedisBackend {
	/// Connects to Redis and verifies connectivity with a `PING`.
	///
	/// # Errors
	///
	/// Returns [`LimiterError::BackendUnavailable`] when the URL is invalid
	/// or Redis does not answer.
	pub fn connect(redis_url: &str) -> LimiterResult<Self> {
		let client = redis::Client::open(redis_url)?;
		Self::with_client(client)
	}

	/// Builds the backend from a caller-supplied [`redis::Client`].
	pub fn with_client(client: redis::Client) -> LimiterResult<Self> {
		let backend = Self {
			client,
			script: Script::new(TOKEN_BUCKET_SCRIPT),
			socket_timeout: DEFAULT_SOCKET_TIMEOUT,
		};
		let mut conn = backend.open_connection()?;
		let _: String = redis::cmd("PING").query(&mut conn)?;
		Ok(backend)
	}

	/// Overrides the per-round-trip socket timeout (default 1 s).
	pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
		self.socket_timeout = timeout;
		self
	}

	/// Current Redis server time in unix seconds.
	pub fn server_time(&self) -> LimiterResult<f64> {
		let mut conn = self.open_connection()?;
		let (secs, micros): (u64, u64) = redis::cmd("TIME").query(&mut conn)?;
		Ok(secs as f64 + micros as f64 / 1_000_000.0)
	}

	fn open_connection(&self) -> LimiterResult<redis::Connection> {
		let conn = self.client.get_connection()?;
		conn.set_read_timeout(Some(self.socket_timeout))?;
		conn.set_write_timeout(Some(self.socket_timeout))?;
		Ok(conn)
	}
}

impl BlockingLimiterBackend for BlockingRedisBackend {
	fn update_bucket(&self, key: &str, args: BucketArgs) -> LimiterResult<BucketReply> {
		let mut conn = self.open_connection()?;
		let value: redis::Value = self
			.script
			.key(key)
			.arg(args.capacity)
			.arg(args.refill_rate)
			.arg(args.cost)
			.arg(args.idle_ttl)
			.invoke(&mut conn)?;
		parse_reply(&value)
	}

	fn check_health(&self) -> bool {
		self.open_connection()
			.and_then(|mut conn| {
				let pong: String = redis::cmd("PING").query(&mut conn)?;
				Ok(pong)
			})
			.is_ok()
	}
}
