//! The atomic token bucket operation
//!
//! The refill-then-consume step is one Lua script, executed by Redis as a
//! single indivisible unit: read state, refill from elapsed Redis server
//! time, consume (or deny), persist with a refreshed idle expiry, and report
//! the outcome — all in one round trip. Redis linearizes script executions
//! per key, so concurrent callers observe a totally ordered sequence of
//! token deductions and can never double-spend.

use crate::decision::Decision;
use crate::{LimiterError, LimiterResult};

/// Algorithm tag used in backing store keys.
pub const ALGORITHM: &str = "token_bucket";

/// Atomic refill-and-consume script.
///
/// Time comes from Redis `TIME`, never from the calling process, so refill
/// math is consistent regardless of client clock skew. Floats are returned
/// as strings because Redis truncates Lua numbers to integers in replies.
///
/// KEYS[1] - bucket key
/// ARGV[1] - capacity (tokens)
/// ARGV[2] - refill rate (tokens per second, > 0)
/// ARGV[3] - cost (tokens, >= 1)
/// ARGV[4] - idle TTL (seconds; time to refill from empty)
///
/// Returns { allowed (0|1), tokens, reset, retry_after } with
/// retry_after = -1 when not applicable and -2 when the cost exceeds the
/// capacity and can never be satisfied.
pub(crate) const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local idle_ttl = tonumber(ARGV[4])

local time = redis.call("TIME")
local now = tonumber(time[1]) + (tonumber(time[2]) / 1000000)

local data = redis.call("HMGET", key, "tokens", "last_refill")
local tokens = tonumber(data[1])
local last_refill = tonumber(data[2])

if tokens == nil then
	tokens = capacity
	last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + elapsed * refill_rate)

local allowed = 0
local retry_after = -1

if cost > capacity then
	retry_after = -2
elseif tokens >= cost then
	allowed = 1
	tokens = tokens - cost
else
	retry_after = (cost - tokens) / refill_rate
end

if tokens < 0 then
	tokens = 0
end

redis.call("HSET", key, "tokens", tokens, "last_refill", now)
redis.call("PEXPIRE", key, math.max(1, math.ceil(idle_ttl * 1000)))

local reset = now + (capacity - tokens) / refill_rate

return { allowed, tostring(tokens), tostring(reset), tostring(retry_after) }
"#;

/// Per-request inputs to the atomic operation.
///
/// `capacity`, `refill_rate` and `idle_ttl` are fixed per limiter instance;
/// only `cost` varies between requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketArgs {
	pub capacity: u32,
	pub refill_rate: f64,
	pub cost: u32,
	pub idle_ttl: f64,
}

/// Raw outputs of the atomic operation, before decision assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketReply {
	pub allowed: bool,
	pub remaining: f64,
	pub reset: f64,
	pub retry_after: Option<f64>,
}

impl BucketReply {
	/// Builds the caller-facing [`Decision`] from a successful round trip.
	pub(crate) fn into_decision(self, limit: u32, cost: u32) -> Decision {
		Decision::new(
			self.allowed,
			limit,
			self.remaining,
			self.reset,
			self.retry_after,
			cost,
		)
	}
}

/// Parses the script's raw reply into a [`BucketReply`].
///
/// # Errors
///
/// Returns [`LimiterError::UnexpectedResponse`] when the reply does not
/// match the `{ int, string, string, string }` contract.
pub(crate) fn parse_reply(value: &redis::Value) -> LimiterResult<BucketReply> {
	let (allowed, tokens, reset, retry_after): (i64, String, String, String) =
		redis::from_redis_value(value).map_err(|err| {
			LimiterError::UnexpectedResponse(format!("malformed script reply: {err}"))
		})?;

	let remaining = parse_float("tokens", &tokens)?;
	let reset = parse_float("reset", &reset)?;
	let retry_after = parse_float("retry_after", &retry_after)?;

	Ok(BucketReply {
		allowed: allowed == 1,
		remaining,
		reset,
		// Negative values are the script's "not applicable" sentinels:
		// -1 when allowed, -2 when the cost can never be satisfied.
		retry_after: (retry_after >= 0.0).then_some(retry_after),
	})
}

fn parse_float(field: &str, raw: &str) -> LimiterResult<f64> {
	raw.parse::<f64>().map_err(|_| {
		LimiterError::UnexpectedResponse(format!("non-numeric {field} in script reply: {raw:?}"))
	})
}
