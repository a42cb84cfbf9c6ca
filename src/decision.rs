//! Rate limit decisions
//!
//! A [`Decision`] is the immutable outcome of one admission check. It is
//! never persisted; HTTP collaborators translate it into response headers
//! via [`Decision::headers`].

/// Outcome of a single admission check.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
	allowed: bool,
	limit: u32,
	remaining: f64,
	reset: f64,
	retry_after: Option<f64>,
	cost: u32,
}

impl Decision {
	pub(crate) fn new(
		allowed: bool,
		limit: u32,
		remaining: f64,
		reset: f64,
		retry_after: Option<f64>,
		cost: u32,
	) -> Self {
		Self {
			allowed,
			limit,
			remaining,
			reset,
			retry_after,
			cost,
		}
	}

	/// Whether the request was admitted
	pub fn allowed(&self) -> bool {
		self.allowed
	}

	/// Bucket capacity
	pub fn limit(&self) -> u32 {
		self.limit
	}

	/// Tokens left after this decision, never negative
	pub fn remaining(&self) -> f64 {
		self.remaining
	}

	/// Unix timestamp at which the bucket is full again
	pub fn reset(&self) -> f64 {
		self.reset
	}

	/// Seconds until `cost` tokens become available.
	///
	/// `None` when the request was admitted, and also when the cost exceeds
	/// the bucket capacity and can never be satisfied.
	pub fn retry_after(&self) -> Option<f64> {
		self.retry_after
	}

	/// Tokens this request consumed (or attempted to consume)
	pub fn cost(&self) -> u32 {
		self.cost
	}

	/// Standard rate limit response headers for HTTP collaborators.
	///
	/// Always emits `RateLimit-Limit`, `RateLimit-Remaining` (floored) and
	/// `RateLimit-Reset` (ceiled); adds `Retry-After` (ceiled) on denials
	/// that can eventually succeed. The 429 status itself is the caller's
	/// responsibility.
	///
	/// # Examples
	///
	/// ```
	/// use tidegate::Decision;
	/// # let decision = Decision::new_for_docs();
	/// for (name, value) in decision.headers() {
	///     println!("{name}: {value}");
	/// }
	/// ```
	pub fn headers(&self) -> Vec<(&'static str, String)> {
		let mut headers = vec![
			("RateLimit-Limit", self.limit.to_string()),
			(
				"RateLimit-Remaining",
				(self.remaining.floor() as u64).to_string(),
			),
			("RateLimit-Reset", (self.reset.ceil() as u64).to_string()),
		];
		if !self.allowed {
			if let Some(retry_after) = self.retry_after {
				headers.push(("Retry-After", (retry_after.ceil() as u64).to_string()));
			}
		}
		headers
	}

	/// Sample decision used by documentation examples.
	#[doc(hidden)]
	pub fn new_for_docs() -> Self {
		Self::new(true, 100, 99.0, 1_700_000_000.0, None, 1)
	}
}
