//! Limiter configuration
//!
//! A [`RateLimiterConfig`] fixes the token bucket parameters for one limiter
//! instance: `rate` tokens granted per `per` seconds, a `burst` capacity, a
//! key `namespace`, and the [`FailStrategy`] applied when the backend cannot
//! complete the round trip. The derived refill rate and idle TTL are
//! computed once here and reused for every request.

use crate::{LimiterError, LimiterResult};
use std::str::FromStr;

/// Policy applied when the backing store cannot complete the round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailStrategy {
	/// Admit traffic with non-authoritative accounting.
	#[default]
	Open,
	/// Reject all traffic until the backend recovers.
	Closed,
}

impl FromStr for FailStrategy {
	type Err = LimiterError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"open" => Ok(FailStrategy::Open),
			"closed" => Ok(FailStrategy::Closed),
			other => Err(LimiterError::InvalidConfig(format!(
				"fail_strategy must be either 'open' or 'closed', got '{other}'"
			))),
		}
	}
}

/// Token bucket limiter configuration
///
/// # Examples
///
/// ```
/// use tidegate::RateLimiterConfig;
///
/// // 10 requests per second, default burst equal to the rate
/// let config = RateLimiterConfig::builder().rate(10).per(1).build().unwrap();
/// assert_eq!(config.capacity(), 10);
/// assert_eq!(config.refill_rate(), 10.0);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
	rate: u32,
	per: u64,
	burst: u32,
	namespace: String,
	fail_strategy: FailStrategy,
}

impl RateLimiterConfig {
	/// Creates a builder for fluent configuration
	pub fn builder() -> RateLimiterConfigBuilder {
		RateLimiterConfigBuilder::default()
	}

	/// Tokens granted per period
	pub fn rate(&self) -> u32 {
		self.rate
	}

	/// Period length in seconds
	pub fn per(&self) -> u64 {
		self.per
	}

	/// Bucket capacity (burst limit)
	pub fn capacity(&self) -> u32 {
		self.burst
	}

	/// Key namespace prefix
	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	/// Policy applied on backend failure
	pub fn fail_strategy(&self) -> FailStrategy {
		self.fail_strategy
	}

	/// Tokens added per second, always positive since `rate >= 1` and
	/// `per >= 1` are enforced at construction.
	pub fn refill_rate(&self) -> f64 {
		self.rate as f64 / self.per as f64
	}

	/// Seconds an idle bucket persists: the time to refill from empty,
	/// after which absent and stored state are indistinguishable.
	pub fn idle_ttl(&self) -> f64 {
		self.burst as f64 / self.refill_rate()
	}
}

/// Builder for [`RateLimiterConfig`]
///
/// # Examples
///
/// ```
/// use tidegate::{FailStrategy, RateLimiterConfig};
///
/// let config = RateLimiterConfig::builder()
///     .rate(100)
///     .per(60)
///     .burst(150)
///     .namespace("api")
///     .fail_strategy(FailStrategy::Closed)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.rate(), 100);
/// assert_eq!(config.capacity(), 150);
/// assert_eq!(config.namespace(), "api");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RateLimiterConfigBuilder {
	rate: Option<u32>,
	per: Option<u64>,
	burst: Option<u32>,
	namespace: Option<String>,
	fail_strategy: FailStrategy,
}

impl RateLimiterConfigBuilder {
	/// Tokens granted per period (required, must be >= 1)
	pub fn rate(mut self, rate: u32) -> Self {
		self.rate = Some(rate);
		self
	}

	/// Period length in seconds (required, must be >= 1)
	pub fn per(mut self, per: u64) -> Self {
		self.per = Some(per);
		self
	}

	/// Bucket capacity; defaults to `rate` when unset
	pub fn burst(mut self, burst: u32) -> Self {
		self.burst = Some(burst);
		self
	}

	/// Key namespace; defaults to `"default"`
	pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
		self.namespace = Some(namespace.into());
		self
	}

	/// Policy applied on backend failure; defaults to [`FailStrategy::Open`]
	pub fn fail_strategy(mut self, strategy: FailStrategy) -> Self {
		self.fail_strategy = strategy;
		self
	}

	/// Validates and builds the configuration
	///
	/// # Errors
	///
	/// Returns [`LimiterError::InvalidConfig`] when `rate` or `per` is
	/// missing or zero, or when the namespace is empty or contains the `:`
	/// delimiter or control characters.
	pub fn build(self) -> LimiterResult<RateLimiterConfig> {
		let rate = self
			.rate
			.ok_or_else(|| LimiterError::InvalidConfig("rate is required".to_string()))?;
		if rate == 0 {
			return Err(LimiterError::InvalidConfig("rate must be > 0".to_string()));
		}

		let per = self
			.per
			.ok_or_else(|| LimiterError::InvalidConfig("per is required".to_string()))?;
		if per == 0 {
			return Err(LimiterError::InvalidConfig("per must be > 0".to_string()));
		}

		let namespace = self.namespace.unwrap_or_else(|| "default".to_string());
		validate_namespace(&namespace)?;

		Ok(RateLimiterConfig {
			rate,
			per,
			burst: self.burst.unwrap_or(rate),
			namespace,
			fail_strategy: self.fail_strategy,
		})
	}
}

/// Maximum accepted namespace length in bytes.
const MAX_NAMESPACE_LEN: usize = 128;

fn validate_namespace(namespace: &str) -> LimiterResult<()> {
	if namespace.is_empty() {
		return Err(LimiterError::InvalidConfig(
			"namespace cannot be empty".to_string(),
		));
	}
	if namespace.len() > MAX_NAMESPACE_LEN {
		return Err(LimiterError::InvalidConfig(format!(
			"namespace exceeds {MAX_NAMESPACE_LEN} bytes"
		)));
	}
	if namespace.contains(':') || namespace.chars().any(|c| c.is_control()) {
		return Err(LimiterError::InvalidConfig(
			"namespace cannot contain ':' or control characters".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_builder_applies_defaults() {
		// Arrange & Act
		let config = RateLimiterConfig::builder().rate(50).per(10).build().unwrap();

		// Assert
		assert_eq!(config.capacity(), 50);
		assert_eq!(config.namespace(), "default");
		assert_eq!(config.fail_strategy(), FailStrategy::Open);
	}

	#[rstest]
	fn test_derived_values() {
		// Arrange
		let config = RateLimiterConfig::builder()
			.rate(100)
			.per(60)
			.burst(150)
			.build()
			.unwrap();

		// Assert
		assert!((config.refill_rate() - 100.0 / 60.0).abs() < 1e-12);
		assert!((config.idle_ttl() - 150.0 / (100.0 / 60.0)).abs() < 1e-9);
	}

	#[rstest]
	fn test_zero_burst_is_accepted() {
		// Arrange & Act
		let config = RateLimiterConfig::builder()
			.rate(10)
			.per(1)
			.burst(0)
			.build()
			.unwrap();

		// Assert
		assert_eq!(config.capacity(), 0);
		assert_eq!(config.idle_ttl(), 0.0);
	}

	#[rstest]
	#[case::zero_rate(0, 60)]
	#[case::zero_per(100, 0)]
	fn test_invalid_rate_or_per_rejected(#[case] rate: u32, #[case] per: u64) {
		// Act
		let result = RateLimiterConfig::builder().rate(rate).per(per).build();

		// Assert
		assert!(matches!(result, Err(LimiterError::InvalidConfig(_))));
	}

	#[rstest]
	fn test_missing_rate_rejected() {
		// Act
		let result = RateLimiterConfig::builder().per(60).build();

		// Assert
		assert!(matches!(result, Err(LimiterError::InvalidConfig(_))));
	}

	#[rstest]
	#[case::empty("")]
	#[case::delimiter("api:v2")]
	#[case::control("api\n")]
	fn test_invalid_namespace_rejected(#[case] namespace: &str) {
		// Act
		let result = RateLimiterConfig::builder()
			.rate(10)
			.per(1)
			.namespace(namespace)
			.build();

		// Assert
		assert!(matches!(result, Err(LimiterError::InvalidConfig(_))));
	}

	#[rstest]
	#[case::open("open", FailStrategy::Open)]
	#[case::closed("closed", FailStrategy::Closed)]
	fn test_fail_strategy_from_str(#[case] input: &str, #[case] expected: FailStrategy) {
		// Act & Assert
		assert_eq!(input.parse::<FailStrategy>().unwrap(), expected);
	}

	#[rstest]
	fn test_fail_strategy_from_str_rejects_unknown() {
		// Act
		let result = "half-open".parse::<FailStrategy>();

		// Assert
		assert!(matches!(result, Err(LimiterError::InvalidConfig(_))));
	}
}
