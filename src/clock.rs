//! Clock seam for fail-path timestamps and tests
//!
//! The authoritative clock for refill computation is the Redis server's
//! `TIME`, read inside the atomic script. This trait only supplies unix
//! timestamps for decisions built without a round trip (fail-open and
//! fail-closed) and lets tests drive time manually.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Trait for providing the current unix time in seconds.
/// This allows for time mocking in tests.
pub trait TimeSource: Send + Sync {
	fn now(&self) -> f64;
}

/// Time source that uses the actual system clock.
#[derive(Clone, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
	pub fn new() -> Self {
		Self
	}
}

impl TimeSource for SystemTimeSource {
	fn now(&self) -> f64 {
		use std::time::{SystemTime, UNIX_EPOCH};
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.expect("system clock is before UNIX epoch")
			.as_secs_f64()
	}
}

/// Mock time source for testing that allows manual time control.
#[derive(Clone)]
pub struct MockTimeSource {
	current_time: Arc<RwLock<f64>>,
}

impl MockTimeSource {
	pub fn new(start_time: f64) -> Self {
		Self {
			current_time: Arc::new(RwLock::new(start_time)),
		}
	}

	pub fn advance(&self, duration: Duration) {
		let mut time = self.current_time.write();
		*time += duration.as_secs_f64();
	}

	pub fn set_time(&self, time: f64) {
		let mut current = self.current_time.write();
		*current = time;
	}
}

impl Default for MockTimeSource {
	fn default() -> Self {
		Self::new(0.0)
	}
}

impl TimeSource for MockTimeSource {
	fn now(&self) -> f64 {
		*self.current_time.read()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_system_time_source_returns_current_time() {
		// Arrange
		let source = SystemTimeSource::new();

		// Act
		let time1 = source.now();
		std::thread::sleep(Duration::from_millis(10));
		let time2 = source.now();

		// Assert
		assert!(time2 > time1);
	}

	#[rstest]
	fn test_mock_time_source_allows_time_control() {
		// Arrange
		let source = MockTimeSource::new(1000.0);

		// Act & Assert
		assert_eq!(source.now(), 1000.0);

		// Act
		source.advance(Duration::from_secs(60));

		// Assert
		assert_eq!(source.now(), 1060.0);
	}

	#[rstest]
	fn test_mock_time_source_set_time() {
		// Arrange
		let source = MockTimeSource::new(0.0);

		// Act
		source.set_time(12345.5);

		// Assert
		assert_eq!(source.now(), 12345.5);
	}
}
