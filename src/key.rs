//! Identity key derivation
//!
//! Raw identities never reach the backing store: the lookup key is a SHA-256
//! digest of the identity, composed with the namespace and algorithm tag as
//! `<namespace>:<algorithm>:<digest>`. Derivation is deterministic, so every
//! process addressing the same identity hits the same bucket.

use crate::{LimiterError, LimiterResult};
use sha2::{Digest, Sha256};

/// Maximum accepted identity length in bytes.
const MAX_IDENTITY_LEN: usize = 1024;

/// Derives the backing store key for an identity.
///
/// Pure function: identical `(namespace, algorithm, identity)` inputs always
/// yield identical keys.
///
/// # Errors
///
/// Returns [`LimiterError::InvalidIdentity`] when the identity is empty,
/// whitespace-only, or longer than 1024 bytes.
///
/// # Examples
///
/// ```
/// use tidegate::key::derive_key;
///
/// let key = derive_key("api", "token_bucket", "user:42").unwrap();
/// assert!(key.starts_with("api:token_bucket:"));
/// assert!(!key.contains("user:42"));
/// ```
pub fn derive_key(namespace: &str, algorithm: &str, identity: &str) -> LimiterResult<String> {
	if identity.trim().is_empty() {
		return Err(LimiterError::InvalidIdentity(
			"identity cannot be empty".to_string(),
		));
	}
	if identity.len() > MAX_IDENTITY_LEN {
		return Err(LimiterError::InvalidIdentity(format!(
			"identity exceeds {MAX_IDENTITY_LEN} bytes"
		)));
	}

	let digest = hex::encode(Sha256::digest(identity.as_bytes()));
	Ok(format!("{namespace}:{algorithm}:{digest}"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_derivation_is_idempotent() {
		// Act
		let key1 = derive_key("default", "token_bucket", "user:42").unwrap();
		let key2 = derive_key("default", "token_bucket", "user:42").unwrap();

		// Assert
		assert_eq!(key1, key2);
	}

	#[rstest]
	fn test_distinct_identities_get_distinct_keys() {
		// Act
		let key1 = derive_key("default", "token_bucket", "user:1").unwrap();
		let key2 = derive_key("default", "token_bucket", "user:2").unwrap();

		// Assert
		assert_ne!(key1, key2);
	}

	#[rstest]
	fn test_namespaces_partition_keys() {
		// Act
		let key1 = derive_key("api", "token_bucket", "user:1").unwrap();
		let key2 = derive_key("admin", "token_bucket", "user:1").unwrap();

		// Assert
		assert_ne!(key1, key2);
	}

	#[rstest]
	fn test_raw_identity_never_appears_in_key() {
		// Arrange
		let identity = "alice@example.com";

		// Act
		let key = derive_key("default", "token_bucket", identity).unwrap();

		// Assert
		assert!(!key.contains(identity));
		assert!(key.starts_with("default:token_bucket:"));
	}

	#[rstest]
	fn test_digest_is_fixed_length() {
		// Act
		let short = derive_key("default", "token_bucket", "a").unwrap();
		let long = derive_key("default", "token_bucket", &"b".repeat(1000)).unwrap();

		// Assert - sha256 hex is always 64 chars
		assert_eq!(short.len(), long.len());
		assert_eq!(short.rsplit(':').next().unwrap().len(), 64);
	}

	#[rstest]
	#[case::empty("")]
	#[case::whitespace("   ")]
	#[case::tabs_and_newlines("\t\n")]
	fn test_blank_identity_rejected(#[case] identity: &str) {
		// Act
		let result = derive_key("default", "token_bucket", identity);

		// Assert
		assert!(matches!(result, Err(LimiterError::InvalidIdentity(_))));
	}

	#[rstest]
	fn test_oversized_identity_rejected() {
		// Arrange
		let identity = "x".repeat(1025);

		// Act
		let result = derive_key("default", "token_bucket", &identity);

		// Assert
		assert!(matches!(result, Err(LimiterError::InvalidIdentity(_))));
	}
}
