//! Token cache contract and the built-in in-memory implementation.

pub mod entry;
pub mod key;
pub mod memory;

pub use entry::*;
pub use key::*;
pub use memory::MemoryTokenCache;

// self
use crate::_prelude::*;

/// Future returned by [`TokenCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Storage contract for acquired tokens.
///
/// Implementations must make [`store`](TokenCache::store) atomic with respect to concurrent
/// lookups of the same key: a reader sees either the previous entry or the replacement, never a
/// mix. Lookups match the full four-part key exactly.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Returns the entry stored under `key`, if any.
	fn lookup<'a>(&'a self, key: &'a TokenCacheKey) -> CacheFuture<'a, Option<TokenCacheEntry>>;

	/// Stores `entry` under `key`, replacing any previous entry.
	fn store(&self, key: TokenCacheKey, entry: TokenCacheEntry) -> CacheFuture<'_, ()>;

	/// Removes and returns the entry stored under `key`.
	fn remove<'a>(&'a self, key: &'a TokenCacheKey) -> CacheFuture<'a, Option<TokenCacheEntry>>;
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Returns `true` if `entry` is still valid at `now` once `clock_skew` is subtracted from its
/// expiry.
pub fn is_usable(entry: &TokenCacheEntry, clock_skew: Duration, now: OffsetDateTime) -> bool {
	entry.expires_on.checked_sub(clock_skew).is_some_and(|usable_until| usable_until > now)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn entry(expires_on: OffsetDateTime) -> TokenCacheEntry {
		TokenCacheEntry::builder()
			.access_token("at")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_on(expires_on)
			.build()
			.expect("Cache entry fixture should build.")
	}

	#[test]
	fn usable_only_before_expiry_minus_skew() {
		let entry = entry(macros::datetime!(2025-01-01 01:00 UTC));
		let skew = Duration::minutes(5);

		assert!(is_usable(&entry, skew, macros::datetime!(2025-01-01 00:54 UTC)));
		assert!(!is_usable(&entry, skew, macros::datetime!(2025-01-01 00:55 UTC)));
		assert!(!is_usable(&entry, skew, macros::datetime!(2025-01-01 02:00 UTC)));
		assert!(is_usable(&entry, Duration::ZERO, macros::datetime!(2025-01-01 00:59 UTC)));
	}

	#[test]
	fn cache_error_converts_into_engine_error_with_source() {
		let cache_error = CacheError::Backend { message: "database unreachable".into() };
		let engine_error: Error = cache_error.clone().into();

		assert!(matches!(engine_error, Error::Cache(_)));
		assert!(engine_error.to_string().contains("database unreachable"));
	}
}
