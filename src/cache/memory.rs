//! Thread-safe in-memory [`TokenCache`] implementation.

// self
use crate::{
	_prelude::*,
	cache::{CacheError, CacheFuture, TokenCache, TokenCacheEntry, TokenCacheKey},
};

type CacheMap = Arc<RwLock<HashMap<TokenCacheKey, TokenCacheEntry>>>;

/// Process-local token cache.
///
/// Entries are never evicted on their own; [`purge_expired`](Self::purge_expired) is available
/// for long-running hosts that want to bound the map.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenCache(CacheMap);
impl MemoryTokenCache {
	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Drops every entry whose expiry is at or before `now` and that carries no refresh
	/// token; returns how many were removed.
	pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
		let mut guard = self.0.write();
		let before = guard.len();

		guard.retain(|_, entry| entry.expires_on > now || entry.refresh_token.is_some());

		before - guard.len()
	}

	fn store_now(
		map: CacheMap,
		key: TokenCacheKey,
		entry: TokenCacheEntry,
	) -> Result<(), CacheError> {
		map.write().insert(key, entry);

		Ok(())
	}
}
impl TokenCache for MemoryTokenCache {
	fn lookup<'a>(&'a self, key: &'a TokenCacheKey) -> CacheFuture<'a, Option<TokenCacheEntry>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn store(&self, key: TokenCacheKey, entry: TokenCacheEntry) -> CacheFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::store_now(map, key, entry) })
	}

	fn remove<'a>(&'a self, key: &'a TokenCacheKey) -> CacheFuture<'a, Option<TokenCacheEntry>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(key)) })
	}
}
