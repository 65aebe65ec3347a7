//! Four-part cache key.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ResourceId},
};

/// User component of a [`TokenCacheKey`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CacheUser {
	/// App-only token.
	NoUser,
	/// Token issued for a user, keyed by the lowercased user identifier.
	User(String),
	/// User token whose user could not be identified; such tokens are never cached.
	Unidentified,
}
impl CacheUser {
	/// Keys a token for `user`; identifiers compare case-insensitively.
	pub fn user(user: impl AsRef<str>) -> Self {
		Self::User(user.as_ref().trim().to_lowercase())
	}

	/// Whether tokens for this user may be written to a cache.
	pub fn is_cacheable(&self) -> bool {
		!matches!(self, Self::Unidentified)
	}
}

/// Composite key identifying one cached token slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenCacheKey {
	/// Canonical authority URL.
	pub authority: String,
	/// Target resource.
	pub resource: ResourceId,
	/// Client identifier.
	pub client_id: ClientId,
	/// User the token was issued for.
	pub user: CacheUser,
}
impl TokenCacheKey {
	/// Builds a key; `authority` should be the canonical authority URL.
	pub fn new(
		authority: impl Into<String>,
		resource: ResourceId,
		client_id: ClientId,
		user: CacheUser,
	) -> Self {
		Self { authority: authority.into(), resource, client_id, user }
	}
}
