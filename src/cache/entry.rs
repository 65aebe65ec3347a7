//! Cached token entries and their builder.

// self
use crate::{
	_prelude::*,
	auth::{IdToken, TokenSecret, UserInfo},
	error::{AcquisitionError, ConfigError, ErrorKind},
	oauth::TokenResponse,
};

/// Errors produced by [`TokenCacheEntryBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenCacheEntryBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_on or expires_in.")]
	MissingExpiry,
	/// Issued when a relative expiry lands outside the representable time range.
	#[error("Expiry is out of range.")]
	ExpiryOutOfRange,
}

/// Token stored in a [`TokenCache`](crate::cache::TokenCache).
///
/// Entries are replaced as a whole on every store; fields are never merged.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenCacheEntry {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type, typically `Bearer`.
	pub token_type: String,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Expiry instant.
	pub expires_on: OffsetDateTime,
	/// Extended expiry instant, when the provider supplied one.
	pub extended_expires_on: Option<OffsetDateTime>,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Resource reported by the provider.
	pub resource: Option<String>,
	/// Raw id token, when issued.
	pub id_token: Option<TokenSecret>,
	/// Identity claims decoded from the id token.
	pub user_info: Option<UserInfo>,
	/// Tenant identifier decoded from the id token.
	pub tenant_id: Option<String>,
}
impl TokenCacheEntry {
	/// Returns a builder.
	pub fn builder() -> TokenCacheEntryBuilder {
		TokenCacheEntryBuilder::default()
	}

	/// Builds an entry from a successful token response received at `issued_at`.
	pub fn from_response(response: TokenResponse, issued_at: OffsetDateTime) -> Result<Self> {
		let lifetime = response.lifetime()?;
		let mut builder = Self::builder()
			.access_token(response.access_token)
			.issued_at(issued_at)
			.expires_in(lifetime);

		if let Some(token_type) = response.token_type {
			builder = builder.token_type(token_type);
		}
		if let Some(secs) = response.ext_expires_in.filter(|secs| *secs > 0) {
			builder = builder.extended_expires_in(Duration::seconds(secs));
		}
		if let Some(refresh_token) = response.refresh_token {
			builder = builder.refresh_token(refresh_token);
		}
		if let Some(resource) = response.resource {
			builder = builder.resource(resource);
		}
		if let Some(id_token) = response.id_token {
			builder = builder.id_token(id_token);
		}

		builder.build().map_err(|err| -> Error {
			match err {
				TokenCacheEntryBuilderError::ExpiryOutOfRange => AcquisitionError::with_message(
					ErrorKind::TokenResponseInvalid,
					"The token response lifetime is out of range.",
				)
				.into(),
				err => ConfigError::from(err).into(),
			}
		})
	}

	/// Displayable user identifier from the id token, when present.
	pub fn displayable_id(&self) -> Option<&str> {
		self.user_info.as_ref().and_then(|info| info.displayable_id.as_deref())
	}
}
impl Debug for TokenCacheEntry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCacheEntry")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_on", &self.expires_on)
			.field("extended_expires_on", &self.extended_expires_on)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("resource", &self.resource)
			.field("user_info", &self.user_info)
			.field("tenant_id", &self.tenant_id)
			.finish()
	}
}

/// Builder for [`TokenCacheEntry`].
#[derive(Clone, Debug, Default)]
pub struct TokenCacheEntryBuilder {
	access_token: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_on: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	extended_expires_in: Option<Duration>,
	refresh_token: Option<TokenSecret>,
	resource: Option<String>,
	id_token: Option<String>,
}
impl TokenCacheEntryBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the token type; defaults to `Bearer`.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the issued-at instant; defaults to the current clock.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_on(mut self, instant: OffsetDateTime) -> Self {
		self.expires_on = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the extended lifetime relative to the issued instant.
	pub fn extended_expires_in(mut self, duration: Duration) -> Self {
		self.extended_expires_in = Some(duration);

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Records the resource reported by the provider.
	pub fn resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = Some(resource.into());

		self
	}

	/// Provides the raw id token; its claims are decoded on build.
	pub fn id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(token.into());

		self
	}

	/// Consumes the builder and produces a [`TokenCacheEntry`].
	pub fn build(self) -> Result<TokenCacheEntry, TokenCacheEntryBuilderError> {
		let access_token =
			self.access_token.ok_or(TokenCacheEntryBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_on = match (self.expires_on, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at
				.checked_add(delta)
				.ok_or(TokenCacheEntryBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(TokenCacheEntryBuilderError::MissingExpiry),
		};
		let extended_expires_on = self
			.extended_expires_in
			.map(|delta| {
				issued_at.checked_add(delta).ok_or(TokenCacheEntryBuilderError::ExpiryOutOfRange)
			})
			.transpose()?;
		let decoded = self.id_token.as_deref().and_then(IdToken::parse);
		let (user_info, tenant_id) = match decoded {
			Some(token) => (Some(token.user_info), token.tenant_id),
			None => (None, None),
		};

		Ok(TokenCacheEntry {
			access_token,
			token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
			issued_at,
			expires_on,
			extended_expires_on,
			refresh_token: self.refresh_token,
			resource: self.resource,
			id_token: self.id_token.map(TokenSecret::new),
			user_info,
			tenant_id,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn builder_handles_relative_expiry() {
		let entry = TokenCacheEntry::builder()
			.access_token("secret")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.extended_expires_in(Duration::hours(1))
			.build()
			.expect("Entry builder should support relative expiry calculations.");

		assert_eq!(entry.expires_on, macros::datetime!(2025-01-01 00:30 UTC));
		assert_eq!(entry.extended_expires_on, Some(macros::datetime!(2025-01-01 01:00 UTC)));
		assert_eq!(entry.token_type, "Bearer");
	}

	#[test]
	fn builder_requires_token_and_expiry() {
		assert_eq!(
			TokenCacheEntry::builder().expires_in(Duration::minutes(1)).build().err(),
			Some(TokenCacheEntryBuilderError::MissingAccessToken)
		);
		assert_eq!(
			TokenCacheEntry::builder().access_token("at").build().err(),
			Some(TokenCacheEntryBuilderError::MissingExpiry)
		);
	}

	#[test]
	fn builder_rejects_expiry_beyond_the_time_range() {
		let build = |expires_in, extended_expires_in| {
			TokenCacheEntry::builder()
				.access_token("at")
				.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
				.expires_in(expires_in)
				.extended_expires_in(extended_expires_in)
				.build()
				.err()
		};

		assert_eq!(
			build(Duration::seconds(i64::MAX), Duration::hours(1)),
			Some(TokenCacheEntryBuilderError::ExpiryOutOfRange)
		);
		assert_eq!(
			build(Duration::hours(1), Duration::seconds(i64::MAX)),
			Some(TokenCacheEntryBuilderError::ExpiryOutOfRange)
		);
	}

	#[test]
	fn undecodable_id_token_is_kept_without_claims() {
		let entry = TokenCacheEntry::builder()
			.access_token("at")
			.expires_in(Duration::minutes(5))
			.id_token("opaque")
			.build()
			.expect("Undecodable id tokens should not fail the build.");

		assert!(entry.id_token.is_some());
		assert!(entry.user_info.is_none());
		assert!(entry.displayable_id().is_none());
	}

	#[test]
	fn debug_redacts_tokens() {
		let entry = TokenCacheEntry::builder()
			.access_token("very-secret")
			.refresh_token("also-secret")
			.expires_in(Duration::minutes(5))
			.build()
			.expect("Entry fixture should build.");
		let rendered = format!("{entry:?}");

		assert!(!rendered.contains("very-secret"));
		assert!(!rendered.contains("also-secret"));
	}
}
