//! Refresh token redemption.
//!
//! Callers holding a refresh token redeem it with [`Engine::acquire_with_refresh_token`]. The
//! engine also redeems the refresh token of an expired cache entry on its own before falling back
//! to the flow's grant. When the provider does not rotate the refresh token, the previous one is
//! kept.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	flows::{Engine, Flow, RequestData, TokenResult},
	http::{HttpTransport, TransportErrorMapper},
};

impl<C, M> Engine<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Redeems `refresh_token` for a new access token.
	pub async fn acquire_with_refresh_token(
		&self,
		request: &RequestData,
		refresh_token: impl Into<TokenSecret>,
	) -> Result<TokenResult> {
		self.acquire(request, Flow::RefreshToken(refresh_token.into())).await
	}
}

pub(crate) fn validate(refresh_token: TokenSecret) -> Result<TokenSecret> {
	if refresh_token.is_blank() {
		return Err(ConfigError::EmptyInput { field: "refresh_token" }.into());
	}

	Ok(refresh_token)
}
