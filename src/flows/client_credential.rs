//! Client credential acquisition for confidential clients acting on their own behalf.
//!
//! Tokens are app-only and cached under [`CacheUser::NoUser`](crate::cache::CacheUser::NoUser),
//! so they never collide with user tokens for the same client and resource.

// self
use crate::{
	_prelude::*,
	auth::ClientCredential,
	error::ConfigError,
	flows::{Engine, Flow, RequestData, TokenResult},
	http::{HttpTransport, TransportErrorMapper},
};

impl<C, M> Engine<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs the `client_credentials` grant with the request's client credential.
	pub async fn acquire_for_client(&self, request: &RequestData) -> Result<TokenResult> {
		self.acquire(request, Flow::ClientCredential).await
	}
}

pub(crate) fn validate(request: &RequestData) -> Result<&ClientCredential> {
	let credential = request
		.client_credential()
		.ok_or(ConfigError::EmptyInput { field: "client_credential" })?;
	let blank = match credential {
		ClientCredential::Secret(secret) | ClientCredential::Assertion(secret) => secret.is_blank(),
	};

	if blank {
		return Err(ConfigError::EmptyInput { field: "client_credential" }.into());
	}

	Ok(credential)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const AUTHORITY: &str = "https://login.microsoftonline.com/contoso.com";

	#[test]
	fn client_flow_requires_a_credential() {
		let bare = RequestData::builder(AUTHORITY, "app", "https://graph")
			.build()
			.expect("Request fixture should build.");
		let blank = RequestData::builder(AUTHORITY, "app", "https://graph")
			.client_credential(ClientCredential::secret(" "))
			.build()
			.expect("Request fixture should build.");
		let ready = RequestData::builder(AUTHORITY, "app", "https://graph")
			.client_credential(ClientCredential::assertion("eyJ.signed.jwt"))
			.build()
			.expect("Request fixture should build.");

		assert!(matches!(validate(&bare), Err(Error::Config(ConfigError::EmptyInput { .. }))));
		assert!(validate(&blank).is_err());
		assert!(validate(&ready).is_ok());
	}
}
