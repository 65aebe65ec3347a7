//! Externally obtained bearer assertions.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, ErrorKind},
	oauth::{RequestParameters, param},
};

/// Bearer assertion plus its grant type and the subject's display identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAssertion {
	assertion: TokenSecret,
	assertion_type: String,
	user_name: Option<String>,
}
impl UserAssertion {
	/// Creates an assertion; `assertion_type` is the grant type URN it is redeemed with.
	pub fn new(assertion: impl Into<TokenSecret>, assertion_type: impl Into<String>) -> Result<Self> {
		let assertion = assertion.into();
		let assertion_type = assertion_type.into();

		if assertion.is_blank() {
			return Err(ConfigError::EmptyInput { field: "assertion" }.into());
		}
		if assertion_type.trim().is_empty() {
			return Err(ErrorKind::UserCredentialAssertionTypeEmpty.into());
		}

		Ok(Self { assertion, assertion_type, user_name: None })
	}

	/// Attaches the subject's display identifier.
	pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
		self.user_name = Some(user_name.into());

		self
	}

	/// Raw assertion text.
	pub fn assertion(&self) -> &TokenSecret {
		&self.assertion
	}

	/// Grant type URN.
	pub fn assertion_type(&self) -> &str {
		&self.assertion_type
	}

	/// Subject's display identifier, when known.
	pub fn user_name(&self) -> Option<&str> {
		self.user_name.as_deref()
	}

	pub(crate) fn apply_to(&self, params: &mut RequestParameters) {
		params.insert(param::GRANT_TYPE, &self.assertion_type);
		params.insert(param::ASSERTION, STANDARD.encode(self.assertion.expose().as_bytes()));
	}
}
