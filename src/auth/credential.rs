//! User and client credentials supplied by the caller.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ErrorKind,
	oauth::{RequestParameters, param},
};

/// Client assertion type for pre-signed JWT client credentials.
pub const JWT_BEARER_CLIENT_ASSERTION_TYPE: &str =
	"urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// How the user proves identity to a federated endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UserAuthType {
	/// Username and password.
	UsernamePassword,
	/// Integrated (Windows) authentication negotiated by the transport.
	IntegratedAuth,
}

/// User credential as supplied by the caller; the username may still be missing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserCredential {
	/// Username and password credential.
	UsernamePassword {
		/// Username, filled from the platform when absent.
		username: Option<String>,
		/// Password, required for managed accounts and WS-Trust username tokens.
		password: Option<TokenSecret>,
	},
	/// Integrated (Windows) authentication.
	Integrated {
		/// Username, filled from the platform when absent.
		username: Option<String>,
	},
}
impl UserCredential {
	/// Username and password credential.
	pub fn username_password(username: impl Into<String>, password: impl Into<TokenSecret>) -> Self {
		Self::UsernamePassword { username: Some(username.into()), password: Some(password.into()) }
	}

	/// Password credential whose username comes from the platform identity.
	pub fn password(password: impl Into<TokenSecret>) -> Self {
		Self::UsernamePassword { username: None, password: Some(password.into()) }
	}

	/// Integrated authentication for the signed-in platform user.
	pub fn integrated() -> Self {
		Self::Integrated { username: None }
	}

	/// Integrated authentication for `username`.
	pub fn integrated_for(username: impl Into<String>) -> Self {
		Self::Integrated { username: Some(username.into()) }
	}

	/// Returns the supplied username when it is non-blank.
	pub fn username(&self) -> Option<&str> {
		let username = match self {
			Self::UsernamePassword { username, .. } | Self::Integrated { username } => username,
		};

		username.as_deref().filter(|value| !value.trim().is_empty())
	}

	/// Returns the credential's auth type.
	pub fn auth_type(&self) -> UserAuthType {
		match self {
			Self::UsernamePassword { .. } => UserAuthType::UsernamePassword,
			Self::Integrated { .. } => UserAuthType::IntegratedAuth,
		}
	}

	/// Completes the credential with `username`, producing the resolved identity.
	pub fn resolve(&self, username: impl Into<String>) -> ResolvedUser {
		let password = match self {
			Self::UsernamePassword { password, .. } => password.clone(),
			Self::Integrated { .. } => None,
		};

		ResolvedUser { username: username.into(), auth_type: self.auth_type(), password }
	}
}

/// Credential whose username is known; produced once per acquisition before any request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedUser {
	username: String,
	auth_type: UserAuthType,
	password: Option<TokenSecret>,
}
impl ResolvedUser {
	/// Returns the non-empty username.
	pub fn username(&self) -> &str {
		&self.username
	}

	/// Returns the credential's auth type.
	pub fn auth_type(&self) -> UserAuthType {
		self.auth_type
	}

	/// Returns the password when one was supplied and is non-blank.
	pub fn password(&self) -> Option<&TokenSecret> {
		self.password.as_ref().filter(|secret| !secret.is_blank())
	}

	/// Writes the direct password grant; managed accounts must carry a password.
	pub(crate) fn apply_password_grant(&self, params: &mut RequestParameters) -> Result<()> {
		let password = self.password().ok_or(ErrorKind::PasswordRequiredForManagedUserError)?;

		params.insert(param::GRANT_TYPE, crate::oauth::GrantType::Password.as_str());
		params.insert(param::USERNAME, &self.username);
		params.insert(param::PASSWORD, password.expose());

		Ok(())
	}
}

/// Confidential client credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCredential {
	/// Shared client secret.
	Secret(TokenSecret),
	/// Pre-signed JWT client assertion.
	Assertion(TokenSecret),
}
impl ClientCredential {
	/// Client secret credential.
	pub fn secret(secret: impl Into<TokenSecret>) -> Self {
		Self::Secret(secret.into())
	}

	/// Signed JWT client assertion credential.
	pub fn assertion(assertion: impl Into<TokenSecret>) -> Self {
		Self::Assertion(assertion.into())
	}

	pub(crate) fn apply_to(&self, params: &mut RequestParameters) {
		match self {
			Self::Secret(secret) => params.insert(param::CLIENT_SECRET, secret.expose()),
			Self::Assertion(assertion) => {
				params.insert(param::CLIENT_ASSERTION_TYPE, JWT_BEARER_CLIENT_ASSERTION_TYPE);
				params.insert(param::CLIENT_ASSERTION, assertion.expose());
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn blank_usernames_count_as_missing() {
		assert_eq!(UserCredential::password("pw").username(), None);
		assert_eq!(UserCredential::username_password("  ", "pw").username(), None);
		assert_eq!(
			UserCredential::integrated_for("alice@contoso.com").username(),
			Some("alice@contoso.com")
		);
	}

	#[test]
	fn managed_password_grant_requires_password() {
		let user = UserCredential::UsernamePassword {
			username: Some("alice@contoso.com".into()),
			password: Some(TokenSecret::new("")),
		}
		.resolve("alice@contoso.com");
		let mut params = RequestParameters::default();
		let err = user
			.apply_password_grant(&mut params)
			.expect_err("Blank passwords should be rejected for managed users.");

		assert_eq!(err.kind(), Some(ErrorKind::PasswordRequiredForManagedUserError));
		assert!(params.get(param::GRANT_TYPE).is_none());

		let integrated = UserCredential::integrated().resolve("bob@contoso.com");

		assert_eq!(integrated.auth_type(), UserAuthType::IntegratedAuth);
		assert!(integrated.password().is_none());
	}

	#[test]
	fn client_assertion_writes_jwt_bearer_type() {
		let mut params = RequestParameters::default();

		ClientCredential::assertion("eyJhbGciOi").apply_to(&mut params);

		assert_eq!(params.get(param::CLIENT_ASSERTION_TYPE), Some(JWT_BEARER_CLIENT_ASSERTION_TYPE));
		assert_eq!(params.get(param::CLIENT_ASSERTION), Some("eyJhbGciOi"));
		assert_eq!(params.get(param::CLIENT_SECRET), None);
	}
}
