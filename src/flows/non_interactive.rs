//! Username/password, integrated, and bearer-assertion acquisition.
//!
//! A credential without a username is completed from the [`PlatformIdentity`] collaborator
//! before anything else runs. For non-ADFS authorities the user's realm decides the grant:
//! managed accounts redeem the password directly, federated accounts trade the credential for a
//! SAML assertion through WS-Trust and redeem that instead. Pre-supplied assertions skip realm
//! discovery altogether.

// self
use crate::{
	_prelude::*,
	auth::{ResolvedUser, UserAssertion, UserCredential},
	authority::{AuthorityType, ResolvedAuthority},
	context::RequestContext,
	error::ErrorKind,
	federation::{FederationOutcome, FederationResolver},
	flows::{Engine, EngineOptions, Flow, RequestData, TokenResult, common::Grant},
	http::{HttpExecutor, HttpTransport, TransportErrorMapper},
	platform::PlatformIdentity,
};

impl<C, M> Engine<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Acquires a token with a username/password or integrated credential.
	pub async fn acquire_with_user_credential(
		&self,
		request: &RequestData,
		credential: UserCredential,
	) -> Result<TokenResult> {
		self.acquire(request, Flow::UserCredential(credential)).await
	}

	/// Acquires a token by redeeming a pre-obtained bearer assertion.
	pub async fn acquire_with_user_assertion(
		&self,
		request: &RequestData,
		assertion: UserAssertion,
	) -> Result<TokenResult> {
		self.acquire(request, Flow::UserAssertion(assertion)).await
	}
}

/// Completes `credential` with the platform user when no username was supplied.
pub(crate) async fn resolve_user(
	credential: &UserCredential,
	platform: &dyn PlatformIdentity,
	ctx: &RequestContext,
) -> Result<ResolvedUser> {
	if let Some(username) = credential.username() {
		return Ok(credential.resolve(username));
	}

	ctx.logger.verbose("No username supplied; asking the platform for the signed-in user.");

	match platform.user_principal_name().await.filter(|upn| !upn.trim().is_empty()) {
		Some(upn) => {
			ctx.logger.info("Username resolved from the platform identity.");
			ctx.logger.info_pii(format_args!("Platform identity returned `{upn}`."));

			Ok(credential.resolve(upn))
		},
		None => {
			ctx.logger.warning("Could not identify the signed-in user.");

			Err(ErrorKind::UnknownUser.into())
		},
	}
}

/// Chooses between the password grant and a federated assertion grant.
pub(crate) async fn prepare_grant<C, M>(
	http: &HttpExecutor<C, M>,
	options: &EngineOptions,
	authority: &ResolvedAuthority,
	user: ResolvedUser,
	ctx: &RequestContext,
) -> Result<Grant>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	if authority.authority.kind() == AuthorityType::Adfs {
		ctx.logger.verbose("ADFS authority; realm discovery is skipped.");

		return password_grant(user);
	}

	let outcome = FederationResolver::new(http, options)
		.resolve(&authority.endpoints.user_realm, &user, ctx)
		.await?;

	match outcome {
		FederationOutcome::Managed => {
			ctx.logger.info("Managed account; using the password grant.");

			password_grant(user)
		},
		FederationOutcome::Federated(assertion) => {
			ctx.logger.info(format_args!(
				"Federated account; redeeming a `{}` assertion.",
				assertion.assertion_type()
			));

			Ok(Grant::Assertion(assertion))
		},
	}
}

fn password_grant(user: ResolvedUser) -> Result<Grant> {
	if user.password().is_none() {
		return Err(ErrorKind::PasswordRequiredForManagedUserError.into());
	}

	Ok(Grant::Password(user))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::platform::{FixedPlatformIdentity, NoPlatformIdentity};

	fn ctx() -> RequestContext {
		RequestContext::new(Uuid::nil(), false, CancellationToken::new())
	}

	#[tokio::test]
	async fn supplied_username_wins_over_platform() {
		let credential = UserCredential::username_password("alice@contoso.com", "pw");
		let user = resolve_user(&credential, &FixedPlatformIdentity::new("bob@contoso.com"), &ctx())
			.await
			.expect("Supplied usernames should resolve.");

		assert_eq!(user.username(), "alice@contoso.com");
	}

	#[tokio::test]
	async fn missing_username_comes_from_platform() {
		let credential = UserCredential::integrated();
		let user = resolve_user(&credential, &FixedPlatformIdentity::new("bob@contoso.com"), &ctx())
			.await
			.expect("Platform usernames should resolve.");

		assert_eq!(user.username(), "bob@contoso.com");
	}

	#[tokio::test]
	async fn unresolvable_username_is_unknown_user() {
		for platform in [
			Box::new(NoPlatformIdentity) as Box<dyn PlatformIdentity>,
			Box::new(FixedPlatformIdentity::new("  ")),
		] {
			let err = resolve_user(&UserCredential::password("pw"), platform.as_ref(), &ctx())
				.await
				.expect_err("Missing usernames should fail.");

			assert_eq!(err.kind(), Some(ErrorKind::UnknownUser));
		}
	}

	#[test]
	fn password_grant_requires_a_password() {
		let user = UserCredential::integrated().resolve("alice@contoso.com");
		let err = password_grant(user).expect_err("Missing passwords should fail.");

		assert_eq!(err.kind(), Some(ErrorKind::PasswordRequiredForManagedUserError));
	}
}
