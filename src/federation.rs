//! Federation chain turning a username/password (or integrated) credential for a federated account
//! into a SAML bearer assertion: user-realm discovery, metadata exchange, then WS-Trust.

pub mod mex;
pub mod realm;
pub mod wstrust;

pub use mex::{MexDocument, WsTrustAddress, WsTrustVersion};
pub use realm::{AccountType, UserRealmDiscoveryResponse};
pub use wstrust::{SAML1_ASSERTION, SAML2_ASSERTION, WsTrustResponse};

// self
use crate::{
	_prelude::*,
	auth::{ResolvedUser, UserAssertion, UserAuthType},
	context::RequestContext,
	error::{AcquisitionError, ErrorKind},
	flows::EngineOptions,
	http::{HttpExecutor, HttpTransport, TransportErrorMapper},
	oauth::GrantType,
};

/// Classification produced by the federation chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FederationOutcome {
	/// The cloud directory authenticates the user; the password grant applies.
	Managed,
	/// A federation service issued an assertion that replaces the password grant.
	Federated(UserAssertion),
}

pub(crate) struct FederationResolver<'a, C, M>
where
	C: ?Sized,
	M: ?Sized,
{
	http: &'a HttpExecutor<C, M>,
	options: &'a EngineOptions,
}
impl<'a, C, M> FederationResolver<'a, C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(http: &'a HttpExecutor<C, M>, options: &'a EngineOptions) -> Self {
		Self { http, options }
	}

	/// Runs realm discovery and, for federated accounts, the MEX and WS-Trust steps.
	pub(crate) async fn resolve(
		&self,
		user_realm_endpoint: &Url,
		user: &ResolvedUser,
		ctx: &RequestContext,
	) -> Result<FederationOutcome> {
		let realm =
			realm::discover_user_realm(self.http, user_realm_endpoint, user.username(), ctx).await?;

		match realm.account_type() {
			AccountType::Managed => Ok(FederationOutcome::Managed),
			AccountType::Federated => {
				let Some(metadata_url) = realm.federation_metadata_url() else {
					ctx.logger.warning("Federated account is missing a federation metadata URL.");

					return Err(ErrorKind::MissingFederationMetadataUrl.into());
				};
				let address = self.fetch_address(metadata_url, user.auth_type(), ctx).await?;
				let audience = realm
					.cloud_audience_urn
					.as_deref()
					.filter(|urn| !urn.trim().is_empty())
					.unwrap_or(self.options.default_audience_urn.as_str());
				let response = self.exchange(&address, user, audience, ctx).await?;

				ctx.logger.info(format_args!(
					"WS-Trust returned token type `{}`.",
					response.token_type
				));

				assertion_from_response(response, user.username(), self.options.strict_token_type)
					.map(FederationOutcome::Federated)
			},
			AccountType::Unknown(raw) => {
				ctx.logger.warning(format_args!("Unknown account type `{raw}`."));

				Err(AcquisitionError::with_message(
					ErrorKind::UnknownUserType,
					format!("Account type `{raw}` is neither federated nor managed."),
				)
				.into())
			},
		}
	}

	async fn fetch_address(
		&self,
		metadata_url: &str,
		auth_type: UserAuthType,
		ctx: &RequestContext,
	) -> Result<WsTrustAddress> {
		match mex::fetch_ws_trust_address(self.http, metadata_url, auth_type, ctx).await {
			Ok(address) => Ok(address),
			Err(Error::Cancelled) => Err(Error::Cancelled),
			Err(err @ Error::Document(_)) =>
				Err(err.wrap_as(ErrorKind::ParsingWsMetadataExchangeFailed)),
			Err(err) if err.kind() == Some(ErrorKind::WsTrustEndpointNotFoundInMetadataDocument) =>
				match auth_type {
					UserAuthType::IntegratedAuth => Err(err.wrap_as(ErrorKind::IntegratedAuthFailed)),
					UserAuthType::UsernamePassword => Err(err),
				},
			Err(err) => Err(err.wrap_as(ErrorKind::AccessingWsMetadataExchangeFailed)),
		}
	}

	async fn exchange(
		&self,
		address: &WsTrustAddress,
		user: &ResolvedUser,
		audience: &str,
		ctx: &RequestContext,
	) -> Result<WsTrustResponse> {
		wstrust::send_ws_trust_request(
			self.http,
			address,
			user,
			audience,
			self.options.ws_trust_lifetime,
			ctx,
		)
		.await
		.map_err(|err| match err {
			Error::Cancelled => Error::Cancelled,
			err if err.kind() == Some(ErrorKind::ParsingWsTrustResponseFailed) => err,
			err => {
				ctx.logger.warning(format_args!("WS-Trust exchange failed: {err}"));

				let message = err.to_string();

				AcquisitionError::with_message(ErrorKind::ParsingWsTrustResponseFailed, message)
					.with_inner(err)
					.into()
			},
		})
	}
}

/// Maps a WS-Trust token onto the bearer grant it is redeemed with.
///
/// The SAML 1.1 token type selects `saml1_1-bearer`. Everything else selects `saml2-bearer`
/// unless `strict` is set, in which case only the SAML 2.0 token type is accepted.
pub(crate) fn assertion_from_response(
	response: WsTrustResponse,
	user_name: &str,
	strict: bool,
) -> Result<UserAssertion> {
	let grant = match response.token_type.as_str() {
		SAML1_ASSERTION => GrantType::Saml11Bearer,
		SAML2_ASSERTION => GrantType::Saml2Bearer,
		other if strict =>
			return Err(AcquisitionError::with_message(
				ErrorKind::ParsingWsTrustResponseFailed,
				format!("WS-Trust token type `{other}` is not supported."),
			)
			.into()),
		_ => GrantType::Saml2Bearer,
	};

	Ok(UserAssertion::new(response.token, grant.as_str())?.with_user_name(user_name))
}
