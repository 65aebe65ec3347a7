//! OAuth 2.0 token endpoint executor.

pub use oauth2;

// std
use std::collections::BTreeMap;
// crates.io
use oauth2::{HttpClientError, HttpResponse};
use serde::de::{self, Deserializer, Visitor};
// self
use crate::{
	_prelude::*,
	context::RequestContext,
	error::{ConfigError, ServiceError, TransportError},
	http::{self, EndpointKind, HttpExecutor, HttpTransport, ResponseMetadata, TransportErrorMapper},
};

/// Request parameter names used by the token and device-code endpoints.
pub mod param {
	/// `grant_type`.
	pub const GRANT_TYPE: &str = "grant_type";
	/// `client_id`.
	pub const CLIENT_ID: &str = "client_id";
	/// `client_secret`.
	pub const CLIENT_SECRET: &str = "client_secret";
	/// `client_assertion_type`.
	pub const CLIENT_ASSERTION_TYPE: &str = "client_assertion_type";
	/// `client_assertion`.
	pub const CLIENT_ASSERTION: &str = "client_assertion";
	/// `resource`.
	pub const RESOURCE: &str = "resource";
	/// `scope`.
	pub const SCOPE: &str = "scope";
	/// `username`.
	pub const USERNAME: &str = "username";
	/// `password`.
	pub const PASSWORD: &str = "password";
	/// `assertion`.
	pub const ASSERTION: &str = "assertion";
	/// `refresh_token`.
	pub const REFRESH_TOKEN: &str = "refresh_token";
	/// `code` (authorization code or device code).
	pub const CODE: &str = "code";
	/// `redirect_uri`.
	pub const REDIRECT_URI: &str = "redirect_uri";
	/// `code_verifier`.
	pub const CODE_VERIFIER: &str = "code_verifier";
}

/// Scope value requesting an id token alongside the access token.
pub const OPENID_SCOPE: &str = "openid";

const REDACTED_PARAMETERS: &[&str] = &[
	param::CLIENT_SECRET,
	param::CLIENT_ASSERTION,
	param::PASSWORD,
	param::ASSERTION,
	param::REFRESH_TOKEN,
	param::CODE,
	param::CODE_VERIFIER,
];

/// Grant types understood by the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// Resource owner password credentials.
	Password,
	/// SAML 1.1 bearer assertion.
	Saml11Bearer,
	/// SAML 2.0 bearer assertion.
	Saml2Bearer,
	/// Refresh token redemption.
	RefreshToken,
	/// Client credentials.
	ClientCredentials,
	/// Authorization code redemption.
	AuthorizationCode,
	/// Device code polling.
	DeviceCode,
}
impl GrantType {
	/// Returns the `grant_type` wire value.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Password => "password",
			Self::Saml11Bearer => "urn:ietf:params:oauth:grant-type:saml1_1-bearer",
			Self::Saml2Bearer => "urn:ietf:params:oauth:grant-type:saml2-bearer",
			Self::RefreshToken => "refresh_token",
			Self::ClientCredentials => "client_credentials",
			Self::AuthorizationCode => "authorization_code",
			Self::DeviceCode => "device_code",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Form parameters of one token request. Inserting an existing name replaces its value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestParameters(BTreeMap<String, String>);
impl RequestParameters {
	/// Sets `name` to `value`, replacing any earlier value.
	pub fn insert(&mut self, name: &str, value: impl Into<String>) {
		self.0.insert(name.to_owned(), value.into());
	}

	/// Returns the value stored for `name`.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(name).map(String::as_str)
	}

	/// Returns `true` when `name` is present.
	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	/// Number of parameters.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no parameters are set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Serializes the parameters as an `application/x-www-form-urlencoded` body.
	pub fn to_form(&self) -> String {
		url::form_urlencoded::Serializer::new(String::new()).extend_pairs(self.0.iter()).finish()
	}
}
impl Debug for RequestParameters {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for (name, value) in &self.0 {
			if REDACTED_PARAMETERS.contains(&name.as_str()) {
				map.entry(name, &"<redacted>");
			} else {
				map.entry(name, value);
			}
		}

		map.finish()
	}
}

/// Successful token endpoint response body.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
	/// Issued access token.
	pub access_token: String,
	/// Token type, typically `Bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Lifetime in seconds.
	#[serde(default, deserialize_with = "seconds_lenient")]
	pub expires_in: Option<i64>,
	/// Extended lifetime in seconds, honored during provider outages.
	#[serde(default, deserialize_with = "seconds_lenient")]
	pub ext_expires_in: Option<i64>,
	/// Refresh token, when issued.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Resource the token was issued for.
	#[serde(default)]
	pub resource: Option<String>,
	/// OpenID Connect id token, when issued.
	#[serde(default)]
	pub id_token: Option<String>,
	/// Granted scope.
	#[serde(default)]
	pub scope: Option<String>,
}
impl TokenResponse {
	/// Returns the positive lifetime, failing for zero or missing values.
	pub fn lifetime(&self) -> Result<Duration> {
		match self.expires_in {
			Some(secs) if secs > 0 => Ok(Duration::seconds(secs)),
			_ => Err(crate::error::AcquisitionError::with_message(
				crate::error::ErrorKind::TokenResponseInvalid,
				"The token response carries no positive `expires_in`.",
			)
			.into()),
		}
	}
}

#[derive(Deserialize)]
struct ProviderErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
	#[serde(default)]
	error_codes: Vec<i64>,
	#[serde(default)]
	correlation_id: Option<String>,
}

/// Deserializes a JSON number or numeric string into seconds.
pub(crate) fn seconds_lenient<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	struct SecondsVisitor;
	impl<'de> Visitor<'de> for SecondsVisitor {
		type Value = Option<i64>;

		fn expecting(&self, f: &mut Formatter) -> FmtResult {
			f.write_str("a number of seconds as integer or string")
		}

		fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
			Ok(Some(v))
		}

		fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
			i64::try_from(v).map(Some).map_err(E::custom)
		}

		fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
			Ok(Some(v as i64))
		}

		fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
			v.trim().parse::<i64>().map(Some).map_err(E::custom)
		}

		fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
			Ok(None)
		}

		fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
			Ok(None)
		}
	}

	deserializer.deserialize_any(SecondsVisitor)
}

/// POSTs `params` to a token-style endpoint and parses the JSON success body into `T`.
///
/// Error statuses and malformed bodies surface as [`ServiceError`].
pub(crate) async fn send_form<T, C, M>(
	executor: &HttpExecutor<C, M>,
	endpoint: EndpointKind,
	url: &Url,
	params: &RequestParameters,
	ctx: &RequestContext,
) -> Result<T>
where
	T: for<'de> Deserialize<'de>,
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let request = http::post_form(url, params.to_form(), ctx)?;
	let response = executor.execute(endpoint, request, ctx).await?;

	parse_json_response(&response)
}

/// Sends one token request.
pub(crate) async fn send_token_request<C, M>(
	executor: &HttpExecutor<C, M>,
	token_endpoint: &Url,
	params: &RequestParameters,
	ctx: &RequestContext,
) -> Result<TokenResponse>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	ctx.logger.verbose(format_args!(
		"Sending token request with grant `{}`.",
		params.get(param::GRANT_TYPE).unwrap_or("unknown")
	));
	ctx.logger.verbose_pii(format_args!("Token endpoint: {token_endpoint}."));

	let response = send_form(executor, EndpointKind::Token, token_endpoint, params, ctx).await;

	match &response {
		Ok(_) => ctx.logger.info("Token request succeeded."),
		Err(Error::Service(err)) =>
			ctx.logger.warning(format_args!("Token request failed with `{}`.", err.code)),
		Err(_) => {},
	}

	response
}

/// Parses a JSON response: 2xx bodies into `T`, everything else into a [`ServiceError`].
pub(crate) fn parse_json_response<T>(response: &HttpResponse) -> Result<T>
where
	T: for<'de> Deserialize<'de>,
{
	let status = response.status().as_u16();

	if !http::is_success(response) {
		return Err(service_error_from_body(response).into());
	}

	let mut deserializer = serde_json::Deserializer::from_slice(response.body());
	let parsed: Result<T, _> = serde_path_to_error::deserialize(&mut deserializer);

	parsed.map_err(|err| {
		ServiceError::new(ServiceError::INVALID_RESPONSE)
			.with_status(status)
			.with_description(format!(
				"Response body could not be parsed at `{}`: {}",
				err.path(),
				err.inner()
			))
			.into()
	})
}

/// Builds a [`ServiceError`] from an error-status response.
pub(crate) fn service_error_from_body(response: &HttpResponse) -> ServiceError {
	let status = response.status().as_u16();
	let retry_after = http::parse_retry_after(response.headers());
	let mut err = match serde_json::from_slice::<ProviderErrorBody>(response.body()) {
		Ok(body) => ServiceError {
			status: Some(status),
			code: body.error,
			description: body.error_description,
			error_codes: body.error_codes,
			correlation_id: body.correlation_id,
			retry_after: None,
		},
		Err(_) => {
			let text = http::body_text(response);
			let err = ServiceError::new(ServiceError::UNEXPECTED_STATUS).with_status(status);

			if text.trim().is_empty() { err } else { err.with_description(text) }
		},
	};

	err.retry_after = retry_after;

	err
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		http::map_common_transport_error(endpoint, err, |inner| {
			map_reqwest_error(endpoint, meta, *inner)
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	endpoint: EndpointKind,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout {
			endpoint: endpoint.as_str(),
			status: meta
				.and_then(|value| value.status)
				.or_else(|| err.status().map(|code| code.as_u16())),
		}
		.into();
	}

	TransportError::network(endpoint.as_str(), err).into()
}
