//! Engine-level error types shared across flows, the federation chain, and token caches.

// self
use crate::_prelude::*;

/// Engine-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Client-side failures carry an [`ErrorKind`] and, where one exists, the lower-level cause as an
/// inner [`Error`]; provider-returned failures are surfaced verbatim as [`ServiceError`].
#[derive(Debug, ThisError)]
pub enum Error {
	/// Client-side acquisition failure classified by [`ErrorKind`].
	#[error(transparent)]
	Acquisition(#[from] AcquisitionError),
	/// Error body returned by the identity provider or a federated endpoint.
	#[error(transparent)]
	Service(#[from] ServiceError),
	/// Token cache backend failure.
	#[error(transparent)]
	Cache(#[from] crate::cache::CacheError),
	/// XML document returned by a federated endpoint is not well-formed.
	#[error(transparent)]
	Document(#[from] DocumentError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The caller cancelled the acquisition while a network call was in flight.
	#[error("Token acquisition was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns the client-side taxonomy kind, if this is an acquisition failure.
	pub fn kind(&self) -> Option<ErrorKind> {
		match self {
			Self::Acquisition(err) => Some(err.kind),
			_ => None,
		}
	}

	/// Returns the wrapped lower-level cause of an acquisition failure.
	pub fn inner(&self) -> Option<&Error> {
		match self {
			Self::Acquisition(err) => err.inner.as_deref(),
			_ => None,
		}
	}

	/// Returns the provider error, if this is a service-level failure.
	pub fn service(&self) -> Option<&ServiceError> {
		match self {
			Self::Service(err) => Some(err),
			_ => None,
		}
	}

	/// Returns `true` when the caller cancelled the acquisition.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	/// Wraps `self` as the inner cause of a `kind` failure; cancellation passes through untouched.
	pub(crate) fn wrap_as(self, kind: ErrorKind) -> Self {
		match self {
			Self::Cancelled => Self::Cancelled,
			other => AcquisitionError::new(kind).with_inner(other).into(),
		}
	}
}
impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Self {
		AcquisitionError::new(kind).into()
	}
}

/// Client-side failure taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// No username was supplied and the platform could not provide one.
	UnknownUser,
	/// A user assertion was constructed without an assertion type.
	UserCredentialAssertionTypeEmpty,
	/// A managed account requires a password for the direct password grant.
	PasswordRequiredForManagedUserError,
	/// User-realm discovery could not be performed or parsed.
	UserRealmDiscoveryFailed,
	/// User-realm discovery returned an account type other than federated or managed.
	UnknownUserType,
	/// A federated account did not advertise a federation metadata URL.
	MissingFederationMetadataUrl,
	/// The metadata-exchange document holds no endpoint for the requested auth type.
	WsTrustEndpointNotFoundInMetadataDocument,
	/// Integrated (Windows) authentication could not be negotiated.
	IntegratedAuthFailed,
	/// The metadata-exchange document is malformed.
	ParsingWsMetadataExchangeFailed,
	/// The metadata-exchange document could not be fetched.
	AccessingWsMetadataExchangeFailed,
	/// The WS-Trust exchange failed or returned no usable token.
	ParsingWsTrustResponseFailed,
	/// Instance discovery rejected the authority host.
	AuthorityNotInValidList,
	/// Instance discovery could not be completed.
	AuthorityValidationFailed,
	/// Validation was requested for an authority type that does not support it.
	UnsupportedAuthorityValidation,
	/// The flow cannot run against the resolved authority type.
	InvalidAuthorityType,
	/// The interactive redirect returned a different `state` value.
	StateMismatch,
	/// The interactive redirect returned neither a code nor an error.
	AuthorizationCodeMissing,
	/// The device code expired before the user completed sign-in.
	DeviceCodeExpired,
	/// The flow needs user interaction that the caller disallowed or did not wire up.
	UserInteractionRequired,
	/// The token endpoint answered with an unusable success body.
	TokenResponseInvalid,
}
impl ErrorKind {
	/// Returns the stable error code.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::UnknownUser => "unknown_user",
			Self::UserCredentialAssertionTypeEmpty => "user_credential_assertion_type_empty",
			Self::PasswordRequiredForManagedUserError => "password_required_for_managed_user",
			Self::UserRealmDiscoveryFailed => "user_realm_discovery_failed",
			Self::UnknownUserType => "unknown_user_type",
			Self::MissingFederationMetadataUrl => "missing_federation_metadata_url",
			Self::WsTrustEndpointNotFoundInMetadataDocument => "wstrust_endpoint_not_found",
			Self::IntegratedAuthFailed => "integrated_authentication_failed",
			Self::ParsingWsMetadataExchangeFailed => "parsing_ws_metadata_exchange_failed",
			Self::AccessingWsMetadataExchangeFailed => "accessing_ws_metadata_exchange_failed",
			Self::ParsingWsTrustResponseFailed => "parsing_wstrust_response_failed",
			Self::AuthorityNotInValidList => "authority_not_in_valid_list",
			Self::AuthorityValidationFailed => "authority_validation_failed",
			Self::UnsupportedAuthorityValidation => "unsupported_authority_validation",
			Self::InvalidAuthorityType => "invalid_authority_type",
			Self::StateMismatch => "state_mismatch",
			Self::AuthorizationCodeMissing => "authorization_code_missing",
			Self::DeviceCodeExpired => "code_expired",
			Self::UserInteractionRequired => "user_interaction_required",
			Self::TokenResponseInvalid => "token_response_invalid",
		}
	}

	/// Returns the default human-readable message for the kind.
	pub const fn message(self) -> &'static str {
		match self {
			Self::UnknownUser => "Could not identify the logged in user.",
			Self::UserCredentialAssertionTypeEmpty => "The assertion type must not be empty.",
			Self::PasswordRequiredForManagedUserError =>
				"A password is required for a managed user account.",
			Self::UserRealmDiscoveryFailed => "User realm discovery failed.",
			Self::UnknownUserType => "Unknown user type.",
			Self::MissingFederationMetadataUrl =>
				"Federation metadata URL is missing for the federated user.",
			Self::WsTrustEndpointNotFoundInMetadataDocument =>
				"WS-Trust endpoint not found in the metadata document.",
			Self::IntegratedAuthFailed => "Integrated authentication failed.",
			Self::ParsingWsMetadataExchangeFailed => "Parsing the WS metadata exchange failed.",
			Self::AccessingWsMetadataExchangeFailed => "Accessing the WS metadata exchange failed.",
			Self::ParsingWsTrustResponseFailed => "Parsing the WS-Trust response failed.",
			Self::AuthorityNotInValidList => "The authority is not in the list of valid hosts.",
			Self::AuthorityValidationFailed => "Authority validation failed.",
			Self::UnsupportedAuthorityValidation =>
				"Authority validation is not supported for this type of authority.",
			Self::InvalidAuthorityType => "This flow is not supported by the authority type.",
			Self::StateMismatch => "The returned state does not match the sent state.",
			Self::AuthorizationCodeMissing => "The redirect carried no authorization code.",
			Self::DeviceCodeExpired => "The device code has expired.",
			Self::UserInteractionRequired => "User interaction is required to acquire a token.",
			Self::TokenResponseInvalid => "The token endpoint returned an invalid response.",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Client-side failure with its taxonomy kind and optional wrapped cause.
#[derive(Debug, ThisError)]
#[error("{message} (code: {kind})")]
pub struct AcquisitionError {
	/// Primary failure signal.
	pub kind: ErrorKind,
	/// Human-readable message.
	pub message: String,
	/// Lower-level cause preserved for diagnostics.
	#[source]
	pub inner: Option<Box<Error>>,
}
impl AcquisitionError {
	/// Creates an error with the kind's default message.
	pub fn new(kind: ErrorKind) -> Self {
		Self { kind, message: kind.message().into(), inner: None }
	}

	/// Creates an error with a custom message.
	pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self { kind, message: message.into(), inner: None }
	}

	/// Attaches the lower-level cause.
	pub fn with_inner(mut self, inner: impl Into<Error>) -> Self {
		self.inner = Some(Box::new(inner.into()));

		self
	}
}

/// Error body returned by the identity provider or a federated endpoint.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error(
	"Identity provider returned `{code}`: {}.",
	.description.as_deref().unwrap_or("no description")
)]
pub struct ServiceError {
	/// HTTP status code, when available.
	pub status: Option<u16>,
	/// Provider error code (`error` field or SOAP fault subcode).
	pub code: String,
	/// Provider error description.
	pub description: Option<String>,
	/// Numeric provider error codes, when supplied.
	pub error_codes: Vec<i64>,
	/// Provider-side correlation identifier, when supplied.
	pub correlation_id: Option<String>,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<Duration>,
}
impl ServiceError {
	/// Code used when a response body cannot be interpreted.
	pub const INVALID_RESPONSE: &'static str = "invalid_response";
	/// Code used when the provider answered with an error status but no structured body.
	pub const UNEXPECTED_STATUS: &'static str = "unexpected_status";

	/// Creates a service error with the provided code.
	pub fn new(code: impl Into<String>) -> Self {
		Self {
			status: None,
			code: code.into(),
			description: None,
			error_codes: Vec::new(),
			correlation_id: None,
			retry_after: None,
		}
	}

	/// Adds the HTTP status code.
	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);

		self
	}

	/// Adds the provider description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());

		self
	}

	/// Returns `true` while a device-code sign-in is still pending.
	pub fn is_authorization_pending(&self) -> bool {
		self.code == "authorization_pending" || self.code == "slow_down"
	}

	/// Returns `true` when the provider rejected the grant.
	pub fn is_invalid_grant(&self) -> bool {
		self.code == "invalid_grant"
	}
}

/// Malformed XML returned by a federated endpoint.
#[derive(Debug, ThisError)]
pub enum DocumentError {
	/// The document is not well-formed.
	#[error("The {document} document is not well-formed XML.")]
	Malformed {
		/// Which document failed to parse.
		document: &'static str,
		/// Underlying parser failure.
		#[source]
		source: quick_xml::Error,
	},
	/// The document is well-formed so far but is not the expected document.
	#[error("The {document} document is invalid: {reason}.")]
	Invalid {
		/// Which document failed validation.
		document: &'static str,
		/// What was wrong with it.
		reason: &'static str,
	},
}

/// Configuration and validation failures raised by the engine.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Authority URL is not usable.
	#[error("Authority `{authority}` is invalid: {reason}.")]
	InvalidAuthority {
		/// Authority value as supplied.
		authority: String,
		/// Reason the value was rejected.
		reason: &'static str,
	},
	/// An endpoint URL cannot be parsed.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An identifier failed validation.
	#[error("Identifier is invalid.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// A required input was blank.
	#[error("The {field} value must not be empty.")]
	EmptyInput {
		/// Name of the offending field.
		field: &'static str,
	},
	/// A cache entry could not be built from a token response.
	#[error("Unable to build token cache entry.")]
	EntryBuild(#[from] crate::cache::TokenCacheEntryBuilderError),
	/// A collaborator required by the flow was not configured.
	#[error("No {collaborator} is configured.")]
	MissingCollaborator {
		/// Collaborator name.
		collaborator: &'static str,
	},
	/// A timestamp could not be rendered.
	#[error("Timestamp could not be formatted.")]
	Timestamp(#[from] time::error::Format),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint that was being called.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request timed out.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint that was being called.
		endpoint: &'static str,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an identity endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl Into<Box<dyn std::error::Error + Send + Sync>>,
	) -> Self {
		Self::Network { endpoint, source: src.into() }
	}
}
