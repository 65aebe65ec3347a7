//! Transport primitives for identity endpoint exchanges.
//!
//! The module exposes [`HttpTransport`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can integrate custom HTTP clients
//! without losing the engine's error classification. Implementations call
//! [`ResponseMetadataSlot::take`] before dispatching a request and
//! [`ResponseMetadataSlot::store`] once an HTTP status or retry hint is known.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		HeaderMap, HeaderValue, Method, Request,
		header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER},
	},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, context::RequestContext, error::TransportError};

/// Header carrying the client-generated correlation identifier.
pub const CLIENT_REQUEST_ID: &str = "client-request-id";
/// Header asking the provider to echo the correlation identifier back.
pub const RETURN_CLIENT_REQUEST_ID: &str = "return-client-request-id";

/// Abstraction over HTTP transports capable of executing identity endpoint exchanges while
/// publishing response metadata to the engine's error mapping.
///
/// The trait acts as the engine's only dependency on an HTTP stack. Callers provide an
/// implementation (typically behind `Arc<T>` where `T: HttpTransport`) and the engine requests
/// short-lived [`AsyncHttpClient`] handles that each carry a clone of a
/// [`ResponseMetadataSlot`]. Implementations must be `Send + Sync + 'static` so they can be
/// shared across engine instances, and the request futures returned by their handles must be
/// `Send` for the lifetime of the in-flight operation.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across requests.
	/// - Once an HTTP response provides status headers, save them with
	///   [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Endpoint families the engine talks to; used for error labelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointKind {
	/// Authority instance discovery.
	InstanceDiscovery,
	/// Home-realm (user realm) discovery.
	UserRealm,
	/// WS metadata exchange document.
	MetadataExchange,
	/// WS-Trust security token service.
	WsTrust,
	/// OAuth 2.0 token endpoint.
	Token,
	/// OAuth 2.0 device authorization endpoint.
	DeviceCode,
}
impl EndpointKind {
	/// Returns a stable label suitable for log fields and messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::InstanceDiscovery => "instance_discovery",
			Self::UserRealm => "user_realm",
			Self::MetadataExchange => "metadata_exchange",
			Self::WsTrust => "ws_trust",
			Self::Token => "token",
			Self::DeviceCode => "device_code",
		}
	}
}
impl Display for EndpointKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps HTTP transport failures into engine [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into an engine error.
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Mapper usable with any transport; every transport-specific failure becomes
/// [`TransportError::Network`].
#[derive(Clone, Debug, Default)]
pub struct GenericTransportErrorMapper;
impl<E> TransportErrorMapper<E> for GenericTransportErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		_metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error {
		map_common_transport_error(endpoint, error, |inner| {
			TransportError::network(endpoint.as_str(), inner).into()
		})
	}
}

/// Shared classification for the non-transport-specific arms of [`HttpClientError`].
pub(crate) fn map_common_transport_error<E>(
	endpoint: EndpointKind,
	error: HttpClientError<E>,
	on_transport: impl FnOnce(Box<E>) -> Error,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match error {
		HttpClientError::Reqwest(inner) => on_transport(inner),
		HttpClientError::Http(inner) => crate::error::ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) =>
			TransportError::network(endpoint.as_str(), message).into(),
		_ => TransportError::network(endpoint.as_str(), "unknown HTTP client failure").into(),
	}
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Pairs a transport with its error mapper and applies cancellation to every call.
pub(crate) struct HttpExecutor<C, M>
where
	C: ?Sized,
	M: ?Sized,
{
	transport: Arc<C>,
	mapper: Arc<M>,
}
impl<C, M> HttpExecutor<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(transport: Arc<C>, mapper: Arc<M>) -> Self {
		Self { transport, mapper }
	}

	/// Sends `request`, racing it against the context's cancellation token.
	pub(crate) async fn execute(
		&self,
		endpoint: EndpointKind,
		request: HttpRequest,
		ctx: &RequestContext,
	) -> Result<HttpResponse> {
		let slot = ResponseMetadataSlot::default();
		let handle = self.transport.with_metadata(slot.clone());
		let outcome = tokio::select! {
			biased;
			_ = ctx.cancellation.cancelled() => return Err(Error::Cancelled),
			outcome = handle.call(request) => outcome,
		};

		outcome.map_err(|err| self.mapper.map_transport_error(endpoint, slot.take().as_ref(), err))
	}
}
impl<C, M> Clone for HttpExecutor<C, M>
where
	C: ?Sized,
	M: ?Sized,
{
	fn clone(&self) -> Self {
		Self { transport: Arc::clone(&self.transport), mapper: Arc::clone(&self.mapper) }
	}
}

/// Builds a GET request carrying the correlation headers.
pub(crate) fn get(url: &Url, ctx: &RequestContext) -> Result<HttpRequest> {
	let request = correlated(Method::GET, url, ctx)
		.header(ACCEPT, HeaderValue::from_static("application/json"))
		.body(Vec::new())
		.map_err(crate::error::ConfigError::from)?;

	Ok(request)
}

/// Builds a form-encoded POST request carrying the correlation headers.
pub(crate) fn post_form(url: &Url, body: String, ctx: &RequestContext) -> Result<HttpRequest> {
	let request = correlated(Method::POST, url, ctx)
		.header(ACCEPT, HeaderValue::from_static("application/json"))
		.header(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"))
		.body(body.into_bytes())
		.map_err(crate::error::ConfigError::from)?;

	Ok(request)
}

/// Builds a SOAP 1.2 POST request carrying the correlation headers.
pub(crate) fn post_soap(url: &Url, body: String, ctx: &RequestContext) -> Result<HttpRequest> {
	let request = correlated(Method::POST, url, ctx)
		.header(CONTENT_TYPE, HeaderValue::from_static("application/soap+xml; charset=utf-8"))
		.body(body.into_bytes())
		.map_err(crate::error::ConfigError::from)?;

	Ok(request)
}

fn correlated(method: Method, url: &Url, ctx: &RequestContext) -> oauth2::http::request::Builder {
	Request::builder()
		.method(method)
		.uri(url.as_str())
		.header(CLIENT_REQUEST_ID, ctx.correlation_id.to_string())
		.header(RETURN_CLIENT_REQUEST_ID, "true")
}

/// Returns `true` when the response carries a 2xx status.
pub(crate) fn is_success(response: &HttpResponse) -> bool {
	response.status().is_success()
}

/// Returns the response body as text, replacing invalid UTF-8 sequences.
pub(crate) fn body_text(response: &HttpResponse) -> String {
	String::from_utf8_lossy(response.body()).into_owned()
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Identity endpoints return results directly, so any custom [`ReqwestClient`] should be
/// configured not to follow redirects.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`HttpTransport`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Parses a `Retry-After` header given either as delta-seconds or as an HTTP date.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
