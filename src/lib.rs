//! Client-side token acquisition for OAuth 2.0 identity providers: password, bearer assertion,
//! federated WS-Trust, refresh-token, client-credential, interactive and device-code flows running
//! through one request pipeline backed by a concurrency-safe token cache.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod authority;
pub mod cache;
pub mod context;
pub mod error;
pub mod federation;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod platform;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::BTreeMap;
	// crates.io
	use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
	// self
	use crate::{
		cache::{MemoryTokenCache, TokenCache},
		flows::{Engine, EngineOptions},
		http::{
			GenericTransportErrorMapper, HttpTransport, ReqwestHttpClient, ResponseMetadata,
			ResponseMetadataSlot,
		},
		oauth::ReqwestTransportErrorMapper,
	};

	/// Engine type alias used by reqwest-backed integration tests.
	pub type ReqwestTestEngine = Engine<ReqwestHttpClient, ReqwestTransportErrorMapper>;
	/// Engine type alias used by tests that script every HTTP exchange in-process.
	pub type ScriptedEngine = Engine<ScriptedTransport, GenericTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs an [`Engine`] backed by an in-memory cache and the reqwest transport used
	/// across integration tests.
	pub fn build_reqwest_test_engine(
		options: EngineOptions,
	) -> (ReqwestTestEngine, Arc<MemoryTokenCache>) {
		let cache_backend = Arc::new(MemoryTokenCache::default());
		let cache: Arc<dyn TokenCache> = cache_backend.clone();
		let engine = Engine::with_http_client(
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_cache(cache)
		.with_options(options);

		(engine, cache_backend)
	}

	/// Constructs an [`Engine`] whose every network call is answered by `transport`.
	pub fn build_scripted_engine(
		transport: ScriptedTransport,
		options: EngineOptions,
	) -> (ScriptedEngine, Arc<MemoryTokenCache>) {
		let cache_backend = Arc::new(MemoryTokenCache::default());
		let cache: Arc<dyn TokenCache> = cache_backend.clone();
		let engine = Engine::with_http_client(transport, Arc::new(GenericTransportErrorMapper))
			.with_cache(cache)
			.with_options(options);

		(engine, cache_backend)
	}

	/// Request observed by a [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method name.
		pub method: String,
		/// Full request URL including the query string.
		pub url: Url,
		/// Request headers flattened into name/value pairs.
		pub headers: Vec<(String, String)>,
		/// UTF-8 request body.
		pub body: String,
	}
	impl RecordedRequest {
		/// Decodes a form-encoded body into a sorted map.
		pub fn form(&self) -> BTreeMap<String, String> {
			url::form_urlencoded::parse(self.body.as_bytes()).into_owned().collect()
		}

		/// Returns the first header value with the provided (case-insensitive) name.
		pub fn header(&self, name: &str) -> Option<&str> {
			self.headers
				.iter()
				.find(|(key, _)| key.eq_ignore_ascii_case(name))
				.map(|(_, value)| value.as_str())
		}
	}

	/// Error emitted when a [`ScriptedTransport`] is told to fail.
	#[derive(Debug)]
	pub struct ScriptedTransportError(pub String);
	impl Display for ScriptedTransportError {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			write!(f, "Scripted transport failure: {}.", self.0)
		}
	}
	impl StdError for ScriptedTransportError {}

	#[derive(Clone, Debug)]
	enum ScriptedReply {
		Respond { status: u16, content_type: &'static str, body: String },
		Fail(String),
	}

	#[derive(Default)]
	struct ScriptedState {
		routes: Mutex<HashMap<String, Vec<ScriptedReply>>>,
		requests: Mutex<Vec<RecordedRequest>>,
	}

	/// In-process [`HttpTransport`] that answers requests by URL path and records them.
	///
	/// Queued replies for a path are served in order and the last one repeats. Unknown paths
	/// answer with HTTP 404 and an empty body.
	#[derive(Clone, Default)]
	pub struct ScriptedTransport(Arc<ScriptedState>);
	impl ScriptedTransport {
		/// Answers `path` with a JSON body.
		pub fn json(&self, path: &str, status: u16, body: impl Into<String>) -> &Self {
			self.route(path, ScriptedReply::Respond {
				status,
				content_type: "application/json",
				body: body.into(),
			})
		}

		/// Answers `path` with an XML body.
		pub fn xml(&self, path: &str, status: u16, body: impl Into<String>) -> &Self {
			self.route(path, ScriptedReply::Respond {
				status,
				content_type: "application/soap+xml; charset=utf-8",
				body: body.into(),
			})
		}

		/// Queues a JSON reply for `path` behind the replies already scripted for it.
		pub fn queue_json(&self, path: &str, status: u16, body: impl Into<String>) -> &Self {
			self.0.routes.lock().entry(path.to_owned()).or_default().push(ScriptedReply::Respond {
				status,
				content_type: "application/json",
				body: body.into(),
			});

			self
		}

		/// Fails every request to `path` at the transport layer.
		pub fn fail(&self, path: &str, message: impl Into<String>) -> &Self {
			self.route(path, ScriptedReply::Fail(message.into()))
		}

		/// Returns every request observed so far, in order.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.0.requests.lock().clone()
		}

		/// Returns the requests whose URL path equals `path`.
		pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
			self.0
				.requests
				.lock()
				.iter()
				.filter(|request| request.url.path() == path)
				.cloned()
				.collect()
		}

		fn route(&self, path: &str, reply: ScriptedReply) -> &Self {
			self.0.routes.lock().insert(path.to_owned(), vec![reply]);

			self
		}

		fn answer(&self, request: HttpRequest) -> Result<HttpResponse, ScriptedTransportError> {
			let url = Url::parse(&request.uri().to_string())
				.map_err(|err| ScriptedTransportError(err.to_string()))?;
			let headers = request
				.headers()
				.iter()
				.map(|(name, value)| {
					(name.as_str().to_owned(), value.to_str().unwrap_or_default().to_owned())
				})
				.collect();
			let recorded = RecordedRequest {
				method: request.method().as_str().to_owned(),
				url: url.clone(),
				headers,
				body: String::from_utf8_lossy(request.body()).into_owned(),
			};

			self.0.requests.lock().push(recorded);

			let reply = self.0.routes.lock().get_mut(url.path()).and_then(|replies| {
				if replies.len() > 1 { Some(replies.remove(0)) } else { replies.first().cloned() }
			});

			match reply {
				Some(ScriptedReply::Respond { status, content_type, body }) => {
					let mut response = HttpResponse::new(body.into_bytes());

					*response.status_mut() = oauth2::http::StatusCode::from_u16(status)
						.map_err(|err| ScriptedTransportError(err.to_string()))?;
					response.headers_mut().insert(
						oauth2::http::header::CONTENT_TYPE,
						oauth2::http::HeaderValue::from_static(content_type),
					);

					Ok(response)
				},
				Some(ScriptedReply::Fail(message)) => Err(ScriptedTransportError(message)),
				None => {
					let mut response = HttpResponse::new(Vec::new());

					*response.status_mut() = oauth2::http::StatusCode::NOT_FOUND;

					Ok(response)
				},
			}
		}
	}
	impl HttpTransport for ScriptedTransport {
		type Handle = ScriptedHandle;
		type TransportError = ScriptedTransportError;

		fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
			ScriptedHandle { transport: self.clone(), slot }
		}
	}

	/// Handle returned by [`ScriptedTransport::with_metadata`].
	pub struct ScriptedHandle {
		transport: ScriptedTransport,
		slot: ResponseMetadataSlot,
	}
	impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
		type Error = HttpClientError<ScriptedTransportError>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			Box::pin(async move {
				self.slot.take();

				let response = self.transport.answer(request).map_err(Box::new)?;

				self.slot.store(ResponseMetadata {
					status: Some(response.status().as_u16()),
					retry_after: None,
				});

				Ok(response)
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;
	pub use uuid::Uuid;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
#[cfg(all(test, not(feature = "tracing")))] use tracing_subscriber as _;
