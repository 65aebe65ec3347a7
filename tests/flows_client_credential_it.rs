// crates.io
use httpmock::prelude::*;
// self
use oauth2_acquire::{
	_preludet::*,
	auth::ClientCredential,
	cache::CacheUser,
	error::ConfigError,
	flows::{EngineOptions, RequestData, TokenSource},
};

const AUTHORITY: &str = "https://login.microsoftonline.com/contoso.com";
const CLIENT_ID: &str = "daemon-app";
const CLIENT_SECRET: &str = "daemon-secret";
const RESOURCE: &str = "https://graph.contoso.com";

/// Options trusting the mock server so no instance discovery is attempted against it.
fn trusting(server: &MockServer) -> EngineOptions {
	let mut options = EngineOptions::default();

	options.trusted_hosts.push(server.address().to_string());

	options
}

fn request_for(server: &MockServer) -> RequestData {
	RequestData::builder(format!("https://{}/tenant-cc", server.address()), CLIENT_ID, RESOURCE)
		.client_credential(ClientCredential::secret(CLIENT_SECRET))
		.build()
		.expect("Request fixture should build.")
}

#[tokio::test]
async fn client_credential_caches_app_token_after_success() {
	let server = MockServer::start_async().await;
	let (engine, cache) = build_reqwest_test_engine(trusting(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/tenant-cc/oauth2/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"app-token\",\"token_type\":\"Bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let request = request_for(&server);
	let first =
		engine.acquire_for_client(&request).await.expect("Initial client request should succeed.");
	let second =
		engine.acquire_for_client(&request).await.expect("Cached client request should succeed.");

	assert_eq!(first.access_token().expose(), "app-token");
	assert_eq!(first.source, TokenSource::Network);
	assert_eq!(first.key.user, CacheUser::NoUser);
	assert!(first.user_info().is_none());
	assert_eq!(second.source, TokenSource::Cache);
	assert_eq!(cache.len(), 1);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn client_credential_provider_errors_surface_as_service_errors() {
	let server = MockServer::start_async().await;
	let (engine, cache) = build_reqwest_test_engine(trusting(&server));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/tenant-cc/oauth2/token");
			then.status(401).header("content-type", "application/json").body(
				"{\"error\":\"invalid_client\",\"error_description\":\"Bad secret.\",\"error_codes\":[7000215]}",
			);
		})
		.await;
	let err = engine
		.acquire_for_client(&request_for(&server))
		.await
		.expect_err("Rejected client credentials should fail.");
	let service = err.service().expect("Provider errors should be service errors.");

	assert_eq!(service.code, "invalid_client");
	assert_eq!(service.status, Some(401));
	assert_eq!(service.error_codes, vec![7000215]);
	assert!(cache.is_empty());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn client_credential_form_carries_secret_without_openid_scope() {
	let transport = ScriptedTransport::default();

	transport.json(
		"/contoso.com/oauth2/token",
		200,
		r#"{"access_token":"app-token","expires_in":1800}"#,
	);

	let (engine, _) = build_scripted_engine(transport.clone(), EngineOptions::default());
	let request = RequestData::builder(AUTHORITY, CLIENT_ID, RESOURCE)
		.client_credential(ClientCredential::secret(CLIENT_SECRET))
		.build()
		.expect("Request fixture should build.");

	engine.acquire_for_client(&request).await.expect("Client credential grant should succeed.");

	let form = transport.requests_to("/contoso.com/oauth2/token")[0].form();

	assert_eq!(form.get("grant_type").map(String::as_str), Some("client_credentials"));
	assert_eq!(form.get("client_id").map(String::as_str), Some(CLIENT_ID));
	assert_eq!(form.get("client_secret").map(String::as_str), Some(CLIENT_SECRET));
	assert!(!form.contains_key("scope"));
}

#[tokio::test]
async fn client_credential_requires_a_credential() {
	let transport = ScriptedTransport::default();
	let (engine, _) = build_scripted_engine(transport.clone(), EngineOptions::default());
	let request = RequestData::builder(AUTHORITY, CLIENT_ID, RESOURCE)
		.build()
		.expect("Request fixture should build.");
	let err = engine
		.acquire_for_client(&request)
		.await
		.expect_err("Client flows without a credential should fail.");

	assert!(matches!(err, Error::Config(ConfigError::EmptyInput { field: "client_credential" })));
	assert!(transport.requests().is_empty());
}
