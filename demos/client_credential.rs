//! Demonstrates a confidential client acquiring an app-only token with the default reqwest
//! transport, then reusing it from the in-memory token cache.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_acquire::{
	auth::ClientCredential,
	flows::{EngineOptions, RequestData, ReqwestEngine, TokenSource},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/tenant-acme/oauth2/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let mut options = EngineOptions::default();

	options.trusted_hosts.push(server.address().to_string());

	let engine = ReqwestEngine::with_http_client(http_client, ReqwestTransportErrorMapper)
		.with_options(options);
	let request = RequestData::builder(
		format!("https://{}/tenant-acme", server.address()),
		"service-router",
		"https://api.acme.example",
	)
	.client_credential(ClientCredential::secret("super-secret"))
	.build()?;
	let first = engine.acquire_for_client(&request).await?;
	let second = engine.acquire_for_client(&request).await?;

	println!("Access token: {}.", first.access_token().expose());
	println!("Second call served from cache: {}.", second.source == TokenSource::Cache);

	token_mock.assert_async().await;

	Ok(())
}
