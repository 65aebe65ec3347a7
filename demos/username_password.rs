//! Demonstrates the username/password flow for a managed account: realm discovery classifies
//! the user, then the password grant is redeemed at the token endpoint.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_acquire::{
	auth::UserCredential,
	flows::{EngineOptions, RequestData, ReqwestEngine},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let realm_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/common/userrealm/alice@contoso.com");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"ver\":\"1.0\",\"account_type\":\"Managed\",\"domain_name\":\"contoso.com\"}");
		})
		.await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/contoso.com/oauth2/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"alice-access\",\"token_type\":\"Bearer\",\"expires_in\":3600,\"refresh_token\":\"alice-refresh\"}",
			);
		})
		.await;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let options = EngineOptions { validate_authority: false, ..Default::default() };
	let engine = ReqwestEngine::with_http_client(http_client, ReqwestTransportErrorMapper)
		.with_options(options);
	let request = RequestData::builder(
		format!("https://{}/contoso.com", server.address()),
		"desktop-client",
		"https://graph.contoso.com",
	)
	.build()?;
	let result = engine
		.acquire_with_user_credential(
			&request,
			UserCredential::username_password("alice@contoso.com", "correct horse"),
		)
		.await?;

	println!("Access token for {:?}: {}.", result.key.user, result.access_token().expose());
	println!("Expires on {}.", result.expires_on());

	realm_mock.assert_async().await;
	token_mock.assert_async().await;

	Ok(())
}
