// self
use oauth2_acquire::{
	_preludet::*,
	auth::UserCredential,
	authority::Authority,
	error::ErrorKind,
	flows::{EngineOptions, Flow, RequestData},
};

const DISCOVERY_PATH: &str = "/common/discovery/instance";
const TOKEN_BODY: &str = r#"{"access_token":"at","expires_in":3600}"#;

fn request(authority: &str) -> RequestData {
	RequestData::builder(authority, "client-1", "https://graph.contoso.com")
		.build()
		.expect("Request fixture should build.")
}

#[tokio::test]
async fn untrusted_host_is_validated_once_through_instance_discovery() {
	let transport = ScriptedTransport::default();

	transport
		.json(
			DISCOVERY_PATH,
			200,
			r#"{"tenant_discovery_endpoint":"https://login.contoso.net/contoso.com/.well-known/openid-configuration"}"#,
		)
		.json("/contoso.com/oauth2/token", 200, TOKEN_BODY);

	let (engine, _) = build_scripted_engine(transport.clone(), EngineOptions::default());
	let request = request("https://login.contoso.net/contoso.com");

	engine.acquire_with_refresh_token(&request, "rt-1").await.expect("First call should succeed.");
	engine.acquire_with_refresh_token(&request, "rt-2").await.expect("Second call should succeed.");

	let discovery = transport.requests_to(DISCOVERY_PATH);

	assert_eq!(discovery.len(), 1);
	assert_eq!(discovery[0].url.host_str(), Some("login.microsoftonline.com"));
	assert!(discovery[0].url.query().is_some_and(|query| query.contains("api-version=1.1")));

	let resolved = engine
		.authorities()
		.cached(request.authority())
		.expect("The validated authority should be cached.");

	assert!(resolved.validated);
}

#[tokio::test]
async fn invalid_instance_is_not_in_the_valid_list() {
	let transport = ScriptedTransport::default();

	transport.json(
		DISCOVERY_PATH,
		400,
		r#"{"error":"invalid_instance","error_description":"Unknown authority host."}"#,
	);

	let (engine, _) = build_scripted_engine(transport.clone(), EngineOptions::default());
	let err = engine
		.acquire_with_refresh_token(&request("https://login.contoso.net/contoso.com"), "rt")
		.await
		.expect_err("Unknown hosts should fail validation.");

	assert_eq!(err.kind(), Some(ErrorKind::AuthorityNotInValidList));
	assert!(transport.requests_to("/contoso.com/oauth2/token").is_empty());
}

#[tokio::test]
async fn trusted_hosts_skip_instance_discovery() {
	let transport = ScriptedTransport::default();

	transport.json("/contoso.com/oauth2/token", 200, TOKEN_BODY);

	let (engine, _) = build_scripted_engine(transport.clone(), EngineOptions::default());

	engine
		.acquire_with_refresh_token(&request("https://login.microsoftonline.com/contoso.com"), "rt")
		.await
		.expect("Trusted hosts should not need discovery.");

	assert!(transport.requests_to(DISCOVERY_PATH).is_empty());
}

#[tokio::test]
async fn adfs_cannot_be_validated() {
	let (engine, _) = build_scripted_engine(ScriptedTransport::default(), EngineOptions::default());
	let err = engine
		.acquire_with_refresh_token(&request("https://fs.contoso.com/adfs"), "rt")
		.await
		.expect_err("ADFS validation should be unsupported.");

	assert_eq!(err.kind(), Some(ErrorKind::UnsupportedAuthorityValidation));
}

#[tokio::test]
async fn adfs_uses_the_password_grant_without_realm_discovery() {
	let transport = ScriptedTransport::default();

	transport.json("/adfs/oauth2/token", 200, TOKEN_BODY);

	let options = EngineOptions { validate_authority: false, ..Default::default() };
	let (engine, _) = build_scripted_engine(transport.clone(), options);
	let result = engine
		.acquire_with_user_credential(
			&request("https://fs.contoso.com/adfs"),
			UserCredential::username_password("alice@contoso.com", "secret"),
		)
		.await
		.expect("ADFS password acquisition should succeed.");

	assert_eq!(result.access_token().expose(), "at");
	assert_eq!(transport.requests().len(), 1);

	let form = transport.requests_to("/adfs/oauth2/token")[0].form();

	assert_eq!(form.get("grant_type").map(String::as_str), Some("password"));

	let authority =
		Authority::parse("https://fs.contoso.com/adfs").expect("ADFS authority should parse.");

	assert!(engine.authorities().cached(&authority).is_some_and(|entry| !entry.validated));
}

#[tokio::test]
async fn cancelled_acquisition_never_reaches_the_network() {
	let transport = ScriptedTransport::default();
	let (engine, _) = build_scripted_engine(transport.clone(), EngineOptions::default());
	let cancellation = CancellationToken::new();

	cancellation.cancel();

	let err = engine
		.acquire_with_cancellation(
			&request("https://login.microsoftonline.com/contoso.com"),
			Flow::RefreshToken("rt".into()),
			cancellation,
		)
		.await
		.expect_err("Cancelled acquisitions should fail.");

	assert!(err.is_cancelled());
	assert!(transport.requests().is_empty());
}
