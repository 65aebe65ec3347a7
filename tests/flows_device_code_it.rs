// self
use oauth2_acquire::{
	_preludet::*,
	auth::{ClientId, DeviceCodeResult, ResourceId, TokenSecret},
	cache::CacheUser,
	error::ErrorKind,
	flows::{EngineOptions, RequestData},
};

const AUTHORITY: &str = "https://login.microsoftonline.com/common";
const DEVICE_CODE_PATH: &str = "/common/oauth2/devicecode";
const TOKEN_PATH: &str = "/common/oauth2/token";
const ALICE_ID_TOKEN: &str = "eyJ0eXAiOiJKV1QiLCJhbGciOiJub25lIn0.eyJvaWQiOiJvaWQtYWxpY2UiLCJ1cG4iOiJhbGljZUBjb250b3NvLmNvbSIsImdpdmVuX25hbWUiOiJBbGljZSIsInRpZCI6InRlbmFudC0xIn0.sig";

fn request() -> RequestData {
	RequestData::builder(AUTHORITY, "tv-app", "https://graph.contoso.com")
		.build()
		.expect("Request fixture should build.")
}

#[tokio::test]
async fn device_code_is_polled_until_the_user_signs_in() {
	let transport = ScriptedTransport::default();

	transport
		.json(
			DEVICE_CODE_PATH,
			200,
			r#"{
				"user_code": "F7K-2QP",
				"device_code": "dc-1",
				"verification_url": "https://microsoft.com/devicelogin",
				"expires_in": 900,
				"interval": 3,
				"message": "Enter F7K-2QP at https://microsoft.com/devicelogin."
			}"#,
		)
		.json(
			TOKEN_PATH,
			400,
			r#"{"error":"authorization_pending","error_description":"Waiting for the user."}"#,
		)
		.queue_json(
			TOKEN_PATH,
			200,
			format!(r#"{{"access_token":"at-device","expires_in":3600,"id_token":"{ALICE_ID_TOKEN}"}}"#),
		);

	let (engine, _) = build_scripted_engine(transport.clone(), EngineOptions::default());
	let device_code =
		engine.acquire_device_code(&request()).await.expect("Device code request should succeed.");

	assert_eq!(device_code.user_code, "F7K-2QP");
	assert_eq!(device_code.interval, Duration::seconds(3));

	let code_form = transport.requests_to(DEVICE_CODE_PATH)[0].form();

	assert_eq!(code_form.get("client_id").map(String::as_str), Some("tv-app"));
	assert_eq!(code_form.get("resource").map(String::as_str), Some("https://graph.contoso.com"));

	let pending = engine
		.acquire_with_device_code(&request(), device_code.clone())
		.await
		.expect_err("The first poll should still be pending.");

	assert!(pending.service().is_some_and(|err| err.is_authorization_pending()));

	let result = engine
		.acquire_with_device_code(&request(), device_code)
		.await
		.expect("The second poll should succeed.");

	assert_eq!(result.access_token().expose(), "at-device");
	assert_eq!(result.key.user, CacheUser::user("alice@contoso.com"));

	let poll_form = transport.requests_to(TOKEN_PATH)[1].form();

	assert_eq!(poll_form.get("grant_type").map(String::as_str), Some("device_code"));
	assert_eq!(poll_form.get("code").map(String::as_str), Some("dc-1"));
}

#[tokio::test]
async fn expired_device_code_is_not_redeemed() {
	let transport = ScriptedTransport::default();
	let (engine, _) = build_scripted_engine(transport.clone(), EngineOptions::default());
	let now = OffsetDateTime::now_utc();
	let device_code = DeviceCodeResult {
		device_code: TokenSecret::new("dc-old"),
		user_code: "OLD".into(),
		verification_url: "https://microsoft.com/devicelogin".into(),
		expires_on: now - Duration::minutes(1),
		interval: Duration::seconds(5),
		message: None,
		client_id: ClientId::new("tv-app").expect("Client fixture should be valid."),
		resource: ResourceId::new("https://graph.contoso.com")
			.expect("Resource fixture should be valid."),
	};
	let err = engine
		.acquire_with_device_code(&request(), device_code)
		.await
		.expect_err("Expired device codes should fail.");

	assert_eq!(err.kind(), Some(ErrorKind::DeviceCodeExpired));
	assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn device_code_response_without_expiry_is_invalid() {
	let transport = ScriptedTransport::default();

	transport.json(
		DEVICE_CODE_PATH,
		200,
		r#"{"user_code":"u","device_code":"d","verification_url":"https://v"}"#,
	);

	let (engine, _) = build_scripted_engine(transport, EngineOptions::default());
	let err = engine
		.acquire_device_code(&request())
		.await
		.expect_err("Device code responses without an expiry should fail.");

	assert_eq!(err.kind(), Some(ErrorKind::TokenResponseInvalid));
}
