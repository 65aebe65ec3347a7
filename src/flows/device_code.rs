//! Device code sign-in: requesting a code and redeeming it.
//!
//! [`Engine::acquire_device_code`] asks the device authorization endpoint for a user code. Each
//! call to [`Engine::acquire_with_device_code`] is a single polling attempt; while the user has
//! not finished, it fails with a [`ServiceError`](crate::error::ServiceError) for which
//! `is_authorization_pending` holds, and the caller waits [`DeviceCodeResult::interval`] before
//! trying again.

// self
use crate::{
	_prelude::*,
	auth::{DeviceCodeResult, TokenSecret},
	context::RequestContext,
	error::{AcquisitionError, ErrorKind},
	flows::{Engine, Flow, RequestData, TokenResult},
	http::{EndpointKind, HttpTransport, TransportErrorMapper},
	oauth::{self, RequestParameters, param},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const DEFAULT_INTERVAL: Duration = Duration::seconds(5);

#[derive(Deserialize)]
struct DeviceCodeResponse {
	user_code: String,
	device_code: String,
	#[serde(alias = "verification_uri")]
	verification_url: String,
	#[serde(default, deserialize_with = "oauth::seconds_lenient")]
	expires_in: Option<i64>,
	#[serde(default, deserialize_with = "oauth::seconds_lenient")]
	interval: Option<i64>,
	#[serde(default)]
	message: Option<String>,
}

impl<C, M> Engine<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Requests a device code for the request's client and resource.
	pub async fn acquire_device_code(&self, request: &RequestData) -> Result<DeviceCodeResult> {
		const KIND: FlowKind = FlowKind::DeviceCode;

		let ctx = RequestContext::new(
			request.correlation_id(),
			self.options.log_pii,
			CancellationToken::new(),
		);
		let span = FlowSpan::new(KIND, "acquire_device_code", ctx.correlation_id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let authority = self
					.authorities
					.resolve(&self.http, &self.options, request.authority(), &ctx)
					.await?;
				let mut params = RequestParameters::default();

				params.insert(param::CLIENT_ID, request.client_id().to_string());
				params.insert(param::RESOURCE, request.resource().to_string());

				let response: DeviceCodeResponse = oauth::send_form(
					&self.http,
					EndpointKind::DeviceCode,
					&authority.endpoints.device_code,
					&params,
					&ctx,
				)
				.await?;

				ctx.logger.info("Device code issued.");

				into_result(response, request, OffsetDateTime::now_utc())
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Performs one polling attempt for `device_code`.
	pub async fn acquire_with_device_code(
		&self,
		request: &RequestData,
		device_code: DeviceCodeResult,
	) -> Result<TokenResult> {
		self.acquire(request, Flow::DeviceCode(device_code)).await
	}
}

pub(crate) fn validate(device_code: &DeviceCodeResult, now: OffsetDateTime) -> Result<()> {
	if device_code.is_expired_at(now) {
		return Err(ErrorKind::DeviceCodeExpired.into());
	}

	Ok(())
}

fn into_result(
	response: DeviceCodeResponse,
	request: &RequestData,
	now: OffsetDateTime,
) -> Result<DeviceCodeResult> {
	let expires_on = response
		.expires_in
		.filter(|secs| *secs > 0)
		.and_then(|secs| now.checked_add(Duration::seconds(secs)))
		.ok_or_else(|| {
			AcquisitionError::with_message(
				ErrorKind::TokenResponseInvalid,
				"The device code response carries no positive in-range `expires_in`.",
			)
		})?;
	let interval = response
		.interval
		.filter(|secs| *secs > 0)
		.map(Duration::seconds)
		.unwrap_or(DEFAULT_INTERVAL);

	Ok(DeviceCodeResult {
		device_code: TokenSecret::new(response.device_code),
		user_code: response.user_code,
		verification_url: response.verification_url,
		expires_on,
		interval,
		message: response.message,
		client_id: request.client_id().clone(),
		resource: request.resource().clone(),
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn request() -> RequestData {
		RequestData::builder("https://login.microsoftonline.com/common", "device-app", "resource")
			.build()
			.expect("Request fixture should build.")
	}

	#[test]
	fn response_fields_map_onto_the_result() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let response: DeviceCodeResponse = serde_json::from_str(
			r#"{
				"user_code": "ABC-DEF",
				"device_code": "dc",
				"verification_uri": "https://microsoft.com/devicelogin",
				"expires_in": "900",
				"message": "Go sign in."
			}"#,
		)
		.expect("Device code fixture should parse.");
		let result = into_result(response, &request(), now).expect("Result should build.");

		assert_eq!(result.user_code, "ABC-DEF");
		assert_eq!(result.device_code.expose(), "dc");
		assert_eq!(result.verification_url, "https://microsoft.com/devicelogin");
		assert_eq!(result.expires_on, now + Duration::seconds(900));
		assert_eq!(result.interval, DEFAULT_INTERVAL);
		assert_eq!(&*result.client_id, "device-app");
	}

	#[test]
	fn out_of_range_expiry_is_invalid() {
		let response: DeviceCodeResponse = serde_json::from_str(
			r#"{
				"user_code": "u",
				"device_code": "d",
				"verification_url": "https://v",
				"expires_in": 9223372036854775807
			}"#,
		)
		.expect("Device code fixture should parse.");
		let err = into_result(response, &request(), macros::datetime!(2025-01-01 00:00 UTC))
			.expect_err("Out-of-range expiry should be rejected.");

		assert_eq!(err.kind(), Some(ErrorKind::TokenResponseInvalid));
	}

	#[test]
	fn expired_codes_fail_before_any_request() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let response: DeviceCodeResponse = serde_json::from_str(
			r#"{
				"user_code": "u",
				"device_code": "d",
				"verification_url": "https://v",
				"expires_in": 60,
				"interval": 1
			}"#,
		)
		.expect("Device code fixture should parse.");
		let result = into_result(response, &request(), now).expect("Result should build.");

		assert!(validate(&result, now).is_ok());

		let err = validate(&result, now + Duration::seconds(60))
			.expect_err("Expired codes should fail.");

		assert_eq!(err.kind(), Some(ErrorKind::DeviceCodeExpired));
	}
}
