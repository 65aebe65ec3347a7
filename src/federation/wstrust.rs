//! WS-Trust RST envelope construction and RSTR parsing.

// std
use std::borrow::Cow;
// crates.io
use quick_xml::{Reader, escape::escape, events::Event};
use time::macros::format_description;
// self
use crate::{
	_prelude::*,
	auth::{ResolvedUser, UserAuthType},
	context::RequestContext,
	error::{AcquisitionError, ConfigError, DocumentError, ErrorKind, ServiceError},
	federation::mex::{WsTrustAddress, WsTrustVersion},
	http::{self, EndpointKind, HttpExecutor, HttpTransport, TransportErrorMapper},
	oauth,
};

/// Token type URI of a SAML 1.1 assertion.
pub const SAML1_ASSERTION: &str = "urn:oasis:names:tc:SAML:1.0:assertion";
/// Token type URI of a SAML 2.0 assertion.
pub const SAML2_ASSERTION: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

const SOAP_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
const ADDRESSING_NS: &str = "http://www.w3.org/2005/08/addressing";
const ANONYMOUS_ADDRESS: &str = "http://www.w3.org/2005/08/addressing/anonymous";
const WSU_NS: &str =
	"http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const WSSE_NS: &str =
	"http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const POLICY_NS: &str = "http://schemas.xmlsoap.org/ws/2004/09/policy";

impl WsTrustVersion {
	fn namespace(self) -> &'static str {
		match self {
			Self::WsTrust13 => "http://docs.oasis-open.org/ws-sx/ws-trust/200512",
			Self::WsTrust2005 => "http://schemas.xmlsoap.org/ws/2005/02/trust",
		}
	}

	fn issue_action(self) -> &'static str {
		match self {
			Self::WsTrust13 => "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue",
			Self::WsTrust2005 => "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue",
		}
	}

	fn key_type(self) -> &'static str {
		match self {
			Self::WsTrust13 => "http://docs.oasis-open.org/ws-sx/ws-trust/200512/Bearer",
			Self::WsTrust2005 => "http://schemas.xmlsoap.org/ws/2005/05/identity/NoProofKey",
		}
	}

	fn request_type(self) -> &'static str {
		match self {
			Self::WsTrust13 => "http://docs.oasis-open.org/ws-sx/ws-trust/200512/Issue",
			Self::WsTrust2005 => "http://schemas.xmlsoap.org/ws/2005/02/trust/Issue",
		}
	}
}

/// Token returned by a WS-Trust endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct WsTrustResponse {
	/// Declared token type URI.
	pub token_type: String,
	/// Raw assertion XML.
	pub token: String,
}
impl Debug for WsTrustResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("WsTrustResponse")
			.field("token_type", &self.token_type)
			.field("token", &"<redacted>")
			.finish()
	}
}

/// Performs the RST/RSTR exchange against `address`.
pub(crate) async fn send_ws_trust_request<C, M>(
	http: &HttpExecutor<C, M>,
	address: &WsTrustAddress,
	user: &ResolvedUser,
	cloud_audience_urn: &str,
	lifetime: Duration,
	ctx: &RequestContext,
) -> Result<WsTrustResponse>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let envelope = build_envelope(
		address,
		user,
		cloud_audience_urn,
		OffsetDateTime::now_utc(),
		lifetime,
		Uuid::new_v4(),
	)?;
	let request = http::post_soap(&address.uri, envelope, ctx)?;

	ctx.logger.verbose_pii(format_args!("Sending WS-Trust request to {}.", address.uri));

	let response = http.execute(EndpointKind::WsTrust, request, ctx).await?;
	let status = response.status().as_u16();
	let body = http::body_text(&response);

	match parse_response(&body) {
		Ok(parsed) if http::is_success(&response) => Ok(parsed),
		Ok(_) => Err(oauth::service_error_from_body(&response).into()),
		Err(Error::Service(err)) => Err(ServiceError { status: Some(status), ..err }.into()),
		Err(_) if !http::is_success(&response) =>
			Err(oauth::service_error_from_body(&response).into()),
		Err(err) => Err(err),
	}
}

/// Builds the SOAP 1.2 RST envelope.
pub(crate) fn build_envelope(
	address: &WsTrustAddress,
	user: &ResolvedUser,
	cloud_audience_urn: &str,
	now: OffsetDateTime,
	lifetime: Duration,
	message_id: Uuid,
) -> Result<String> {
	let version = address.version;
	let security_header = match (user.auth_type(), user.password()) {
		(UserAuthType::UsernamePassword, Some(password)) => {
			let timestamp = format_description!(
				"[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
			);
			let created = now.format(timestamp).map_err(ConfigError::from)?;
			let expires = (now + lifetime).format(timestamp).map_err(ConfigError::from)?;

			format!(
				"<wsse:Security s:mustUnderstand='1' xmlns:wsse='{WSSE_NS}'>\
				<wsu:Timestamp wsu:Id='MessageID'>\
				<wsu:Created>{created}</wsu:Created><wsu:Expires>{expires}</wsu:Expires>\
				</wsu:Timestamp>\
				<wsse:UsernameToken wsu:Id='UsernameToken'>\
				<wsse:Username>{}</wsse:Username><wsse:Password>{}</wsse:Password>\
				</wsse:UsernameToken>\
				</wsse:Security>",
				escape(user.username()),
				escape(password.expose()),
			)
		},
		_ => String::new(),
	};

	Ok(format!(
		"<s:Envelope xmlns:s='{SOAP_ENVELOPE_NS}' xmlns:a='{ADDRESSING_NS}' xmlns:u='{WSU_NS}' \
		xmlns:wsu='{WSU_NS}'>\
		<s:Header>\
		<a:Action s:mustUnderstand='1'>{action}</a:Action>\
		<a:messageID>urn:uuid:{message_id}</a:messageID>\
		<a:ReplyTo><a:Address>{ANONYMOUS_ADDRESS}</a:Address></a:ReplyTo>\
		<a:To s:mustUnderstand='1'>{to}</a:To>\
		{security_header}\
		</s:Header>\
		<s:Body>\
		<trust:RequestSecurityToken xmlns:trust='{trust_ns}'>\
		<wsp:AppliesTo xmlns:wsp='{POLICY_NS}'>\
		<a:EndpointReference><a:Address>{audience}</a:Address></a:EndpointReference>\
		</wsp:AppliesTo>\
		<trust:KeyType>{key_type}</trust:KeyType>\
		<trust:RequestType>{request_type}</trust:RequestType>\
		</trust:RequestSecurityToken>\
		</s:Body>\
		</s:Envelope>",
		action = version.issue_action(),
		to = escape(address.uri.as_str()),
		trust_ns = version.namespace(),
		audience = escape(cloud_audience_urn),
		key_type = version.key_type(),
		request_type = version.request_type(),
	))
}

/// Parses an RSTR or SOAP fault.
///
/// When several tokens are returned, a SAML 1.1 assertion is preferred.
pub(crate) fn parse_response(xml: &str) -> Result<WsTrustResponse> {
	let malformed = |source| DocumentError::Malformed { document: "WS-Trust response", source };
	let mut reader = Reader::from_str(xml);
	let mut stack = Vec::<String>::new();
	let mut fault_code = None::<String>;
	let mut fault_reason = None::<String>;
	let mut in_fault = false;
	let mut token_type = None::<String>;
	let mut tokens = Vec::<WsTrustResponse>::new();
	let mut pending_token = None::<String>;

	reader.config_mut().trim_text(true);

	loop {
		match reader.read_event().map_err(malformed)? {
			Event::Start(e) => {
				let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

				match name.as_str() {
					"Fault" => in_fault = true,
					"RequestSecurityTokenResponse" => {
						token_type = None;
						pending_token = None;
					},
					"RequestedSecurityToken" => {
						let end = e.to_end().into_owned();
						let inner = reader.read_text(end.name()).map_err(malformed)?;

						pending_token = Some(inner.trim().to_owned());

						continue;
					},
					_ => {},
				}

				stack.push(name);
			},
			Event::End(e) => {
				stack.pop();

				match e.local_name().as_ref() {
					b"RequestSecurityTokenResponse" => {
						if let (Some(token_type), Some(token)) = (token_type.take(), pending_token.take())
						{
							tokens.push(WsTrustResponse { token_type, token });
						}
					},
					b"Fault" => in_fault = false,
					_ => {},
				}
			},
			Event::Text(t) => {
				let text = t.unescape().map_err(malformed)?;
				let current = stack.last().map(String::as_str);
				let parent = stack.len().checked_sub(2).and_then(|i| stack.get(i)).map(String::as_str);

				match (current, parent) {
					(Some("TokenType"), _) => token_type = Some(text.trim().to_owned()),
					(Some("Value"), Some("Subcode")) if in_fault =>
						fault_code = Some(strip_prefix(&text).into_owned()),
					(Some("Text"), Some("Reason")) if in_fault =>
						fault_reason = Some(text.trim().to_owned()),
					_ => {},
				}
			},
			Event::Eof => break,
			_ => {},
		}
	}

	if fault_code.is_some() || fault_reason.is_some() {
		let mut err = ServiceError::new(fault_code.unwrap_or_else(|| "soap_fault".into()));

		err.description = fault_reason;

		return Err(err.into());
	}

	let preferred = tokens.iter().position(|token| token.token_type == SAML1_ASSERTION).unwrap_or(0);

	if tokens.is_empty() {
		return Err(AcquisitionError::with_message(
			ErrorKind::ParsingWsTrustResponseFailed,
			"The WS-Trust response carries no security token.",
		)
		.into());
	}

	let token = tokens.swap_remove(preferred);

	if token.token.is_empty() {
		return Err(AcquisitionError::with_message(
			ErrorKind::ParsingWsTrustResponseFailed,
			"The WS-Trust response carries an empty security token.",
		)
		.into());
	}

	Ok(token)
}

fn strip_prefix(value: &str) -> Cow<'_, str> {
	let value = value.trim();

	match value.split_once(':') {
		Some((_, local)) => Cow::Owned(local.to_owned()),
		None => Cow::Borrowed(value),
	}
}
